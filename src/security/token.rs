//! Opaque bearer tokens.
//!
//! A token is 16 bytes from the OS random source rendered as 26 unpadded
//! base32 characters. Only the SHA-256 of that string is ever stored; the
//! plaintext is handed to the caller once.

use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of an encoded token.
pub const TOKEN_LENGTH: usize = 26;

const TOKEN_ENTROPY_BYTES: usize = 16;

/// SHA-256 digest of a plaintext token.
pub type TokenHash = [u8; 32];

/// Purpose a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Activation,
    Authentication,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
        }
    }
}

impl std::fmt::Display for TokenScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("secure random source unavailable: {0}")]
    RandomSource(#[from] rand::Error),
}

/// Structural problems with a candidate plaintext token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenFormatError {
    #[error("must be provided")]
    Empty,

    #[error("must be 26 bytes long")]
    WrongLength,
}

/// A freshly issued token.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: TokenHash,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    /// Issue a new token for `user_id`, valid for `ttl`.
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> Result<Self, TokenError> {
        let mut random = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng.try_fill_bytes(&mut random)?;

        let plaintext = BASE32_NOPAD.encode(&random);
        let hash = hash(&plaintext);

        Ok(Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        })
    }
}

/// Lookup hash for a plaintext token.
pub fn hash(plaintext: &str) -> TokenHash {
    Sha256::digest(plaintext.as_bytes()).into()
}

/// Reject tokens that cannot possibly exist before touching storage.
pub fn validate(plaintext: &str) -> Result<(), TokenFormatError> {
    if plaintext.is_empty() {
        return Err(TokenFormatError::Empty);
    }
    if plaintext.len() != TOKEN_LENGTH {
        return Err(TokenFormatError::WrongLength);
    }
    Ok(())
}
