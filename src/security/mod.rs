//! Security subsystem: the request admission pipeline.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (CORS, trusted origins)
//!     → authentication.rs (Bearer token → Identity, Vary: Authorization)
//!     → rate_limit.rs (per-IP token bucket)
//!     → authorization.rs (authenticated → activated → permission gates)
//!     → Pass to handler
//!
//! Credentials:
//!     token.rs (opaque tokens, SHA-256 lookup hash)
//!     password.rs (Argon2id)
//! ```
//!
//! # Design Decisions
//! - Every stage reports a typed [`SecurityError`]; the middleware turns it
//!   into a response exactly once via `ApiError`
//! - Fail closed: a storage failure is an internal error, never anonymous
//! - No global state: limiter tables and storage handles are owned values

pub mod authentication;
pub mod authorization;
pub mod headers;
pub mod identity;
pub mod password;
pub mod rate_limit;
pub mod token;

use thiserror::Error;

use crate::storage::StorageError;

pub use authentication::Authenticator;
pub use authorization::{Gate, Policy};
pub use identity::Identity;
pub use rate_limit::{Admission, RateLimiter};

/// Outcome of a failed admission check.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("account not activated")]
    InactiveAccount,

    #[error("missing permission {0}")]
    NotPermitted(String),

    #[error("client address unavailable")]
    MissingClientAddress,

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SecurityError {
    /// Short label used for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            SecurityError::RateLimitExceeded => "rate_limited",
            SecurityError::InvalidAuthenticationToken => "invalid_token",
            SecurityError::AuthenticationRequired => "authentication_required",
            SecurityError::InactiveAccount => "inactive_account",
            SecurityError::NotPermitted(_) => "not_permitted",
            SecurityError::MissingClientAddress => "missing_client_address",
            SecurityError::LockPoisoned(_) => "lock_poisoned",
            SecurityError::Storage(_) => "storage",
        }
    }
}
