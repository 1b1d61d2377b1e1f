//! Storage subsystem.
//!
//! # Data Flow
//! ```text
//! security::authentication → get_user_for_token (hash, scope)
//! security::authorization  → get_permissions (user id)
//! api handlers             → users / tokens / movies CRUD
//!     → Storage trait object (Arc<dyn Storage>)
//!     → memory.rs (DashMap tables)
//! ```
//!
//! # Design Decisions
//! - Plaintext tokens never reach this layer, only their SHA-256 hash
//! - Token expiry is compared at lookup time; expired rows are never swept
//! - "Not found" is a distinct outcome from a backend failure
//! - Calls are plain futures: dropping one (client gone, deadline hit)
//!   abandons the work

pub mod memory;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

use crate::security::token::{Token, TokenHash, TokenScope};

pub use memory::MemoryStorage;
pub use models::{Movie, NewMovie, NewUser, Permissions, User};

/// Failures reported by a [`Storage`] implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("edit conflict")]
    EditConflict,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persistence capability consumed by the admission pipeline and handlers.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Resolve the owner of an unexpired token with the given hash and scope.
    async fn get_user_for_token(
        &self,
        hash: &TokenHash,
        scope: TokenScope,
    ) -> Result<User, StorageError>;

    /// All permission codes granted to `user_id`.
    async fn get_permissions(&self, user_id: i64) -> Result<Permissions, StorageError>;

    /// Grant permission codes to a user.
    async fn add_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), StorageError>;

    async fn insert_token(&self, token: &Token) -> Result<(), StorageError>;

    /// Delete every token of `scope` owned by `user_id`.
    async fn delete_tokens(&self, scope: TokenScope, user_id: i64) -> Result<(), StorageError>;

    async fn insert_user(&self, user: NewUser) -> Result<User, StorageError>;

    /// Remove a user together with its email claim, permissions and tokens.
    async fn delete_user(&self, user_id: i64) -> Result<(), StorageError>;

    async fn get_user_by_email(&self, email: &str) -> Result<User, StorageError>;

    /// Persist `user` if its version is still current; returns the stored copy.
    async fn update_user(&self, user: &User) -> Result<User, StorageError>;

    async fn list_movies(&self) -> Result<Vec<Movie>, StorageError>;

    async fn get_movie(&self, id: i64) -> Result<Movie, StorageError>;

    async fn insert_movie(&self, movie: NewMovie) -> Result<Movie, StorageError>;

    async fn delete_movie(&self, id: i64) -> Result<(), StorageError>;
}
