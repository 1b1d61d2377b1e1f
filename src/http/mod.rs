//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack, graceful drain)
//!     → request.rs (request id, request span)
//!     → panic.rs (handler panics → 500, connection closed)
//!     → [security pipeline, api handlers]
//!     → error.rs (typed failures → JSON error bodies)
//! ```

pub mod error;
pub mod panic;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
