//! Movie API library: the request admission pipeline and the JSON
//! endpoints it guards.

pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod notify;
pub mod observability;
pub mod security;
pub mod storage;

pub use config::ApiConfig;
pub use http::HttpServer;
pub use lifecycle::ShutdownCoordinator;
