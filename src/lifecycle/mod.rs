//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Background work (background.rs):
//!     spawn → counter +1 → task runs detached from the request → guard drop → counter -1
//!
//! Shutdown (shutdown.rs):
//!     Running → (signal) → Draining: stop accepting, finish in-flight
//!     requests within the grace period, wait for background work
//!     → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → begin_drain
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain HTTP, drain background work
//! - HTTP drain has a deadline; running past it is an error for the operator
//! - The pending-work counter is atomic and guard-based, so it cannot leak

pub mod background;
pub mod shutdown;
pub mod signals;

pub use background::{BackgroundTasks, WorkGuard};
pub use shutdown::{Phase, ShutdownCoordinator, ShutdownError};
