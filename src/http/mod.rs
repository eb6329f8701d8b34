//! HTTP server assembly.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request id, trace, timeout, body limit, metrics)
//!     → admin router (bearer auth → handlers)
//!     → JSON response
//! ```

pub mod middleware;
pub mod server;

pub use server::{AppState, HttpServer};
