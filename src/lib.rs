//! HAProxy administration service for a hosting panel.

pub mod admin;
pub mod config;
pub mod exec;
pub mod haproxy;
pub mod hosting;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
