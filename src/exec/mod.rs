//! External collaborators.
//!
//! # Data Flow
//! ```text
//! admin handler / pipeline
//!     → runner.rs (named panel commands, stdout or JSON)
//!     → validator.rs (haproxy -c -f <file>)
//!     → service.rs (restart through the runner)
//! ```
//!
//! # Design Decisions
//! - Arguments are passed positionally, never through a shell
//! - Every invocation has a deadline; timeouts are a distinct error
//! - Traits at each seam so tests substitute fakes

pub mod error;
pub mod runner;
pub mod service;
pub mod validator;

pub use error::{ExecError, ExecResult};
pub use runner::{invoke_json, CommandRunner, PanelRunner};
pub use service::{PanelServiceControl, ServiceControl};
pub use validator::{ConfigValidator, HaproxyValidator, Validation};
