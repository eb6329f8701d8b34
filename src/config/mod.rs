//! Service configuration.
//!
//! # Data Flow
//! ```text
//! TOML file (optional, --config)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → AppConfig (immutable for the life of the process)
//! ```
//!
//! # Design Decisions
//! - Every field has a default so an absent file or section is valid
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AppConfig, HaproxyConfig, ListenerConfig, ObservabilityConfig, PanelConfig,
    SecurityConfig, TimeoutConfig,
};
