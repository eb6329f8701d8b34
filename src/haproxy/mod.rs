//! HAProxy configuration domain.
//!
//! # Data Flow
//! ```text
//! store.rs (file on disk, backups)
//!     → parser.rs (text → ConfigDocument)
//!     → graph.rs (ConfigDocument → nodes and edges)
//!
//! caller request
//!     → render.rs (FrontendSpec / BackendSpec → section text)
//!     → surgery.rs (line-based delete / replace of a named section)
//!     → pipeline.rs (backup → write → validate → restart, or restore)
//! ```
//!
//! # Design Decisions
//! - Parsing is lenient and never fails; the external checker is the authority
//! - Section edits operate on raw lines so comments elsewhere survive
//! - Mutations of one file are serialised through a per-path lock

pub mod graph;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod store;
pub mod surgery;

pub use graph::{project, VisualizationGraph};
pub use model::{ConfigDocument, Section, SectionKind};
pub use parser::parse;
pub use pipeline::{MutationOutcome, MutationPipeline, PipelineError};
pub use render::{BackendSpec, FrontendSpec};
pub use store::{ConfigStore, FileStore};
