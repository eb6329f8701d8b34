//! Parsed representation of an HAProxy configuration file.
//!
//! The model is derived and read-only: it is rebuilt from the raw text on
//! every read and never serialized back to disk.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Top-level section keywords recognised by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Global,
    Defaults,
    Frontend,
    Backend,
    Listen,
}

impl SectionKind {
    pub fn keyword(self) -> &'static str {
        match self {
            SectionKind::Global => "global",
            SectionKind::Defaults => "defaults",
            SectionKind::Frontend => "frontend",
            SectionKind::Backend => "backend",
            SectionKind::Listen => "listen",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "global" => Some(SectionKind::Global),
            "defaults" => Some(SectionKind::Defaults),
            "frontend" => Some(SectionKind::Frontend),
            "backend" => Some(SectionKind::Backend),
            "listen" => Some(SectionKind::Listen),
            _ => None,
        }
    }

    /// Whether sections of this kind carry a name and typed directives.
    pub fn is_proxy(self) -> bool {
        matches!(
            self,
            SectionKind::Frontend | SectionKind::Backend | SectionKind::Listen
        )
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

impl std::str::FromStr for SectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_keyword(s).ok_or_else(|| format!("unknown section kind: {s}"))
    }
}

/// A `server` line inside a backend or listen section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub name: String,
    pub address: String,
    /// Trailing parameters (health checks, weights), trimmed.
    #[serde(default)]
    pub options: String,
}

/// A conditional routing rule. Order is significant: first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseBackendRule {
    pub backend: String,
    /// Empty when the rule has no `if` clause.
    #[serde(default)]
    pub condition: String,
}

/// Frontend, backend and listen sections share one shape; ordinary backends
/// leave the routing fields empty and frontends leave `servers` empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub bind: Vec<String>,
    pub mode: Option<String>,
    pub balance: Option<String>,
    pub default_backend: Option<String>,
    pub servers: Vec<ServerEntry>,
    /// Directives the parser does not model, kept verbatim.
    pub options: Vec<String>,
    /// Raw `name condition` strings.
    pub acls: Vec<String>,
    pub use_backends: Vec<UseBackendRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_auth: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub stats_enabled: bool,
}

/// Alias used where a section is known to be a frontend.
pub type FrontendSection = Section;
/// Alias used where a section is known to be a backend.
pub type BackendSection = Section;
/// Alias used where a section is known to be a combined listen block.
pub type ListenSection = Section;

/// The whole configuration file. Maps keep file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Directive keyword → trailing text. Repeated keywords are joined by `\n`.
    pub global: IndexMap<String, String>,
    pub defaults: IndexMap<String, String>,
    pub frontends: IndexMap<String, FrontendSection>,
    pub backends: IndexMap<String, BackendSection>,
    pub listens: IndexMap<String, ListenSection>,
}

impl ConfigDocument {
    pub fn section(&self, kind: SectionKind, name: &str) -> Option<&Section> {
        match kind {
            SectionKind::Frontend => self.frontends.get(name),
            SectionKind::Backend => self.backends.get(name),
            SectionKind::Listen => self.listens.get(name),
            SectionKind::Global | SectionKind::Defaults => None,
        }
    }

    /// The `listen stats` block, shown separately from the routing topology.
    pub fn stats_info(&self) -> Option<&ListenSection> {
        self.listens.get("stats")
    }
}
