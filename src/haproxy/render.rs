//! Config section generation.
//!
//! # Responsibilities
//! - Validate caller-supplied frontend/backend descriptions
//! - Render them as config text in a fixed directive order
//!
//! # Design Decisions
//! - `use_backend` rules keep input order (first match wins in HAProxy)
//! - Every block starts with a blank line so appends stay readable
//! - Inputs are rejected if they could break out of a single config line

use serde::{Deserialize, Serialize};

use crate::haproxy::model::UseBackendRule;
use crate::haproxy::parser::classify_line;

const INDENT: &str = "    ";
const HEALTH_CHECK_DIRECTIVES: [&str; 2] = ["option httpchk GET /", "http-check expect status 200-499"];
const HEALTH_CHECK_SERVER_SUFFIX: &str = "check inter 5s fall 3 rise 2";

/// Rejected caller input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SpecError(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclSpec {
    pub name: String,
    pub condition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendSpec {
    pub name: String,
    pub bind: Vec<String>,
    pub mode: Option<String>,
    pub acls: Vec<AclSpec>,
    pub use_backends: Vec<UseBackendRule>,
    pub options: Vec<String>,
    pub default_backend: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub options: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSpec {
    pub name: String,
    pub mode: Option<String>,
    pub balance: Option<String>,
    pub health_check: bool,
    pub options: Vec<String>,
    pub servers: Vec<ServerSpec>,
}

impl FrontendSpec {
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() || self.bind.is_empty() {
            return Err(SpecError("Name and bind addresses are required".into()));
        }
        check_name("frontend", &self.name)?;
        for bind in &self.bind {
            check_value("bind", bind)?;
        }
        check_optional("mode", self.mode.as_deref())?;
        for acl in &self.acls {
            check_name("acl", &acl.name)?;
            check_value("acl condition", &acl.condition)?;
        }
        for rule in &self.use_backends {
            check_name("use_backend", &rule.backend)?;
            check_line("use_backend condition", &rule.condition)?;
        }
        for option in &self.options {
            check_value("option", option)?;
        }
        if let Some(default_backend) = &self.default_backend {
            check_name("default_backend", default_backend)?;
        }
        Ok(())
    }
}

impl BackendSpec {
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() || self.servers.is_empty() {
            return Err(SpecError("Name and servers are required".into()));
        }
        check_name("backend", &self.name)?;
        check_optional("mode", self.mode.as_deref())?;
        check_optional("balance", self.balance.as_deref())?;
        for option in &self.options {
            check_value("option", option)?;
        }
        for server in &self.servers {
            check_name("server", &server.name)?;
            check_name("server address", &server.address)?;
            if let Some(options) = &server.options {
                check_line("server options", options)?;
            }
        }
        Ok(())
    }
}

/// A single non-empty token of printable characters.
pub fn check_name(field: &str, value: &str) -> Result<(), SpecError> {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(SpecError(format!(
            "Invalid {field} name '{value}': expected a single token without whitespace"
        )));
    }
    Ok(())
}

fn check_value(field: &str, value: &str) -> Result<(), SpecError> {
    if value.trim().is_empty() {
        return Err(SpecError(format!("Empty {field} value")));
    }
    check_line(field, value)
}

fn check_optional(field: &str, value: Option<&str>) -> Result<(), SpecError> {
    value.map_or(Ok(()), |v| check_line(field, v))
}

fn check_line(field: &str, value: &str) -> Result<(), SpecError> {
    if value.contains(|c: char| c == '\n' || c == '\r') {
        return Err(SpecError(format!("{field} must be a single line")));
    }
    // Options are emitted as whole directive lines.
    if classify_line(value).is_header() {
        return Err(SpecError(format!("{field} must not start a new section")));
    }
    Ok(())
}

fn push_directive(out: &mut String, directive: &str) {
    out.push_str(INDENT);
    out.push_str(directive);
    out.push('\n');
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Render a frontend block: bind, mode, acl, use_backend, options, default_backend.
pub fn render_frontend(spec: &FrontendSpec) -> String {
    let mut out = format!("\nfrontend {}\n", spec.name);

    for bind in &spec.bind {
        push_directive(&mut out, &format!("bind {bind}"));
    }
    if let Some(mode) = non_empty(&spec.mode) {
        push_directive(&mut out, &format!("mode {mode}"));
    }
    for acl in &spec.acls {
        push_directive(&mut out, &format!("acl {} {}", acl.name, acl.condition));
    }
    for rule in &spec.use_backends {
        if rule.condition.is_empty() {
            push_directive(&mut out, &format!("use_backend {}", rule.backend));
        } else {
            push_directive(&mut out, &format!("use_backend {} if {}", rule.backend, rule.condition));
        }
    }
    for option in &spec.options {
        push_directive(&mut out, option);
    }
    if let Some(default_backend) = non_empty(&spec.default_backend) {
        push_directive(&mut out, &format!("default_backend {default_backend}"));
    }

    out
}

/// Render a backend block: mode, balance, health checks, options, servers.
pub fn render_backend(spec: &BackendSpec) -> String {
    let mut out = format!("\nbackend {}\n", spec.name);

    if let Some(mode) = non_empty(&spec.mode) {
        push_directive(&mut out, &format!("mode {mode}"));
    }
    if let Some(balance) = non_empty(&spec.balance) {
        push_directive(&mut out, &format!("balance {balance}"));
    }
    if spec.health_check {
        for directive in HEALTH_CHECK_DIRECTIVES {
            push_directive(&mut out, directive);
        }
    }
    for option in &spec.options {
        push_directive(&mut out, option);
    }
    for server in &spec.servers {
        let mut line = format!("server {} {}", server.name, server.address);
        if spec.health_check {
            line.push(' ');
            line.push_str(HEALTH_CHECK_SERVER_SUFFIX);
        }
        if let Some(options) = non_empty(&server.options) {
            line.push(' ');
            line.push_str(options);
        }
        push_directive(&mut out, &line);
    }

    out
}
