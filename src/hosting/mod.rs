//! Hosting-panel accounts whose web domains sit behind the load balancer.
//!
//! # Data Flow
//! ```text
//! v-list-users json
//!     → one v-list-web-domains <user> json per account (at most
//!       DOMAIN_LOOKUP_CONCURRENCY in flight)
//!     → domains flagged HAPROXY_BACKEND=yes
//! ```
//!
//! A failure listing one account's domains skips that account only.
//! Per-account HAProxy domain management lives in [`domains`].

pub mod domains;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::exec::{invoke_json, CommandRunner, ExecResult};

pub const LIST_USERS: &str = "v-list-users";
pub const LIST_WEB_DOMAINS: &str = "v-list-web-domains";
pub const LIST_HAPROXY_STATUS: &str = "v-list-sys-haproxy";

/// Upper bound on concurrent `v-list-web-domains` processes.
pub const DOMAIN_LOOKUP_CONCURRENCY: usize = 8;

/// A web domain served through the load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserBackend {
    pub user: String,
    pub domain: String,
    pub host: String,
    pub port: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ssl: String,
}

/// Live status of the load balancer as reported by the panel.
pub async fn haproxy_status(runner: &dyn CommandRunner) -> ExecResult<Value> {
    invoke_json(runner, LIST_HAPROXY_STATUS, &[]).await
}

/// All accounts' load-balancer-backed domains, ordered by account name
/// (the panel's JSON object keys are read back sorted).
///
/// Only the account listing itself is fatal.
pub async fn user_backends(runner: &dyn CommandRunner) -> ExecResult<Vec<UserBackend>> {
    let users = invoke_json(runner, LIST_USERS, &[]).await?;
    let names: Vec<String> = match users {
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };

    let results: Vec<_> = stream::iter(names)
        .map(|user: String| async move {
            let args = [user.clone()];
            (user, invoke_json(runner, LIST_WEB_DOMAINS, &args).await)
        })
        .buffered(DOMAIN_LOOKUP_CONCURRENCY)
        .collect()
        .await;

    let mut backends = Vec::new();
    for (user, result) in results {
        match result {
            Ok(domains) => backends.extend(flagged_domains(&user, &domains)),
            Err(e) => tracing::warn!(user = %user, error = %e, "Skipping account, domain listing failed"),
        }
    }
    Ok(backends)
}

fn flagged_domains(user: &str, domains: &Value) -> Vec<UserBackend> {
    let Some(domains) = domains.as_object() else {
        return Vec::new();
    };

    domains
        .iter()
        .filter(|(_, data)| data.get("HAPROXY_BACKEND").and_then(Value::as_str) == Some("yes"))
        .map(|(domain, data)| UserBackend {
            user: user.to_string(),
            domain: domain.clone(),
            host: field_or(data, "HAPROXY_HOST", "127.0.0.1"),
            port: field_or(data, "HAPROXY_PORT", ""),
            kind: field_or(data, "HAPROXY_TYPE", "nginx"),
            ssl: field_or(data, "HAPROXY_SSL", "termination"),
        })
        .collect()
}

/// String field, with empty strings treated as absent.
fn field_or(data: &Value, key: &str, default: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}
