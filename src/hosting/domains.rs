//! Per-account HAProxy domains managed through the panel's own scripts.
//!
//! # Data Flow
//! ```text
//! list       → v-list-user-haproxy-domains <user> json → legacy host/port rewritten as servers[]
//! available  → v-list-web-domains <user> json minus the account's HAProxy domains
//! add/change → validated DomainRequest → v-add-/v-change-user-haproxy-domain <user> <domain> ...
//! delete     → v-delete-user-haproxy-domain <user> <domain>
//! ```
//!
//! # Design Decisions
//! - A request carrying a `backends` array (or omitting it) is the structured form and is
//!   handed to the script as one JSON argument; an explicit `backends: null` selects the
//!   older positional form
//! - Backend references are checked here, before any script runs; `__system__` names the
//!   panel's own web backend and is always allowed
//! - The scripts own the generated config, so nothing here touches the config file directly

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::exec::{invoke_json, CommandRunner, ExecError};

pub const LIST_USER_DOMAINS: &str = "v-list-user-haproxy-domains";
pub const ADD_USER_DOMAIN: &str = "v-add-user-haproxy-domain";
pub const CHANGE_USER_DOMAIN: &str = "v-change-user-haproxy-domain";
pub const DELETE_USER_DOMAIN: &str = "v-delete-user-haproxy-domain";

/// Backend name routing to the panel's web server instead of a listed backend.
pub const SYSTEM_BACKEND: &str = "__system__";

const STRUCTURED_FLAG: &str = "json";
const LEGACY_HOST: &str = "127.0.0.1";
const LEGACY_PORT: &str = "3000";

#[derive(Debug, Error)]
pub enum DomainError {
    /// Request rejected before any script ran.
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

pub type DomainResult<T> = Result<T, DomainError>;

fn invalid(message: impl Into<String>) -> DomainError {
    DomainError::Invalid(message.into())
}

/// Either `"a.example b.example"` / `"a.example,b.example"` or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Aliases {
    Text(String),
    List(Vec<String>),
}

impl Default for Aliases {
    fn default() -> Self {
        Aliases::List(Vec::new())
    }
}

impl Aliases {
    fn to_list(&self) -> Vec<String> {
        match self {
            Aliases::Text(text) => text
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Aliases::List(list) => list.clone(),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Aliases::Text(text) => text.clone(),
            Aliases::List(list) => list.join(" "),
        }
    }
}

/// A named backend of a domain. Fields the scripts understand beyond the
/// name and server list are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainBackend {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub servers: Vec<Value>,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

/// Host-based routing rule sending matches to one of the domain's backends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AclRoute {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub backend: String,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

fn structured_backends() -> Option<Vec<DomainBackend>> {
    Some(Vec::new())
}

fn default_routing_mode() -> String {
    "simple".into()
}

fn default_ssl() -> Value {
    json!({ "mode": "termination" })
}

fn default_true() -> bool {
    true
}

fn default_backend_type() -> String {
    "pm2".into()
}

/// Body of the add/change domain calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRequest {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub aliases: Aliases,
    #[serde(default = "default_routing_mode")]
    pub routing_mode: String,
    #[serde(default)]
    pub default_backend: String,
    #[serde(default)]
    pub acl_rules: Vec<AclRoute>,
    /// `None` only for an explicit `null`, which selects the positional form.
    #[serde(default = "structured_backends")]
    pub backends: Option<Vec<DomainBackend>>,
    #[serde(default = "default_ssl")]
    pub ssl: Value,
    #[serde(default = "default_true")]
    pub enabled: bool,

    // Positional form
    #[serde(default)]
    pub servers: Option<Vec<Value>>,
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub backend_host: Option<String>,
    #[serde(default)]
    pub backend_port: Option<Value>,
    #[serde(default = "default_backend_type")]
    pub backend_type: String,
    #[serde(default)]
    pub ssl_mode: Option<String>,
    #[serde(default)]
    pub health_check: Option<bool>,
    #[serde(default)]
    pub sticky_session: Option<bool>,
    #[serde(default)]
    pub forward_headers: Option<bool>,
    #[serde(default)]
    pub timeout: Option<Value>,
    #[serde(default)]
    pub custom_config: Option<String>,
    #[serde(default)]
    pub path_rules: Option<Value>,
}

impl Default for DomainRequest {
    fn default() -> Self {
        Self {
            domain: None,
            aliases: Aliases::default(),
            routing_mode: default_routing_mode(),
            default_backend: String::new(),
            acl_rules: Vec::new(),
            backends: structured_backends(),
            ssl: default_ssl(),
            enabled: true,
            servers: None,
            balance: None,
            mode: None,
            backend_host: None,
            backend_port: None,
            backend_type: default_backend_type(),
            ssl_mode: None,
            health_check: None,
            sticky_session: None,
            forward_headers: None,
            timeout: None,
            custom_config: None,
            path_rules: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DomainConfig<'a> {
    domain: &'a str,
    aliases: Vec<String>,
    routing_mode: &'a str,
    default_backend: &'a str,
    acl_rules: &'a [AclRoute],
    backends: &'a [DomainBackend],
    ssl: &'a Value,
    enabled: bool,
}

/// Which script a request is for; updates also carry the enabled flag in
/// the positional form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Change,
}

impl DomainRequest {
    /// Script arguments after `<user> <domain>`.
    fn script_args(&self, domain: &str, action: Action) -> DomainResult<Vec<String>> {
        match &self.backends {
            Some(backends) => self.structured_args(domain, backends),
            None => self.positional_args(action),
        }
    }

    fn structured_args(&self, domain: &str, backends: &[DomainBackend]) -> DomainResult<Vec<String>> {
        for backend in backends {
            if backend.name.is_empty() {
                return Err(invalid("Each backend must have a name"));
            }
            if backend.servers.is_empty() {
                return Err(invalid(format!(
                    "Backend \"{}\" must have at least one server",
                    backend.name
                )));
            }
        }
        if backends.is_empty() && self.default_backend != SYSTEM_BACKEND {
            return Err(invalid(
                "At least one backend is required (or use System Web Server as default)",
            ));
        }

        let listed = |name: &str| name == SYSTEM_BACKEND || backends.iter().any(|b| b.name == name);
        if !self.default_backend.is_empty() && !listed(&self.default_backend) {
            return Err(invalid(format!(
                "Default backend \"{}\" not found in backends list",
                self.default_backend
            )));
        }
        for rule in &self.acl_rules {
            if !listed(&rule.backend) {
                return Err(invalid(format!(
                    "ACL rule \"{}\" references unknown backend \"{}\"",
                    rule.name, rule.backend
                )));
            }
        }

        let default_backend = match (self.default_backend.as_str(), backends.first()) {
            ("", Some(first)) => first.name.as_str(),
            ("", None) => SYSTEM_BACKEND,
            (name, _) => name,
        };
        let config = DomainConfig {
            domain,
            aliases: self.aliases.to_list(),
            routing_mode: &self.routing_mode,
            default_backend,
            acl_rules: &self.acl_rules,
            backends,
            ssl: &self.ssl,
            enabled: self.enabled,
        };

        let config = serde_json::to_string(&config).map_err(|e| invalid(e.to_string()))?;
        Ok(vec![config, STRUCTURED_FLAG.to_string()])
    }

    fn positional_args(&self, action: Action) -> DomainResult<Vec<String>> {
        let servers = match (&self.servers, self.backend_port.as_ref().and_then(text_of)) {
            (Some(servers), _) if !servers.is_empty() => Value::from(servers.clone()),
            (_, Some(port)) => {
                let port = port
                    .trim()
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p >= 1)
                    .ok_or_else(|| invalid("Invalid port number"))?;
                let host = non_empty(&self.backend_host).unwrap_or(LEGACY_HOST);
                json!([legacy_server(&format!("{host}:{port}"))])
            }
            _ => return Err(invalid("At least one backend server is required")),
        };

        let health_check = self.health_check != Some(false);
        let forward_headers = self.forward_headers != Some(false);
        let custom_config = self.custom_config.clone().unwrap_or_default();
        let path_rules = self.path_rules.clone().unwrap_or_else(|| json!([]));
        let default_backend = match self.default_backend.as_str() {
            "" => "custom",
            name => name,
        };
        let options = json!({
            "healthCheck": health_check,
            "stickySession": self.sticky_session.unwrap_or(false),
            "forwardHeaders": forward_headers,
            "customConfig": custom_config,
            "pathRules": path_rules,
            "defaultBackend": default_backend,
        });
        let timeout = self
            .timeout
            .clone()
            .unwrap_or_else(|| json!({ "connect": "10s", "server": "30s", "client": "30s" }));
        let ssl_mode = non_empty(&self.ssl_mode)
            .or_else(|| self.ssl.get("mode").and_then(Value::as_str))
            .unwrap_or("termination");

        let mut args = vec![
            servers.to_string(),
            non_empty(&self.balance).unwrap_or("roundrobin").to_string(),
            non_empty(&self.mode).unwrap_or("http").to_string(),
            self.backend_type.clone(),
            ssl_mode.to_string(),
            self.aliases.to_text(),
            options.to_string(),
            timeout.to_string(),
        ];
        if action == Action::Change {
            args.push(if self.enabled { "yes" } else { "no" }.to_string());
        }
        Ok(args)
    }
}

/// Web domain of an account not yet routed through HAProxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableDomain {
    pub domain: String,
    pub ssl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// The account's HAProxy domains, each with a `servers` list.
///
/// An account without any HAProxy config yields `{"domains": []}`.
pub async fn list(runner: &dyn CommandRunner, user: &str) -> Value {
    let args = [user.to_string()];
    let mut listing = match invoke_json(runner, LIST_USER_DOMAINS, &args).await {
        Ok(listing) => listing,
        Err(e) => {
            tracing::debug!(user, error = %e, "No HAProxy domains for account");
            return json!({ "domains": [] });
        }
    };

    if let Some(domains) = listing.get_mut("domains").and_then(Value::as_array_mut) {
        for domain in domains.iter_mut() {
            with_server_list(domain);
        }
    }
    listing
}

/// Rewrite an entry that only has `backend.host`/`backend.port` into the
/// `servers` form, filling in balance and mode.
fn with_server_list(domain: &mut Value) {
    let Some(entry) = domain.as_object_mut() else {
        return;
    };
    if entry
        .get("servers")
        .and_then(Value::as_array)
        .is_some_and(|servers| !servers.is_empty())
    {
        return;
    }

    let backend = entry.get("backend");
    let host = backend.and_then(|b| b.get("host")).and_then(text_of);
    let port = backend.and_then(|b| b.get("port")).and_then(text_of);
    if host.is_none() && port.is_none() {
        return;
    }

    let address = format!(
        "{}:{}",
        host.as_deref().unwrap_or(LEGACY_HOST),
        port.as_deref().unwrap_or(LEGACY_PORT)
    );
    entry.insert("servers".into(), json!([legacy_server(&address)]));
    for (key, fallback) in [("balance", "roundrobin"), ("mode", "http")] {
        if entry.get(key).and_then(text_of).is_none() {
            entry.insert(key.into(), Value::from(fallback));
        }
    }
}

fn legacy_server(address: &str) -> Value {
    json!({ "name": "server1", "address": address, "type": "ip", "options": "" })
}

/// The account's web domains that are not HAProxy domains yet.
pub async fn available(runner: &dyn CommandRunner, user: &str) -> DomainResult<Vec<AvailableDomain>> {
    let args = [user.to_string()];
    let web = invoke_json(runner, crate::hosting::LIST_WEB_DOMAINS, &args).await?;

    let routed: Vec<String> = match invoke_json(runner, LIST_USER_DOMAINS, &args).await {
        Ok(listing) => listing
            .get("domains")
            .and_then(Value::as_array)
            .map(|domains| {
                domains
                    .iter()
                    .filter_map(|d| d.get("domain").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        Err(e) => {
            tracing::debug!(user, error = %e, "No HAProxy domains for account");
            Vec::new()
        }
    };

    let Some(web) = web.as_object() else {
        return Ok(Vec::new());
    };
    Ok(web
        .iter()
        .filter(|(domain, _)| !routed.contains(domain))
        .map(|(domain, data)| AvailableDomain {
            domain: domain.clone(),
            ssl: data.get("SSL").and_then(Value::as_str) == Some("yes"),
            ip: data.get("IP").and_then(Value::as_str).map(str::to_string),
        })
        .collect())
}

/// Add a domain to the account's HAProxy config. Returns the domain name.
pub async fn add(runner: &dyn CommandRunner, user: &str, request: &DomainRequest) -> DomainResult<String> {
    let domain = request
        .domain
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| invalid("Domain is required"))?;
    run_script(runner, ADD_USER_DOMAIN, user, domain, request.script_args(domain, Action::Add)?).await?;
    Ok(domain.to_string())
}

/// Update an existing domain of the account.
pub async fn change(
    runner: &dyn CommandRunner,
    user: &str,
    domain: &str,
    request: &DomainRequest,
) -> DomainResult<()> {
    let args = request.script_args(domain, Action::Change)?;
    run_script(runner, CHANGE_USER_DOMAIN, user, domain, args).await
}

pub async fn delete(runner: &dyn CommandRunner, user: &str, domain: &str) -> DomainResult<()> {
    run_script(runner, DELETE_USER_DOMAIN, user, domain, Vec::new()).await
}

async fn run_script(
    runner: &dyn CommandRunner,
    command: &str,
    user: &str,
    domain: &str,
    rest: Vec<String>,
) -> DomainResult<()> {
    let args: Vec<String> = [user.to_string(), domain.to_string()].into_iter().chain(rest).collect();
    runner.invoke(command, &args, None).await?;
    tracing::info!(command, user, domain, "HAProxy domain script completed");
    Ok(())
}

/// Text form of a string or number, with empty strings treated as absent.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecResult;
    use futures_util::future::BoxFuture;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records invocations and answers the listing commands.
    #[derive(Debug, Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        haproxy_listing: Option<String>,
    }

    impl CommandRunner for RecordingRunner {
        fn invoke<'a>(
            &'a self,
            command: &'a str,
            args: &'a [String],
            _timeout: Option<Duration>,
        ) -> BoxFuture<'a, ExecResult<String>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push((command.to_string(), args.to_vec()));
                match command {
                    LIST_USER_DOMAINS => self.haproxy_listing.clone().ok_or_else(|| ExecError::Failed {
                        command: command.to_string(),
                        code: Some(3),
                        message: "Error: no haproxy config".into(),
                    }),
                    crate::hosting::LIST_WEB_DOMAINS => Ok(r#"{
                        "a.example":{"SSL":"yes","IP":"10.0.0.1"},
                        "b.example":{"SSL":"no"},
                        "c.example":{"SSL":"no","IP":"10.0.0.1"}
                    }"#
                    .to_string()),
                    _ => Ok(String::new()),
                }
            })
        }
    }

    fn request(body: Value) -> DomainRequest {
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn test_list_rewrites_legacy_backend() {
        let runner = RecordingRunner {
            haproxy_listing: Some(
                r#"{"domains":[
                    {"domain":"a.example","backend":{"host":"10.0.0.5","port":8080}},
                    {"domain":"b.example","backend":{"port":"9000"},"balance":"leastconn"},
                    {"domain":"c.example","servers":[{"name":"s","address":"x:1"}]}
                ]}"#
                .into(),
            ),
            ..Default::default()
        };

        let listing = list(&runner, "alice").await;
        let domains = listing["domains"].as_array().unwrap();

        assert_eq!(domains[0]["servers"][0]["address"], "10.0.0.5:8080");
        assert_eq!(domains[0]["servers"][0]["name"], "server1");
        assert_eq!(domains[0]["balance"], "roundrobin");
        assert_eq!(domains[0]["mode"], "http");
        assert_eq!(domains[1]["servers"][0]["address"], "127.0.0.1:9000");
        assert_eq!(domains[1]["balance"], "leastconn");
        assert_eq!(domains[2]["servers"], json!([{"name":"s","address":"x:1"}]));
        assert!(domains[2].get("balance").is_none());
    }

    #[tokio::test]
    async fn test_list_without_config_is_empty() {
        let listing = list(&RecordingRunner::default(), "alice").await;
        assert_eq!(listing, json!({"domains": []}));
    }

    #[tokio::test]
    async fn test_available_excludes_routed_domains() {
        let runner = RecordingRunner {
            haproxy_listing: Some(r#"{"domains":[{"domain":"b.example"}]}"#.into()),
            ..Default::default()
        };

        let domains = available(&runner, "alice").await.unwrap();

        assert_eq!(
            domains,
            vec![
                AvailableDomain {
                    domain: "a.example".into(),
                    ssl: true,
                    ip: Some("10.0.0.1".into()),
                },
                AvailableDomain {
                    domain: "c.example".into(),
                    ssl: false,
                    ip: Some("10.0.0.1".into()),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_available_without_haproxy_config_lists_all() {
        let domains = available(&RecordingRunner::default(), "alice").await.unwrap();
        assert_eq!(domains.len(), 3);
        assert_eq!(domains[1].ip, None);
    }

    #[tokio::test]
    async fn test_add_structured_passes_config_json() {
        let runner = RecordingRunner::default();
        let req = request(json!({
            "domain": "shop.example",
            "aliases": "www.shop.example, m.shop.example",
            "backends": [{"name": "app", "servers": [{"address": "10.0.0.2:3000"}], "balance": "leastconn"}],
            "aclRules": [{"name": "static", "pattern": "/static", "backend": "__system__"}]
        }));

        assert_eq!(add(&runner, "alice", &req).await.unwrap(), "shop.example");

        let calls = runner.calls.lock().unwrap();
        let (command, args) = &calls[0];
        assert_eq!(command, ADD_USER_DOMAIN);
        assert_eq!(&args[..2], ["alice", "shop.example"]);
        assert_eq!(args[3], "json");
        let config: Value = serde_json::from_str(&args[2]).unwrap();
        assert_eq!(config["defaultBackend"], "app");
        assert_eq!(config["aliases"], json!(["www.shop.example", "m.shop.example"]));
        assert_eq!(config["routingMode"], "simple");
        assert_eq!(config["ssl"], json!({"mode": "termination"}));
        assert_eq!(config["backends"][0]["balance"], "leastconn");
        assert_eq!(config["aclRules"][0]["pattern"], "/static");
    }

    #[tokio::test]
    async fn test_structured_rejects_unknown_backend_references() {
        let runner = RecordingRunner::default();
        let cases = [
            (json!({"domain": "d"}), "At least one backend is required (or use System Web Server as default)"),
            (
                json!({"domain": "d", "backends": [{"name": "app"}]}),
                "Backend \"app\" must have at least one server",
            ),
            (
                json!({"domain": "d", "backends": [{"servers": [{}]}]}),
                "Each backend must have a name",
            ),
            (
                json!({"domain": "d", "defaultBackend": "api", "backends": [{"name": "app", "servers": [{}]}]}),
                "Default backend \"api\" not found in backends list",
            ),
            (
                json!({"domain": "d", "backends": [{"name": "app", "servers": [{}]}],
                       "aclRules": [{"name": "r1", "backend": "api"}]}),
                "ACL rule \"r1\" references unknown backend \"api\"",
            ),
            (json!({"backends": []}), "Domain is required"),
        ];

        for (body, message) in cases {
            let err = add(&runner, "alice", &request(body)).await.unwrap_err();
            assert_eq!(err.to_string(), message);
        }
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_system_default_needs_no_backends() {
        let runner = RecordingRunner::default();
        let req = request(json!({"domain": "d.example", "defaultBackend": "__system__"}));

        add(&runner, "alice", &req).await.unwrap();

        let calls = runner.calls.lock().unwrap();
        let config: Value = serde_json::from_str(&calls[0].1[2]).unwrap();
        assert_eq!(config["defaultBackend"], "__system__");
    }

    #[tokio::test]
    async fn test_change_positional_form() {
        let runner = RecordingRunner::default();
        let req = request(json!({
            "backends": null,
            "backendPort": "8080",
            "aliases": ["www.d.example"],
            "enabled": false,
            "healthCheck": false
        }));

        change(&runner, "alice", "d.example", &req).await.unwrap();

        let calls = runner.calls.lock().unwrap();
        let (command, args) = &calls[0];
        assert_eq!(command, CHANGE_USER_DOMAIN);
        assert_eq!(args.len(), 11);
        let servers: Value = serde_json::from_str(&args[2]).unwrap();
        assert_eq!(servers[0]["address"], "127.0.0.1:8080");
        assert_eq!(&args[3..8], ["roundrobin", "http", "pm2", "termination", "www.d.example"]);
        let options: Value = serde_json::from_str(&args[8]).unwrap();
        assert_eq!(options["healthCheck"], false);
        assert_eq!(options["forwardHeaders"], true);
        assert_eq!(options["defaultBackend"], "custom");
        assert_eq!(args[10], "no");
    }

    #[tokio::test]
    async fn test_positional_form_validates_port() {
        let runner = RecordingRunner::default();

        let err = change(&runner, "alice", "d", &request(json!({"backends": null, "backendPort": 70000})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid port number");

        let err = change(&runner, "alice", "d", &request(json!({"backends": null})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "At least one backend server is required");
    }

    #[tokio::test]
    async fn test_delete_runs_script() {
        let runner = RecordingRunner::default();

        delete(&runner, "alice", "d.example").await.unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0], (DELETE_USER_DOMAIN.to_string(), vec!["alice".into(), "d.example".into()]));
    }
}
