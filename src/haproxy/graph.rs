//! Topology projection for the visualisation view.
//!
//! Node ids are derived from section names (`frontend_<name>`,
//! `backend_<name>`, `listen_<name>`) and server positions
//! (`server_<parent>_<index>`), so the same config always yields the same
//! graph.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::haproxy::model::{ConfigDocument, Section, ServerEntry};

static HOST_MATCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)hdr\(host\)\s+-i\s+(.+)").expect("static host match regex")
});

/// Listen section excluded from the topology.
const STATS_LISTEN: &str = "stats";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeDetail {
    Frontend {
        bind: Vec<String>,
        mode: Option<String>,
        acls: Vec<String>,
    },
    Backend {
        balance: Option<String>,
        mode: Option<String>,
        servers: Vec<ServerEntry>,
    },
    Server {
        address: String,
        options: String,
    },
    Listen {
        bind: Vec<String>,
        mode: Option<String>,
        balance: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub detail: NodeDetail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Default,
    Conditional,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Raw condition of a conditional edge.
    #[serde(rename = "aclName", skip_serializing_if = "Option::is_none")]
    pub acl_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisualizationGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Build the routing graph for a parsed document.
pub fn project(doc: &ConfigDocument) -> VisualizationGraph {
    let mut graph = VisualizationGraph::default();

    for (name, frontend) in &doc.frontends {
        let id = format!("frontend_{name}");
        graph.nodes.push(Node {
            id: id.clone(),
            label: name.clone(),
            detail: NodeDetail::Frontend {
                bind: frontend.bind.clone(),
                mode: frontend.mode.clone(),
                acls: frontend.acls.clone(),
            },
        });

        if let Some(default_backend) = &frontend.default_backend {
            graph.edges.push(Edge {
                from: id.clone(),
                to: format!("backend_{default_backend}"),
                kind: EdgeKind::Default,
                label: Some("default".to_string()),
                acl_name: None,
            });
        }

        let acl_map = build_acl_map(&frontend.acls);
        for rule in &frontend.use_backends {
            graph.edges.push(Edge {
                from: id.clone(),
                to: format!("backend_{}", rule.backend),
                kind: EdgeKind::Conditional,
                label: Some(conditional_label(&rule.condition, &acl_map)),
                acl_name: Some(rule.condition.clone()),
            });
        }
    }

    for (name, backend) in &doc.backends {
        let id = format!("backend_{name}");
        graph.nodes.push(Node {
            id: id.clone(),
            label: name.clone(),
            detail: NodeDetail::Backend {
                balance: backend.balance.clone(),
                mode: backend.mode.clone(),
                servers: backend.servers.clone(),
            },
        });
        push_servers(&mut graph, &id, name, backend);
    }

    for (name, listen) in doc.listens.iter().filter(|(name, _)| *name != STATS_LISTEN) {
        let id = format!("listen_{name}");
        graph.nodes.push(Node {
            id: id.clone(),
            label: name.clone(),
            detail: NodeDetail::Listen {
                bind: listen.bind.clone(),
                mode: listen.mode.clone(),
                balance: listen.balance.clone(),
            },
        });
        push_servers(&mut graph, &id, name, listen);
    }

    graph
}

fn push_servers(graph: &mut VisualizationGraph, parent_id: &str, parent_name: &str, section: &Section) {
    for (idx, server) in section.servers.iter().enumerate() {
        let server_id = format!("server_{parent_name}_{idx}");
        graph.nodes.push(Node {
            id: server_id.clone(),
            label: server.name.clone(),
            detail: NodeDetail::Server {
                address: server.address.clone(),
                options: server.options.clone(),
            },
        });
        graph.edges.push(Edge {
            from: parent_id.to_string(),
            to: server_id,
            kind: EdgeKind::Server,
            label: None,
            acl_name: None,
        });
    }
}

/// ACL name → predicate text, from raw `name condition` strings.
fn build_acl_map(acls: &[String]) -> HashMap<&str, &str> {
    acls.iter()
        .filter_map(|acl| {
            let (name, condition) = acl.split_once(char::is_whitespace)?;
            let condition = condition.trim();
            (!condition.is_empty()).then_some((name, condition))
        })
        .collect()
}

fn conditional_label(condition: &str, acl_map: &HashMap<&str, &str>) -> String {
    acl_map
        .get(condition)
        .and_then(|definition| HOST_MATCH_RE.captures(definition))
        .map(|caps| format!("{condition}: {}", &caps[1]))
        .unwrap_or_else(|| condition.to_string())
}
