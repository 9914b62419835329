//! Flat dataflow graphs: nodes joined by explicit port-to-port links.
//!
//! Unlike [`crate::Program`], a graph has no nesting and no by-reference
//! inputs; every dependency between nodes is a [`Link`].

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: String,
    /// Canvas position, carried for the editor and ignored by execution.
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        GraphNode {
            id: id.into(),
            kind: kind.into(),
            x: 0.0,
            y: 0.0,
            config: serde_json::Value::Null,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRef {
    pub node_id: String,
    pub port_key: String,
}

impl PortRef {
    pub fn new(node_id: impl Into<String>, port_key: impl Into<String>) -> Self {
        PortRef {
            node_id: node_id.into(),
            port_key: port_key.into(),
        }
    }
}

/// A directed edge from one node's output port to another node's input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub from: PortRef,
    pub to: PortRef,
}

impl Link {
    pub fn new(id: impl Into<String>, from: PortRef, to: PortRef) -> Self {
        Link {
            id: id.into(),
            from,
            to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphViolation {
    #[error("node id '{0}' is used more than once")]
    DuplicateNode(String),

    #[error("link id '{0}' is used more than once")]
    DuplicateLink(String),

    #[error("link '{link}' refers to missing node '{node}'")]
    DanglingLink { link: String, node: String },

    #[error("link '{link}' feeds port '{port}' of node '{node}', which already has an incoming link")]
    PortConflict {
        link: String,
        node: String,
        port: String,
    },
}

impl GraphViolation {
    /// Id of the node or link a host editor should highlight.
    pub fn element_id(&self) -> &str {
        match self {
            GraphViolation::DuplicateNode(id) | GraphViolation::DuplicateLink(id) => id,
            GraphViolation::DanglingLink { link, .. } | GraphViolation::PortConflict { link, .. } => {
                link
            }
        }
    }
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Links whose target is `node_id`.
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.to.node_id == node_id)
    }

    /// Links whose source is `node_id`.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.from.node_id == node_id)
    }

    /// Check ids are unique, links resolve and no input port is fed twice.
    ///
    /// Cycles are not a structural violation; they are reported when the
    /// graph is executed.
    pub fn validate(&self) -> Result<(), Vec<GraphViolation>> {
        let mut violations = Vec::new();

        let mut node_ids = BTreeSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                violations.push(GraphViolation::DuplicateNode(node.id.clone()));
            }
        }

        let mut link_ids = HashSet::new();
        let mut fed_ports = HashSet::new();
        for link in &self.links {
            if !link_ids.insert(link.id.as_str()) {
                violations.push(GraphViolation::DuplicateLink(link.id.clone()));
            }
            for end in [&link.from, &link.to] {
                if !node_ids.contains(end.node_id.as_str()) {
                    violations.push(GraphViolation::DanglingLink {
                        link: link.id.clone(),
                        node: end.node_id.clone(),
                    });
                }
            }
            if !fed_ports.insert(&link.to) {
                violations.push(GraphViolation::PortConflict {
                    link: link.id.clone(),
                    node: link.to.node_id.clone(),
                    port: link.to.port_key.clone(),
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
