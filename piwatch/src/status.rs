//! Status
//!
//! Per-node reachability indicator, driven only by summary poll outcomes.
//! The feed engine never touches it.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// No poll has completed for this node yet.
    Unknown,
    Healthy,
    Unreachable,
}

pub struct StatusBoard {
    nodes: HashMap<String, NodeStatus>,
}

impl StatusBoard {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> StatusBoard {
        StatusBoard {
            nodes: names
                .into_iter()
                .map(|n| (n.to_string(), NodeStatus::Unknown))
                .collect(),
        }
    }

    pub fn get(&self, node: &str) -> NodeStatus {
        self.nodes
            .get(node)
            .copied()
            .unwrap_or(NodeStatus::Unknown)
    }

    pub fn mark_success(&mut self, node: &str) {
        self.set(node, NodeStatus::Healthy);
    }

    /// Transport failures and payload-embedded errors both land here.
    pub fn mark_failure(&mut self, node: &str) {
        self.set(node, NodeStatus::Unreachable);
    }

    fn set(&mut self, node: &str, status: NodeStatus) {
        self.nodes.insert(node.to_string(), status);
    }
}
