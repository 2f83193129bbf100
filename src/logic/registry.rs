//! Node registry - cooperating nodes that receive mitigation fan-out

use chrono::Utc;
use parking_lot::RwLock;

use crate::models::Node;

#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<Vec<Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node-1..node-count`
    pub fn bootstrap(&self, count: usize) {
        for i in 1..=count {
            self.register(&format!("node-{}", i));
        }
        tracing::info!("Node registry bootstrapped with {} nodes", self.len());
    }

    /// Idempotent; returns the node and whether it was created
    pub fn register(&self, node_id: &str) -> (Node, bool) {
        let mut nodes = self.nodes.write();
        if let Some(existing) = nodes.iter().find(|n| n.node_id == node_id) {
            return (existing.clone(), false);
        }

        let node = Node::new(node_id);
        nodes.push(node.clone());
        tracing::debug!("Registered node {}", node_id);
        (node, true)
    }

    /// Credit one blocked threat to every node; returns how many were credited
    pub fn record_block(&self) -> usize {
        let now = Utc::now();
        let mut nodes = self.nodes.write();
        for node in nodes.iter_mut() {
            node.blocked_threats += 1;
            node.last_update = now;
        }
        nodes.len()
    }

    pub fn snapshot(&self) -> Vec<Node> {
        self.nodes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
