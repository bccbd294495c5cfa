use crate::models::{
    computer_spec::ComputerSpec,
    error::{Entity, ReconcileError},
    node::{Node, NodeStatus},
};
use std::sync::Arc;

/// Canonical list of worker nodes, keyed by `id`.
///
/// Reads hand out the current `Arc` snapshot. Mutations copy on write, so a snapshot someone is
/// still holding never changes underneath them.
#[derive(Debug, Default, Clone)]
pub struct NodeRegistry {
    nodes: Arc<Vec<Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<Node>> {
        Arc::clone(&self.nodes)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Replace everything with a fresh `list_node` result. Repeated ids collapse onto the first
    /// position with the data of the last occurrence.
    pub fn replace_all(&mut self, nodes: Vec<Node>) {
        let mut unique: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes {
            match unique.iter_mut().find(|n| n.id == node.id) {
                Some(existing) => {
                    tracing::warn!(id = %node.id, "Node listed twice, keeping the last entry");
                    *existing = node;
                }
                None => unique.push(node),
            }
        }
        self.nodes = Arc::new(unique);
    }

    /// Handle a discovery announcement. Never creates a second entry for the same id.
    pub fn upsert_by_discovery(&mut self, id: &str, spec: Option<ComputerSpec>) -> Node {
        let nodes = Arc::make_mut(&mut self.nodes);
        match nodes.iter_mut().find(|n| n.id == id) {
            Some(node) => {
                if let Some(spec) = spec {
                    // only replace names we made up ourselves, never one the operator chose
                    let generated = node.name == node.id
                        || node.spec.as_ref().is_some_and(|s| s.host == node.name);
                    if generated {
                        node.name = spec.host.clone();
                    }
                    node.spec = Some(spec);
                }
                node.status = NodeStatus::Idle;
                node.clone()
            }
            None => {
                let node = Node::discovered(id, spec);
                nodes.push(node.clone());
                node
            }
        }
    }

    /// Insert or refresh a node record, e.g. the answer to `create_node`. Hardware and activity
    /// already learned from discovery survive a record that omits them.
    pub fn upsert(&mut self, mut node: Node) {
        let nodes = Arc::make_mut(&mut self.nodes);
        match nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => {
                if node.spec.is_none() {
                    node.spec = existing.spec.take();
                }
                if node.activity.is_none() {
                    node.activity = existing.activity.take();
                }
                *existing = node;
            }
            None => nodes.push(node),
        }
    }

    /// Status reports may arrive for nodes we have not discovered yet; the caller decides how
    /// loudly to log the NotFound.
    pub fn mark_status(&mut self, id: &str, status: NodeStatus) -> Result<(), ReconcileError> {
        let index = self.position(id)?;
        let node = &mut Arc::make_mut(&mut self.nodes)[index];
        node.status = status;
        node.activity = None;
        Ok(())
    }

    /// Record a status message that is not one of the known states.
    pub fn mark_activity(&mut self, id: &str, message: &str) -> Result<(), ReconcileError> {
        let index = self.position(id)?;
        Arc::make_mut(&mut self.nodes)[index].activity = Some(message.to_owned());
        Ok(())
    }

    /// Remove by id. Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        Some(Arc::make_mut(&mut self.nodes).remove(index))
    }

    fn position(&self, id: &str) -> Result<usize, ReconcileError> {
        self.nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| ReconcileError::not_found(Entity::Node, id))
    }
}
