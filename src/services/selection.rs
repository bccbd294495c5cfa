use crate::models::node::Node;
use std::sync::Arc;

/// What the operator has picked: the job shown in the detail pane and the nodes a new job
/// should be sent to. Node membership is decided by id.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    job: Option<String>,
    nodes: Arc<Vec<Node>>,
}

impl Selection {
    pub fn selected_job(&self) -> Option<&str> {
        self.job.as_deref()
    }

    pub fn select_job(&mut self, job_id: Option<String>) {
        self.job = job_id;
    }

    pub fn selected_nodes(&self) -> Arc<Vec<Node>> {
        Arc::clone(&self.nodes)
    }

    pub fn is_selected(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == node_id)
    }

    /// Add the node if absent, drop it if present. Returns whether it is now selected.
    pub fn toggle_node(&mut self, node: &Node) -> bool {
        let nodes = Arc::make_mut(&mut self.nodes);
        match nodes.iter().position(|n| n.id == node.id) {
            Some(index) => {
                nodes.remove(index);
                false
            }
            None => {
                nodes.push(node.clone());
                true
            }
        }
    }

    /// "Select all" checkbox: either every node currently known, or nothing.
    pub fn set_all(&mut self, selected: bool, current: &Arc<Vec<Node>>) {
        self.nodes = if selected {
            Arc::clone(current)
        } else {
            Arc::default()
        };
    }

    pub fn clear_nodes(&mut self) {
        self.nodes = Arc::default();
    }

    /// Drop anything that is no longer in the registries and refresh the node records we
    /// still hold.
    pub fn retain_known(&mut self, nodes: &[Node], job_exists: impl Fn(&str) -> bool) {
        if self.job.as_deref().is_some_and(|id| !job_exists(id)) {
            self.job = None;
        }
        let stale = self.nodes.iter().any(|selected| {
            nodes
                .iter()
                .find(|n| n.id == selected.id)
                .map_or(true, |current| current != selected)
        });
        if stale {
            let refreshed = self
                .nodes
                .iter()
                .filter_map(|selected| nodes.iter().find(|n| n.id == selected.id).cloned())
                .collect();
            self.nodes = Arc::new(refreshed);
        }
    }
}
