use super::computer_spec::ComputerSpec;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    #[default]
    Idle,
    Busy,
    Offline,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Idle => write!(f, "Idle"),
            NodeStatus::Busy => write!(f, "Busy"),
            NodeStatus::Offline => write!(f, "Offline"),
        }
    }
}

impl FromStr for NodeStatus {
    type Err = ();

    // status messages come straight from the worker, so be lenient with casing and padding.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(NodeStatus::Idle),
            "busy" => Ok(NodeStatus::Busy),
            "offline" => Ok(NodeStatus::Offline),
            _ => Err(()),
        }
    }
}

/// A worker machine known to this client.
///
/// `id` is the only identity. `name` is a display label and may change or collide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub spec: Option<ComputerSpec>,
    pub status: NodeStatus,
    /// Last free-text status message that did not name a [NodeStatus].
    pub activity: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            spec: None,
            status: NodeStatus::Idle,
            activity: None,
        }
    }

    /// Create a node from a discovery announcement. The host name is the best label we have.
    pub fn discovered(id: impl Into<String>, spec: Option<ComputerSpec>) -> Self {
        let id = id.into();
        let name = spec
            .as_ref()
            .map(|s| s.host.clone())
            .unwrap_or_else(|| id.clone());
        Self {
            id,
            name,
            spec,
            status: NodeStatus::Idle,
            activity: None,
        }
    }
}

// Wire shape of a node as returned by `list_node` / `create_node`. Older backends omit the
// name and status fields entirely.
#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    spec: Option<ComputerSpec>,
    #[serde(default)]
    status: Option<NodeStatus>,
    #[serde(default)]
    activity: Option<String>,
}

impl From<NodeRecord> for Node {
    fn from(record: NodeRecord) -> Self {
        let name = record
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| record.spec.as_ref().map(|s| s.host.clone()))
            .unwrap_or_else(|| record.id.clone());
        Self {
            id: record.id,
            name,
            spec: record.spec,
            status: record.status.unwrap_or_default(),
            activity: record.activity,
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        NodeRecord::deserialize(deserializer).map(Node::from)
    }
}

impl AsRef<str> for Node {
    fn as_ref(&self) -> &str {
        &self.id
    }
}
