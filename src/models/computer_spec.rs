use serde::{Deserialize, Serialize};

/// Hardware description a worker shares when it announces itself on the network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ComputerSpec {
    pub host: String,
    pub os: String,
    pub arch: String,
    /// total memory in bytes
    pub memory: u64,
    #[serde(default)]
    pub gpu: Option<String>,
    pub cpu: String,
    pub cores: usize,
}
