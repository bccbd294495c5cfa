use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directories the host machine operates from. Owned and persisted by the backend; the client
/// only displays them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSetting {
    /// Where blender installations are unpacked.
    pub install_path: PathBuf,
    /// Public directory to store all finished render image.
    #[serde(alias = "render_dir")]
    pub render_path: PathBuf,
    /// Working copies of blend files.
    #[serde(alias = "blend_dir")]
    pub cache_path: PathBuf,
}
