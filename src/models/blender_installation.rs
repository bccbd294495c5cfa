use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A blender executable registered on the host machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlenderInstallation {
    /// Path to blender executable on the system.
    pub executable: PathBuf,
    /// Version of blender installed on the system.
    pub version: Version,
}
