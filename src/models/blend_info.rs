use super::job::Frame;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata the backend extracted from a blend file. Only used to pre-fill a new job form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlendInfo {
    pub path: String,
    #[serde(alias = "last_version")]
    pub blend_version: String,
    #[serde(alias = "frame_start")]
    pub start: Frame,
    #[serde(alias = "frame_end")]
    pub end: Frame,
    #[serde(default)]
    pub output: PathBuf,
}
