use super::job::Frame;
use serde::{Deserialize, Serialize};

// context for serde: https://serde.rs/enum-representations.html
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "ModeRecord")]
pub enum Mode {
    // JSON: {"Frame": i32}
    Frame(Frame),
    // JSON: {"Section": {"start": i32, "end": i32}}
    Section { start: Frame, end: Frame },
    // JSON: "Animation"
    #[default]
    Animation,
}

impl Mode {
    /// Range check for the variants that carry numbers. `Animation` uses the job's own range.
    pub fn is_valid(&self) -> bool {
        match self {
            Mode::Section { start, end } => start <= end,
            Mode::Frame(_) | Mode::Animation => true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeRecord {
    Canonical(CanonicalMode),
    // earlier backends sent the frame range inside the animation variant
    Legacy(LegacyMode),
}

#[derive(Deserialize)]
enum CanonicalMode {
    Frame(Frame),
    Section { start: Frame, end: Frame },
    Animation,
}

#[derive(Deserialize)]
enum LegacyMode {
    #[allow(dead_code)]
    Animation { start: Frame, end: Frame },
}

impl From<ModeRecord> for Mode {
    fn from(record: ModeRecord) -> Self {
        match record {
            ModeRecord::Canonical(CanonicalMode::Frame(frame)) => Mode::Frame(frame),
            ModeRecord::Canonical(CanonicalMode::Section { start, end }) => {
                Mode::Section { start, end }
            }
            ModeRecord::Canonical(CanonicalMode::Animation) => Mode::Animation,
            ModeRecord::Legacy(LegacyMode::Animation { .. }) => Mode::Animation,
        }
    }
}
