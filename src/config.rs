use crate::services::{backend_client::LIST_NODE, dedup::DEFAULT_WINDOW};
use std::{env, time::Duration};

const DEDUP_WINDOW_VAR: &str = "BLENDFARM_DEDUP_WINDOW_MS";
const NODE_LIST_COMMAND_VAR: &str = "BLENDFARM_NODE_LIST_COMMAND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long repeated notifications for the same key are swallowed.
    pub dedup_window: Duration,
    /// `list_node` on current backends, `list_workers` on older ones.
    pub node_list_command: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dedup_window: DEFAULT_WINDOW,
            node_list_command: LIST_NODE.to_owned(),
        }
    }
}

impl Config {
    /// Read the configuration from the environment (and `.env`, if the caller loaded it).
    /// Unset or unparsable values fall back to the defaults.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(DEDUP_WINDOW_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.dedup_window = Duration::from_millis(ms),
                Err(e) => tracing::warn!("Ignoring {DEDUP_WINDOW_VAR}={raw:?}: {e}"),
            }
        }

        if let Some(command) = lookup(NODE_LIST_COMMAND_VAR).filter(|c| !c.trim().is_empty()) {
            config.node_list_command = command.trim().to_owned();
        }

        config
    }
}
