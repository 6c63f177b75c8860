//! Scene configuration
//!
//! Loaded from TOML. Every field is optional and falls back to its default.
//!
//! ```toml
//! node_channel_capacity = 32
//! component_channel_capacity = 8
//! debug_draw_channel_capacity = 64
//! tag_passes_per_system = 8
//! max_node_slots = 1048576
//! ```

use std::path::Path;

use serde::Deserialize;
use strata_core::Result;

/// Tunables for a [`Scene`](crate::Scene)
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Initial capacity, in events, of every node channel
    pub node_channel_capacity: usize,
    /// Capacity, in events, registered component container channels are
    /// grown to
    pub component_channel_capacity: usize,
    /// Initial capacity of the debug line channel
    pub debug_draw_channel_capacity: usize,
    /// Maximum rounds of tag callbacks run after one system returns.
    /// Tags emitted by the last allowed round are dropped.
    pub tag_passes_per_system: u32,
    /// Node indices read from an archive must be below this
    pub max_node_slots: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            node_channel_capacity: 32,
            component_channel_capacity: 8,
            debug_draw_channel_capacity: 64,
            tag_passes_per_system: 8,
            max_node_slots: 1 << 20,
        }
    }
}

impl SceneConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
