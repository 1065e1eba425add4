use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::Pipeline`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the channel feeding each child node.
    ///
    /// With the default of 1 a node blocks on its second undelivered write,
    /// so the slowest consumer paces the whole graph. Values below 1 are
    /// treated as 1.
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1,
        }
    }
}

impl PipelineConfig {
    pub fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            channel_capacity: capacity,
        }
    }

    pub(crate) fn effective_capacity(&self) -> usize {
        self.channel_capacity.max(1)
    }
}
