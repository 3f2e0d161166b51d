use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::project::PluginConfig;
use crate::{AudioBuffer, BufferConfig};

/// Unique identifier for a plugin instance within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(pub u64);

/// Metadata describing a plugin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    pub vendor: String,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vendor: vendor.into(),
        }
    }
}

impl fmt::Display for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.vendor)
    }
}

/// Errors that can be returned by plugin operations.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unknown plugin kind `{0}`")]
    UnknownKind(String),
    #[error("plugin reported an invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("plugin failed to prepare: {0}")]
    Prepare(#[source] anyhow::Error),
}

/// Audio processor cloned into the offline graph.
pub trait AudioProcessor: Send {
    fn descriptor(&self) -> PluginDescriptor;
    fn prepare(&mut self, config: &BufferConfig) -> anyhow::Result<()>;
    fn process(&mut self, buffer: &mut AudioBuffer) -> anyhow::Result<()>;

    /// Returns the processing latency in samples introduced by the processor.
    fn latency_samples(&self) -> usize {
        0
    }

    /// Seconds of audible output the processor keeps producing after its input
    /// falls silent (reverb decay, delay feedback).
    fn tail_seconds(&self) -> f64 {
        0.0
    }
}

/// Read-only view of a plugin slot in the live processing graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePlugin {
    pub id: PluginId,
    pub kind: String,
    pub descriptor: PluginDescriptor,
    pub bypassed: bool,
    pub latency_samples: usize,
    pub tail_seconds: f64,
    /// Opaque persisted state the clone is restored from.
    pub state: serde_json::Value,
}

impl LivePlugin {
    pub fn is_active(&self) -> bool {
        !self.bypassed
    }
}

impl From<&PluginConfig> for LivePlugin {
    fn from(config: &PluginConfig) -> Self {
        Self {
            id: config.id,
            kind: config.kind.clone(),
            descriptor: PluginDescriptor::new(config.kind.clone(), config.name.clone(), "Stori"),
            bypassed: config.bypassed,
            latency_samples: config.latency_samples,
            tail_seconds: config.tail_seconds,
            state: config.state.clone(),
        }
    }
}

/// Capability to produce independent processor instances that read the same
/// persisted configuration as a live plugin.
pub trait PluginHost: Send + Sync {
    fn instantiate(
        &self,
        plugin: &LivePlugin,
        config: &BufferConfig,
    ) -> Result<Box<dyn AudioProcessor>, PluginError>;
}

/// Total latency of the active plugins of a chain.
pub fn chain_latency(chain: &[LivePlugin]) -> usize {
    chain
        .iter()
        .filter(|plugin| plugin.is_active())
        .map(|plugin| plugin.latency_samples)
        .sum()
}

/// Longest tail among the active plugins of a chain.
pub fn chain_tail_seconds(chain: &[LivePlugin]) -> f64 {
    chain
        .iter()
        .filter(|plugin| plugin.is_active())
        .map(|plugin| plugin.tail_seconds)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin(id: u64, bypassed: bool, latency: usize, tail: f64) -> LivePlugin {
        LivePlugin {
            id: PluginId(id),
            kind: "test".into(),
            descriptor: PluginDescriptor::new("test", "Test", "Stori"),
            bypassed,
            latency_samples: latency,
            tail_seconds: tail,
            state: serde_json::Value::Null,
        }
    }

    #[test]
    fn bypassed_plugins_do_not_count() {
        let chain = vec![plugin(1, false, 64, 1.5), plugin(2, true, 512, 9.0), plugin(3, false, 32, 0.2)];
        assert_eq!(chain_latency(&chain), 96);
        assert_eq!(chain_tail_seconds(&chain), 1.5);
    }
}
