//! Plugin delay compensation across track chains.

use std::collections::HashMap;

use crate::live::LiveGraph;
use crate::plugin::chain_latency;
use crate::project::TrackId;

/// Per-track delay, in samples, that lines every track up with the slowest
/// plugin chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelayCompensation {
    max_latency: usize,
    offsets: HashMap<TrackId, usize>,
}

impl DelayCompensation {
    /// Queries the live chains of `tracks`; bypassed plugins do not count.
    pub fn from_live(live: &dyn LiveGraph, tracks: &[TrackId]) -> Self {
        let latencies: Vec<_> = tracks
            .iter()
            .map(|track| (*track, chain_latency(&live.plugin_chain(*track))))
            .collect();
        Self::from_latencies(&latencies)
    }

    pub fn from_latencies(latencies: &[(TrackId, usize)]) -> Self {
        let max_latency = latencies
            .iter()
            .map(|(_, latency)| *latency)
            .max()
            .unwrap_or(0);
        let offsets = latencies
            .iter()
            .map(|(track, latency)| (*track, max_latency.saturating_sub(*latency)))
            .collect();
        Self {
            max_latency,
            offsets,
        }
    }

    pub fn max_latency(&self) -> usize {
        self.max_latency
    }

    pub fn offset_samples(&self, track: TrackId) -> usize {
        self.offsets.get(&track).copied().unwrap_or(0)
    }

    pub fn offset_seconds(&self, track: TrackId, sample_rate: f32) -> f64 {
        self.offset_samples(track) as f64 / f64::from(sample_rate.max(1.0))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::live::SnapshotGraph;
    use crate::plugin::PluginId;
    use crate::project::{PluginConfig, Project, Track};

    #[test]
    fn zero_latency_track_waits_for_slowest_chain() {
        let pdc = DelayCompensation::from_latencies(&[(TrackId(1), 0), (TrackId(2), 128)]);
        assert_eq!(pdc.max_latency(), 128);
        assert_eq!(pdc.offset_samples(TrackId(1)), 128);
        assert_eq!(pdc.offset_samples(TrackId(2)), 0);
        assert!((pdc.offset_seconds(TrackId(1), 48_000.0) - 128.0 / 48_000.0).abs() < 1e-12);
    }

    #[test]
    fn bypassed_latency_is_ignored() {
        let mut slow = Track::new(2);
        slow.plugins.push(PluginConfig {
            id: PluginId(5),
            kind: "stori.gain".into(),
            name: String::new(),
            bypassed: true,
            state: serde_json::Value::Null,
            latency_samples: 512,
            tail_seconds: 0.0,
        });
        let project = Arc::new(Project {
            tracks: vec![Track::new(1), slow],
            ..Project::default()
        });
        let live = SnapshotGraph::new(Arc::clone(&project));
        let pdc = DelayCompensation::from_live(&live, &[TrackId(1), TrackId(2)]);
        assert_eq!(pdc.max_latency(), 0);
        assert_eq!(pdc.offset_samples(TrackId(1)), 0);
    }
}
