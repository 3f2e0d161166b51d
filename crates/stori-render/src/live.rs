//! Accessors onto the live processing graph the offline render mirrors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::plugin::LivePlugin;
use crate::project::{BusId, EqSettings, Project, TrackId, TrackSend};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimiterSettings {
    pub enabled: bool,
    pub ceiling_db: f32,
    pub release_ms: f32,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ceiling_db: stori_dsp::limiter::DEFAULT_CEILING_DB,
            release_ms: stori_dsp::limiter::DEFAULT_RELEASE_MS,
        }
    }
}

/// Master EQ and limiter parameters as currently set in the live engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterSettings {
    #[serde(default)]
    pub eq: EqSettings,
    #[serde(default)]
    pub limiter: LimiterSettings,
}

/// Read-only accessors onto the live graph. Implementations must not touch
/// live audio state; everything returned is a copy.
pub trait LiveGraph: Send + Sync {
    fn plugin_chain(&self, track: TrackId) -> Vec<LivePlugin>;
    fn bus_plugin_chain(&self, bus: BusId) -> Vec<LivePlugin>;

    /// Sends currently wired in the live graph, or `None` to use the
    /// project snapshot's sends.
    fn track_sends(&self, _track: TrackId) -> Option<Vec<TrackSend>> {
        None
    }

    fn master_settings(&self) -> MasterSettings;
}

/// [`LiveGraph`] backed by the project snapshot's persisted plugin configs,
/// for renders without a running engine.
#[derive(Debug, Clone)]
pub struct SnapshotGraph {
    project: Arc<Project>,
    master: MasterSettings,
}

impl SnapshotGraph {
    pub fn new(project: Arc<Project>) -> Self {
        Self {
            project,
            master: MasterSettings::default(),
        }
    }

    pub fn with_master(mut self, master: MasterSettings) -> Self {
        self.master = master;
        self
    }
}

impl LiveGraph for SnapshotGraph {
    fn plugin_chain(&self, track: TrackId) -> Vec<LivePlugin> {
        self.project
            .track(track)
            .map(|track| track.plugins.iter().map(LivePlugin::from).collect())
            .unwrap_or_default()
    }

    fn bus_plugin_chain(&self, bus: BusId) -> Vec<LivePlugin> {
        self.project
            .bus(bus)
            .map(|bus| bus.plugins.iter().map(LivePlugin::from).collect())
            .unwrap_or_default()
    }

    fn master_settings(&self) -> MasterSettings {
        self.master
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginId;
    use crate::project::{Bus, PluginConfig, Track};

    #[test]
    fn snapshot_graph_mirrors_persisted_chains() {
        let mut track = Track::new(1);
        track.plugins.push(PluginConfig {
            id: PluginId(10),
            kind: "stori.gain".into(),
            name: "Gain".into(),
            bypassed: true,
            state: serde_json::json!({ "gain": 0.5 }),
            latency_samples: 0,
            tail_seconds: 0.0,
        });
        let mut bus = Bus::new(3);
        bus.plugins.push(PluginConfig {
            id: PluginId(11),
            kind: "stori.delay".into(),
            name: "Delay".into(),
            bypassed: false,
            state: serde_json::Value::Null,
            latency_samples: 0,
            tail_seconds: 2.0,
        });
        let project = Project {
            tracks: vec![track],
            buses: vec![bus],
            ..Project::default()
        };
        let graph = SnapshotGraph::new(Arc::new(project));
        let chain = graph.plugin_chain(TrackId(1));
        assert_eq!(chain.len(), 1);
        assert!(chain[0].bypassed);
        assert_eq!(graph.bus_plugin_chain(BusId(3))[0].tail_seconds, 2.0);
        assert!(graph.plugin_chain(TrackId(99)).is_empty());
        assert!(graph.track_sends(TrackId(1)).is_none());
    }

    #[test]
    fn master_settings_come_from_the_caller() {
        let graph = SnapshotGraph::new(Arc::new(Project::default()));
        assert_eq!(graph.master_settings(), MasterSettings::default());

        let master: MasterSettings =
            serde_json::from_str(r#"{ "limiter": { "enabled": false, "ceiling_db": -3.0, "release_ms": 80.0 } }"#)
                .unwrap();
        let graph = graph.with_master(master);
        assert!(!graph.master_settings().limiter.enabled);
        assert_eq!(graph.master_settings().limiter.ceiling_db, -3.0);
        assert_eq!(graph.master_settings().eq, EqSettings::default());
    }
}
