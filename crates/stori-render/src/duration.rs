//! Render length estimation: musical content plus the processing tail.

use crate::config::{TAIL_CAP_SECONDS, TAIL_FLOOR_SECONDS};
use crate::live::LiveGraph;
use crate::plugin::chain_tail_seconds;
use crate::project::Project;
use crate::time::seconds_to_frames;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderLength {
    pub content_seconds: f64,
    pub tail_seconds: f64,
}

impl RenderLength {
    pub fn total_seconds(&self) -> f64 {
        self.content_seconds + self.tail_seconds
    }

    pub fn total_frames(&self, sample_rate: f32) -> u64 {
        seconds_to_frames(self.total_seconds(), sample_rate)
    }
}

/// Latest region end over all tracks, in beats.
pub fn max_end_beat(project: &Project) -> f64 {
    project
        .tracks
        .iter()
        .flat_map(|track| {
            let audio = track.audio_regions.iter().map(|region| region.end_beat());
            let midi = track.midi_regions.iter().map(|region| region.end_beat());
            audio.chain(midi)
        })
        .filter(|beat| beat.is_finite())
        .fold(0.0, f64::max)
}

/// Longest tail reported by any active plugin on a track or bus.
pub fn max_plugin_tail(project: &Project, live: &dyn LiveGraph) -> f64 {
    let tracks = project
        .tracks
        .iter()
        .map(|track| chain_tail_seconds(&live.plugin_chain(track.id)));
    let buses = project
        .buses
        .iter()
        .map(|bus| chain_tail_seconds(&live.bus_plugin_chain(bus.id)));
    tracks.chain(buses).fold(0.0, f64::max)
}

pub fn estimate(project: &Project, live: &dyn LiveGraph) -> RenderLength {
    let content_seconds = project.tempo.beats_to_seconds(max_end_beat(project)).max(0.0);
    let tail_seconds = max_plugin_tail(project, live)
        .min(TAIL_CAP_SECONDS)
        .max(TAIL_FLOOR_SECONDS);
    RenderLength {
        content_seconds,
        tail_seconds,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::live::SnapshotGraph;
    use crate::plugin::PluginId;
    use crate::project::{AudioRegion, MidiRegion, PluginConfig, Track};
    use crate::time::Tempo;

    fn reverb(tail_seconds: f64, bypassed: bool) -> PluginConfig {
        PluginConfig {
            id: PluginId(9),
            kind: "stori.delay".into(),
            name: "Verb".into(),
            bypassed,
            state: serde_json::Value::Null,
            latency_samples: 0,
            tail_seconds,
        }
    }

    fn project_with(tail: Option<PluginConfig>) -> Project {
        let mut audio = Track::new(1);
        audio.audio_regions.push(AudioRegion::new("a.wav", 0.0, 8.0));
        let mut keys = Track::new(2);
        let mut region = MidiRegion::new(4.0, 4.0);
        region.looped = true;
        region.loop_count = 2;
        keys.midi_regions.push(region);
        keys.plugins.extend(tail);
        Project {
            tempo: Tempo(120.0),
            tracks: vec![audio, keys],
            ..Project::default()
        }
    }

    fn estimate_for(project: Project) -> RenderLength {
        let project = Arc::new(project);
        let live = SnapshotGraph::new(Arc::clone(&project));
        estimate(&project, &live)
    }

    #[test]
    fn looped_midi_extends_content() {
        let length = estimate_for(project_with(None));
        // 4 + 2 * 4 beats at 120 BPM.
        assert!((length.content_seconds - 6.0).abs() < 1e-9);
        assert_eq!(length.tail_seconds, TAIL_FLOOR_SECONDS);
    }

    #[test]
    fn tail_is_capped() {
        let length = estimate_for(project_with(Some(reverb(12.0, false))));
        assert_eq!(length.tail_seconds, TAIL_CAP_SECONDS);
        assert!((length.total_seconds() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn bypassed_tail_is_ignored() {
        let length = estimate_for(project_with(Some(reverb(2.0, true))));
        assert_eq!(length.tail_seconds, TAIL_FLOOR_SECONDS);
        let length = estimate_for(project_with(Some(reverb(2.0, false))));
        assert_eq!(length.tail_seconds, 2.0);
    }
}
