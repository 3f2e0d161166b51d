//! Offline mirror of the live processing graph.
//!
//! Tracks feed bus inputs through their sends and the master mix through
//! their own chain; buses are summed afterwards and the master chain runs
//! last. Everything is owned by one render session.

mod arena;
mod builder;
mod player;
mod strip;

pub use arena::{PluginArena, PluginSlot};
pub use builder::{build_graph, rendered_tracks};
pub use player::{schedule_region, RegionPlayer, ScheduledSegment};
pub use strip::{BusStrip, MasterChain, SendRoute, TrackStrip};

use crate::automation::{AutomationParameter, AutomationTarget};
use crate::buffer::{AudioBuffer, BufferConfig};
use crate::error::RenderError;
use crate::project::TrackId;

pub struct OfflineGraph {
    config: BufferConfig,
    arena: PluginArena,
    buses: Vec<BusStrip>,
    tracks: Vec<TrackStrip>,
    master: MasterChain,
    output: AudioBuffer,
    position: u64,
}

impl OfflineGraph {
    pub fn new(
        config: BufferConfig,
        arena: PluginArena,
        buses: Vec<BusStrip>,
        tracks: Vec<TrackStrip>,
        master: MasterChain,
    ) -> Self {
        let output = AudioBuffer::from_config(&config);
        Self {
            config,
            arena,
            buses,
            tracks,
            master,
            output,
            position: 0,
        }
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Next output frame to render.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn tracks(&self) -> &[TrackStrip] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&TrackStrip> {
        self.tracks.iter().find(|track| track.id == id)
    }

    /// Hands sampler events with a timestamp before `end` to their
    /// instruments.
    pub fn dispatch_sampler_events(&mut self, end: u64) -> usize {
        self.tracks
            .iter_mut()
            .filter_map(|track| track.instrument_mut())
            .map(|backend| backend.dispatch_until(end))
            .sum()
    }

    /// Renders the next `frames` frames (at most one block) through the
    /// whole graph and returns the master output.
    pub fn render(&mut self, frames: usize) -> Result<&AudioBuffer, RenderError> {
        let frames = frames.min(self.config.block_size);
        let Self {
            arena,
            buses,
            tracks,
            master,
            output,
            position,
            ..
        } = self;

        output.set_len(frames);
        for bus in buses.iter_mut() {
            bus.begin(frames);
        }
        for track in tracks.iter_mut() {
            track
                .render(*position, frames, arena, buses, output)
                .map_err(|source| RenderError::Processing { source })?;
        }
        for bus in buses.iter_mut() {
            bus.render(arena, output)
                .map_err(|source| RenderError::Processing { source })?;
        }
        master.process(output);
        *position += frames as u64;
        Ok(&*output)
    }
}

impl AutomationTarget for OfflineGraph {
    fn apply_automation(&mut self, track: TrackId, parameter: AutomationParameter, value: f32) {
        if let Some(strip) = self.tracks.iter_mut().find(|strip| strip.id == track) {
            strip.set_parameter(parameter, value);
        }
    }
}

impl std::fmt::Debug for OfflineGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineGraph")
            .field("tracks", &self.tracks.len())
            .field("buses", &self.buses.len())
            .field("plugins", &self.arena.len())
            .field("position", &self.position)
            .finish()
    }
}
