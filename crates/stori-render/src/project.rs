//! Read-only project snapshot handed to the render engine.
//!
//! All musical positions are expressed in beats and converted to absolute time
//! through the project tempo (`seconds = beats * 60 / tempo`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::automation::{AutomationParameter, CurveShape};
use crate::plugin::PluginId;
use crate::synth::SynthPreset;
use crate::time::{Tempo, TimeSignature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(pub u64);

/// Reference to a source audio asset resolved by an [`AssetProvider`](crate::media::AssetProvider).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track {}", self.0)
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus {}", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tempo: Tempo,
    #[serde(default)]
    pub time_signature: TimeSignature,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub buses: Vec<Bus>,
}

impl Project {
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == id)
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.iter().find(|bus| bus.id == id)
    }

    pub fn has_regions(&self) -> bool {
        self.tracks
            .iter()
            .any(|track| !track.audio_regions.is_empty() || !track.midi_regions.is_empty())
    }

    pub fn any_solo(&self) -> bool {
        self.tracks.iter().any(|track| track.solo)
    }

    /// Tracks that take part in an export: enabled and not frozen.
    pub fn renderable_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks
            .iter()
            .filter(|track| track.enabled && !track.frozen)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub mixer: MixerSettings,
    #[serde(default)]
    pub audio_regions: Vec<AudioRegion>,
    #[serde(default)]
    pub midi_regions: Vec<MidiRegion>,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    #[serde(default)]
    pub sends: Vec<TrackSend>,
    #[serde(default)]
    pub instrument: Option<InstrumentPreset>,
    #[serde(default)]
    pub automation: Vec<AutomationLane>,
}

impl Track {
    pub fn new(id: u64) -> Self {
        Self {
            id: TrackId(id),
            name: String::new(),
            enabled: true,
            frozen: false,
            muted: false,
            solo: false,
            mixer: MixerSettings::default(),
            audio_regions: Vec::new(),
            midi_regions: Vec::new(),
            plugins: Vec::new(),
            sends: Vec::new(),
            instrument: None,
            automation: Vec::new(),
        }
    }

    /// A track is audible unless muted or silenced by another track's solo.
    pub fn is_audible(&self, any_solo: bool) -> bool {
        !self.muted && (!any_solo || self.solo)
    }

    pub fn has_midi(&self) -> bool {
        self.midi_regions.iter().any(|region| !region.muted)
    }

    pub fn automation_for(&self, parameter: AutomationParameter) -> Option<&AutomationLane> {
        self.automation
            .iter()
            .find(|lane| lane.parameter == parameter && !lane.points.is_empty())
    }
}

fn default_true() -> bool {
    true
}

fn default_volume() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerSettings {
    /// Linear fader gain in `[0, 2]`.
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Pan position in `[-1, 1]`.
    #[serde(default)]
    pub pan: f32,
    #[serde(default)]
    pub eq: EqSettings,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
            eq: EqSettings::default(),
        }
    }
}

/// 3-band EQ gains in dB, each within `[-12, 12]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EqSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub low_db: f32,
    #[serde(default)]
    pub mid_db: f32,
    #[serde(default)]
    pub high_db: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioRegion {
    pub asset: AssetId,
    pub start_beat: f64,
    pub duration_beats: f64,
    /// Offset into the source file, in seconds.
    #[serde(default)]
    pub offset_seconds: f64,
    #[serde(default)]
    pub fade_in_seconds: f64,
    #[serde(default)]
    pub fade_out_seconds: f64,
    #[serde(default = "default_volume")]
    pub gain: f32,
    #[serde(default)]
    pub looped: bool,
    /// Length of one loop repetition. When absent the remaining source length
    /// after `offset_seconds` is used.
    #[serde(default)]
    pub loop_unit_beats: Option<f64>,
}

impl AudioRegion {
    pub fn new(asset: impl Into<String>, start_beat: f64, duration_beats: f64) -> Self {
        Self {
            asset: AssetId(asset.into()),
            start_beat,
            duration_beats,
            offset_seconds: 0.0,
            fade_in_seconds: 0.0,
            fade_out_seconds: 0.0,
            gain: 1.0,
            looped: false,
            loop_unit_beats: None,
        }
    }

    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.duration_beats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiRegion {
    pub start_beat: f64,
    pub duration_beats: f64,
    #[serde(default)]
    pub notes: Vec<MidiNote>,
    #[serde(default)]
    pub controllers: Vec<ControllerEvent>,
    #[serde(default)]
    pub pitch_bends: Vec<PitchBendEvent>,
    #[serde(default)]
    pub looped: bool,
    #[serde(default = "default_loop_count")]
    pub loop_count: u32,
    #[serde(default)]
    pub muted: bool,
}

fn default_loop_count() -> u32 {
    1
}

impl MidiRegion {
    pub fn new(start_beat: f64, duration_beats: f64) -> Self {
        Self {
            start_beat,
            duration_beats,
            notes: Vec::new(),
            controllers: Vec::new(),
            pitch_bends: Vec::new(),
            looped: false,
            loop_count: 1,
            muted: false,
        }
    }

    pub fn with_note(mut self, pitch: u8, velocity: u8, start_beat: f64, duration_beats: f64) -> Self {
        self.notes.push(MidiNote {
            pitch,
            velocity,
            start_beat,
            duration_beats,
        });
        self
    }

    /// Number of times the region content plays.
    pub fn repetitions(&self) -> u32 {
        if self.looped {
            self.loop_count.max(1)
        } else {
            1
        }
    }

    pub fn total_duration_beats(&self) -> f64 {
        self.duration_beats * f64::from(self.repetitions())
    }

    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.total_duration_beats()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidiNote {
    pub pitch: u8,
    pub velocity: u8,
    /// Start position relative to the region start.
    pub start_beat: f64,
    pub duration_beats: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerEvent {
    pub controller: u8,
    pub value: u8,
    pub beat: f64,
}

/// Pitch bend with a signed 14-bit value in `[-8192, 8191]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchBendEvent {
    pub value: i16,
    pub beat: f64,
}

/// Persisted plugin slot configuration as stored in the project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    pub id: PluginId,
    /// Identifier understood by the [`PluginHost`](crate::plugin::PluginHost).
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bypassed: bool,
    #[serde(default)]
    pub state: serde_json::Value,
    /// Last latency reported by the live instance.
    #[serde(default)]
    pub latency_samples: usize,
    /// Last tail time reported by the live instance.
    #[serde(default)]
    pub tail_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSend {
    pub bus: BusId,
    /// Send level in `[0, 1]`.
    pub level: f32,
    #[serde(default)]
    pub pre_fader: bool,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl Bus {
    pub fn new(id: u64) -> Self {
        Self {
            id: BusId(id),
            name: String::new(),
            plugins: Vec::new(),
            volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentPreset {
    #[serde(default)]
    pub name: String,
    pub kind: InstrumentKind,
}

/// Selects which synthesis backend a MIDI track uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Built-in oscillator synthesizer driven by a user preset.
    Synth(SynthPreset),
    /// General MIDI program played back from sample data.
    GeneralMidi { program: u8 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationLane {
    pub parameter: AutomationParameter,
    #[serde(default)]
    pub points: Vec<AutomationPoint>,
}

/// Curve breakpoint with a normalised `0..=1` value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomationPoint {
    pub beat: f64,
    pub value: f32,
    #[serde(default)]
    pub shape: CurveShape,
}
