//! Stori Render
//! ============
//! Offline, faster-than-realtime rendering of a project snapshot to an audio
//! file. A render builds a private processing graph mirroring the live mix,
//! schedules audio regions and MIDI, drives it block by block with automation
//! applied at 120 Hz and encodes the captured result.

pub mod automation;
pub mod buffer;
pub mod builtin;
pub mod config;
pub mod duration;
pub mod encode;
pub mod error;
pub mod graph;
pub mod live;
pub mod media;
pub mod pdc;
pub mod plugin;
pub mod project;
pub mod render;
pub mod sched;
pub mod smf;
pub mod synth;
pub mod time;

pub use buffer::{AudioBuffer, AudioClip, BufferConfig, ChannelLayout};
pub use builtin::BuiltinPlugins;
pub use config::{BitDepth, DitherKind, ExportFormat, RenderSettings};
pub use duration::RenderLength;
pub use encode::{EncodeError, FormatFallback};
pub use error::{PluginOwner, RenderError, RenderResult};
pub use live::{LiveGraph, MasterSettings, SnapshotGraph};
pub use media::{AssetProvider, DecodedAudio, FileAssetProvider, MediaError, MemoryAssets};
pub use plugin::{AudioProcessor, LivePlugin, PluginDescriptor, PluginError, PluginHost, PluginId};
pub use project::{AssetId, AudioRegion, Bus, BusId, MidiRegion, Project, Track, TrackId, TrackSend};
pub use render::{CancelHandle, ExportReport, RenderEngine, RenderJob, RenderServices};
pub use smf::SmfError;
pub use synth::{SampleBankProvider, SoundFontError, SoundFontProvider};
pub use time::Tempo;
