use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::encode::EncodeError;
use crate::media::MediaError;
use crate::plugin::{PluginError, PluginId};
use crate::project::{AssetId, TrackId};
use crate::synth::SoundFontError;

/// Graph node that owns a cloned plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginOwner {
    Track(TrackId),
    Bus(crate::project::BusId),
}

impl std::fmt::Display for PluginOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginOwner::Track(id) => write!(f, "{id}"),
            PluginOwner::Bus(id) => write!(f, "{id}"),
        }
    }
}

/// Failures surfaced by an export.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("output format `{0}` is not available")]
    UnsupportedFormat(String),
    #[error("invalid render settings: {0}")]
    InvalidSettings(String),
    #[error("invalid project: {0}")]
    InvalidProject(String),
    #[error("project has no regions to render")]
    EmptyProject,
    #[error("another export is still running")]
    SessionBusy,
    #[error("failed to allocate an output buffer of {frames} frames")]
    Allocation { frames: u64 },
    #[error("render did not finish within {after:?}")]
    Timeout { after: Duration },
    #[error("render cancelled")]
    Cancelled,
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("failed to clone plugin {plugin:?} on {owner}")]
    PluginClone {
        owner: PluginOwner,
        plugin: PluginId,
        #[source]
        source: PluginError,
    },
    #[error("failed to load audio asset `{asset}`")]
    Asset {
        asset: AssetId,
        #[source]
        source: MediaError,
    },
    #[error("failed to create the instrument of {track}")]
    Instrument {
        track: TrackId,
        #[source]
        source: SoundFontError,
    },
    #[error("offline graph processing failed")]
    Processing {
        #[source]
        source: anyhow::Error,
    },
    #[error("render thread stopped without a result")]
    Disconnected,
    #[error("I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type RenderResult<T> = Result<T, RenderError>;
