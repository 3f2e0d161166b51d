use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use symphonia::core::audio::{AudioBufferRef, Channels, SampleBuffer, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::project::AssetId;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Symphonia(#[from] SymphoniaError),
    #[error("no supported audio tracks found in source")]
    NoSupportedTracks,
    #[error("asset `{0}` is not available")]
    Missing(AssetId),
}

/// Decoded, non-interleaved PCM data of an audio asset.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or_default()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate.max(1))
    }

    /// Linearly interpolated read at a fractional frame position. Mono
    /// sources feed every output channel.
    #[inline]
    pub fn read(&self, channel: usize, position: f64) -> f32 {
        let Some(data) = self
            .channels
            .get(channel)
            .or_else(|| self.channels.first())
        else {
            return 0.0;
        };
        if position < 0.0 {
            return 0.0;
        }
        let index = position.floor() as usize;
        let Some(&current) = data.get(index) else {
            return 0.0;
        };
        let next = data.get(index + 1).copied().unwrap_or(0.0);
        let fraction = (position - index as f64) as f32;
        current + (next - current) * fraction
    }
}

/// Resolves region asset references to decoded audio.
pub trait AssetProvider: Send + Sync {
    fn load(&self, asset: &AssetId) -> Result<Arc<DecodedAudio>, MediaError>;

    /// Called once a render session has released its graph.
    fn end_session(&self) {}
}

/// In-memory asset table.
#[derive(Debug, Default)]
pub struct MemoryAssets {
    assets: HashMap<AssetId, Arc<DecodedAudio>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, audio: DecodedAudio) {
        self.assets.insert(AssetId(id.into()), Arc::new(audio));
    }

    pub fn with(mut self, id: impl Into<String>, audio: DecodedAudio) -> Self {
        self.insert(id, audio);
        self
    }
}

impl AssetProvider for MemoryAssets {
    fn load(&self, asset: &AssetId) -> Result<Arc<DecodedAudio>, MediaError> {
        self.assets
            .get(asset)
            .cloned()
            .ok_or_else(|| MediaError::Missing(asset.clone()))
    }
}

/// Identifies the on-disk version a cached decode was made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug)]
struct CachedAsset {
    stamp: FileStamp,
    audio: Arc<DecodedAudio>,
}

/// Decodes assets from files below a root directory.
///
/// Decodes are shared between regions of one session and dropped when the
/// session ends. A file whose modification time or size changed since its
/// decode is read again.
#[derive(Debug)]
pub struct FileAssetProvider {
    root: PathBuf,
    cache: Mutex<HashMap<AssetId, CachedAsset>>,
}

impl FileAssetProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_assets(&self) -> usize {
        self.cache.lock().len()
    }
}

impl AssetProvider for FileAssetProvider {
    fn load(&self, asset: &AssetId) -> Result<Arc<DecodedAudio>, MediaError> {
        let path = self.root.join(&asset.0);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(MediaError::Missing(asset.clone())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::Missing(asset.clone()))
            }
            Err(err) => return Err(err.into()),
        };
        let stamp = FileStamp {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        };
        if let Some(cached) = self.cache.lock().get(asset).filter(|cached| cached.stamp == stamp) {
            return Ok(Arc::clone(&cached.audio));
        }

        let decoded = Arc::new(decode_file(&path)?);
        tracing::debug!(asset = %asset, frames = decoded.frames(), "decoded audio asset");
        self.cache.lock().insert(
            asset.clone(),
            CachedAsset {
                stamp,
                audio: Arc::clone(&decoded),
            },
        );
        Ok(decoded)
    }

    fn end_session(&self) {
        self.cache.lock().clear();
    }
}

pub fn decode_file(path: &Path) -> Result<DecodedAudio, MediaError> {
    let file = File::open(path)?;
    decode_reader(file, Some(path))
}

pub fn decode_reader<R>(reader: R, hint_path: Option<&Path>) -> Result<DecodedAudio, MediaError>
where
    R: MediaSource + 'static,
{
    let mss = MediaSourceStream::new(Box::new(reader), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = hint_path
        .and_then(|path| path.extension())
        .and_then(|ext| ext.to_str())
    {
        hint.with_extension(ext);
    }

    let opened = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = opened.format;
    let (codec_params, track_id) = {
        let track = format
            .default_track()
            .ok_or(MediaError::NoSupportedTracks)?;
        (track.codec_params.clone(), track.id)
    };

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let channel_count = codec_params
        .channels
        .unwrap_or(Channels::FRONT_LEFT)
        .count();
    let sample_rate = codec_params.sample_rate.unwrap_or(48_000);
    let mut channel_data = vec![Vec::new(); channel_count];
    let mut sample_buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet)? {
            AudioBufferRef::F32(buffer) => {
                for (index, channel) in channel_data.iter_mut().enumerate() {
                    channel.extend_from_slice(buffer.chan(index));
                }
            }
            other => {
                let buf = sample_buffer.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(other.capacity() as u64, *other.spec())
                });
                buf.copy_interleaved_ref(other);
                let samples = buf.samples();
                for (index, channel) in channel_data.iter_mut().enumerate() {
                    channel.extend(samples[index..].iter().step_by(channel_count).copied());
                }
            }
        }
    }

    Ok(DecodedAudio {
        sample_rate,
        channels: channel_data,
    })
}
