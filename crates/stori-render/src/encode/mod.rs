//! Serialises a captured clip to WAV, AIFF, M4A or FLAC.
//!
//! Only FLAC failures are recoverable: the clip is written as WAV next to the
//! requested path and the substitution is reported as a [`FormatFallback`].

mod aiff;
mod dither;
mod flac;
mod m4a;
mod wav;

use std::fs::{self, File};
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::buffer::AudioClip;
use crate::config::{BitDepth, ExportFormat, RenderSettings};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("wav encoding failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("flac encoding failed: {0}")]
    Flac(String),
    #[error("{format} does not support {depth:?} samples")]
    UnsupportedDepth { format: ExportFormat, depth: BitDepth },
    #[error("{frames} frames exceed the size limit of {format}")]
    TooLarge { format: ExportFormat, frames: u64 },
    #[error("no m4a transcoder found (looked for afconvert and ffmpeg on PATH)")]
    TranscoderMissing,
    #[error("failed to launch transcoder {program}: {source}")]
    TranscoderSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("transcoder {program} exited with {status}: {stderr}")]
    Transcoder {
        program: PathBuf,
        status: String,
        stderr: String,
    },
}

/// A format substitution made after the requested encoder failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatFallback {
    pub intended_format: ExportFormat,
    pub intended_path: PathBuf,
    pub written_format: ExportFormat,
    pub written_path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for FormatFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} export to {} failed ({}); wrote {} to {} instead",
            self.intended_format,
            self.intended_path.display(),
            self.reason,
            self.written_format,
            self.written_path.display()
        )
    }
}

/// Result of a file encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub fallback: Option<FormatFallback>,
}

/// Result of an in-memory encode. `format` is what `bytes` actually holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBytes {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
}

/// Writes `clip` to `path` in `settings.format`, creating parent directories.
///
/// No partially written file is left behind on error.
pub fn write_file(clip: &AudioClip, settings: &RenderSettings, path: &Path) -> Result<Encoded, EncodeError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| EncodeError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let result = match settings.format {
        ExportFormat::Wav => write_wav_file(clip, settings, path),
        ExportFormat::Aiff => aiff::encode(clip, settings).and_then(|bytes| write_bytes(path, &bytes)),
        ExportFormat::M4a => m4a::transcode(clip, settings, path),
        ExportFormat::Flac => match flac::encode(clip, settings) {
            Ok(bytes) => write_bytes(path, &bytes),
            Err(err) => return write_flac_fallback(clip, settings, path, err),
        },
    };
    if let Err(err) = result {
        let _ = fs::remove_file(path);
        return Err(err);
    }

    Ok(Encoded {
        path: path.to_path_buf(),
        format: settings.format,
        fallback: None,
    })
}

/// Encodes `clip` in memory. FLAC failures yield WAV bytes.
pub fn encode_to_bytes(clip: &AudioClip, settings: &RenderSettings) -> Result<EncodedBytes, EncodeError> {
    let (bytes, format) = match settings.format {
        ExportFormat::Wav => (wav_bytes(clip, settings)?, ExportFormat::Wav),
        ExportFormat::Aiff => (aiff::encode(clip, settings)?, ExportFormat::Aiff),
        ExportFormat::M4a => (m4a::encode(clip, settings)?, ExportFormat::M4a),
        ExportFormat::Flac => match flac::encode(clip, settings) {
            Ok(bytes) => (bytes, ExportFormat::Flac),
            Err(err) => {
                tracing::warn!(error = %err, "flac encoding failed, returning wav bytes");
                (wav_bytes(clip, &wav_settings(settings))?, ExportFormat::Wav)
            }
        },
    };
    Ok(EncodedBytes { bytes, format })
}

fn write_flac_fallback(
    clip: &AudioClip,
    settings: &RenderSettings,
    path: &Path,
    err: EncodeError,
) -> Result<Encoded, EncodeError> {
    let written_path = path.with_extension(ExportFormat::Wav.extension());
    tracing::warn!(
        error = %err,
        intended = %path.display(),
        written = %written_path.display(),
        "flac encoding failed, falling back to wav"
    );
    let _ = fs::remove_file(path);
    if let Err(wav_err) = write_wav_file(clip, &wav_settings(settings), &written_path) {
        let _ = fs::remove_file(&written_path);
        return Err(wav_err);
    }

    Ok(Encoded {
        path: written_path.clone(),
        format: ExportFormat::Wav,
        fallback: Some(FormatFallback {
            intended_format: ExportFormat::Flac,
            intended_path: path.to_path_buf(),
            written_format: ExportFormat::Wav,
            written_path,
            reason: err.to_string(),
        }),
    })
}

fn wav_settings(settings: &RenderSettings) -> RenderSettings {
    RenderSettings {
        format: ExportFormat::Wav,
        ..settings.clone()
    }
}

fn write_wav_file(clip: &AudioClip, settings: &RenderSettings, path: &Path) -> Result<(), EncodeError> {
    let file = File::create(path).map_err(|source| EncodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    wav::write(clip, settings, BufWriter::new(file))
}

fn wav_bytes(clip: &AudioClip, settings: &RenderSettings) -> Result<Vec<u8>, EncodeError> {
    let mut cursor = Cursor::new(Vec::new());
    wav::write(clip, settings, &mut cursor)?;
    Ok(cursor.into_inner())
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), EncodeError> {
    fs::write(path, bytes).map_err(|source| EncodeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> AudioClip {
        let tone: Vec<f32> = (0..2_400).map(|i| (i as f32 * 0.03).sin() * 0.5).collect();
        AudioClip::with_sample_rate(48_000.0, vec![tone.clone(), tone])
    }

    #[test]
    fn flac_float_falls_back_to_sibling_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mix.flac");
        let settings = RenderSettings {
            format: ExportFormat::Flac,
            bit_depth: BitDepth::Float32,
            ..RenderSettings::default()
        };

        let encoded = write_file(&clip(), &settings, &path).unwrap();
        let fallback = encoded.fallback.expect("fallback reported");
        assert_eq!(fallback.intended_format, ExportFormat::Flac);
        assert_eq!(fallback.intended_path, path);
        assert_eq!(fallback.written_path, dir.path().join("mix.wav"));
        assert_eq!(encoded.path, fallback.written_path);
        assert_eq!(encoded.format, ExportFormat::Wav);
        assert!(!path.exists());

        let reader = hound::WavReader::open(&encoded.path).unwrap();
        assert_eq!(reader.duration(), 2_400);
    }

    #[test]
    fn flac_writes_requested_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mix.flac");
        let settings = RenderSettings {
            format: ExportFormat::Flac,
            ..RenderSettings::default()
        };
        let encoded = write_file(&clip(), &settings, &path).unwrap();
        assert!(encoded.fallback.is_none());
        assert_eq!(&fs::read(&path).unwrap()[..4], b"fLaC");
    }

    #[test]
    fn bytes_match_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mix.aiff");
        let settings = RenderSettings {
            format: ExportFormat::Aiff,
            ..RenderSettings::default()
        };
        write_file(&clip(), &settings, &path).unwrap();
        let bytes = encode_to_bytes(&clip(), &settings).unwrap();
        assert_eq!(bytes.format, ExportFormat::Aiff);
        assert_eq!(bytes.bytes, fs::read(&path).unwrap());
    }

    #[test]
    fn in_memory_flac_fallback_reports_wav() {
        let settings = RenderSettings {
            format: ExportFormat::Flac,
            bit_depth: BitDepth::Float32,
            ..RenderSettings::default()
        };
        let bytes = encode_to_bytes(&clip(), &settings).unwrap();
        assert_eq!(bytes.format, ExportFormat::Wav);
        assert_eq!(&bytes.bytes[..4], b"RIFF");
    }
}
