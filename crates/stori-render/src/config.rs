use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::{BufferConfig, ChannelLayout};
use crate::error::RenderError;

/// Upper bound on the processing tail added after the last region.
pub const TAIL_CAP_SECONDS: f64 = 5.0;
/// Minimum tail, covering synthesizer release even without plugins.
pub const TAIL_FLOOR_SECONDS: f64 = 0.3;
/// Buffers dispatched ahead of the render position for sample instruments.
pub const SAMPLER_LOOKAHEAD_BUFFERS: usize = 2;
/// Progress fraction after which a remaining-time estimate is published.
pub const ETA_THRESHOLD: f32 = 0.05;

const MIN_SAMPLE_RATE: u32 = 8_000;
const MAX_SAMPLE_RATE: u32 = 384_000;
const MIN_BLOCK_SIZE: usize = 16;
const MAX_BLOCK_SIZE: usize = 8_192;

/// Output container/codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Wav,
    Aiff,
    M4a,
    Flac,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Aiff => "aiff",
            ExportFormat::M4a => "m4a",
            ExportFormat::Flac => "flac",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(ExportFormat::Wav),
            "aif" | "aiff" => Some(ExportFormat::Aiff),
            "m4a" | "aac" => Some(ExportFormat::M4a),
            "flac" => Some(ExportFormat::Flac),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = RenderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_extension(value).ok_or_else(|| RenderError::UnsupportedFormat(value.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitDepth {
    Int16,
    #[default]
    Int24,
    Float32,
}

impl BitDepth {
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Float32 => 32,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, BitDepth::Float32)
    }

    /// Largest positive integer code, `None` for floating point.
    pub fn max_code(self) -> Option<i32> {
        match self {
            BitDepth::Int16 => Some(i16::MAX as i32),
            BitDepth::Int24 => Some(0x7F_FFFF),
            BitDepth::Float32 => None,
        }
    }
}

/// Dither algorithm applied before integer quantisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DitherKind {
    Tpdf,
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_block_size() -> usize {
    512
}

fn default_drain_buffers() -> usize {
    8
}

fn default_timeout_grace() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default)]
    pub bit_depth: BitDepth,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Extra buffers rendered past the tail so plugin state can flush.
    #[serde(default = "default_drain_buffers")]
    pub drain_buffers: usize,
    /// Added to the expected duration to form the watchdog deadline.
    #[serde(default = "default_timeout_grace", with = "duration_secs")]
    pub timeout_grace: Duration,
    #[serde(default)]
    pub format: ExportFormat,
    /// Transcoder used for M4A; `afconvert` or `ffmpeg` from `PATH` if unset.
    #[serde(default)]
    pub transcoder: Option<PathBuf>,
    #[serde(default)]
    pub dither: Option<DitherKind>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            bit_depth: BitDepth::default(),
            block_size: default_block_size(),
            drain_buffers: default_drain_buffers(),
            timeout_grace: default_timeout_grace(),
            format: ExportFormat::default(),
            transcoder: None,
            dither: None,
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<(), RenderError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(RenderError::InvalidSettings(format!(
                "sample rate {} Hz outside {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE}",
                self.sample_rate
            )));
        }
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(RenderError::InvalidSettings(format!(
                "block size {} outside {MIN_BLOCK_SIZE}..={MAX_BLOCK_SIZE}",
                self.block_size
            )));
        }
        if self.dither.is_some() && self.bit_depth.is_float() {
            return Err(RenderError::InvalidSettings(
                "dither requires an integer bit depth".into(),
            ));
        }
        Ok(())
    }

    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig::new(self.sample_rate as f32, self.block_size, ChannelLayout::Stereo)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(serde::de::Error::custom("timeout grace must be a positive number of seconds"));
        }
        Ok(Duration::from_secs_f64(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = RenderSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.bit_depth, BitDepth::Int24);
        assert_eq!(settings.drain_buffers, 8);
        assert_eq!(settings.timeout_grace, Duration::from_secs(10));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let settings = RenderSettings {
            sample_rate: 1_000,
            ..RenderSettings::default()
        };
        assert!(matches!(settings.validate(), Err(RenderError::InvalidSettings(_))));

        let settings = RenderSettings {
            block_size: 4,
            ..RenderSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = RenderSettings {
            bit_depth: BitDepth::Float32,
            dither: Some(DitherKind::Tpdf),
            ..RenderSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn deserialises_partial_json() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{"format": "flac", "bit_depth": "int16", "timeout_grace": 2.5}"#)
                .expect("settings");
        assert_eq!(settings.format, ExportFormat::Flac);
        assert_eq!(settings.bit_depth, BitDepth::Int16);
        assert_eq!(settings.timeout_grace, Duration::from_millis(2_500));
        assert_eq!(settings.sample_rate, 48_000);
    }

    #[test]
    fn formats_parse_from_extensions() {
        assert_eq!("AIF".parse::<ExportFormat>().ok(), Some(ExportFormat::Aiff));
        assert!("ogg".parse::<ExportFormat>().is_err());
    }
}
