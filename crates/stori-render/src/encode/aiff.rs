//! Big-endian AIFF writer. Integer depths produce plain AIFF; 32-bit float
//! produces an AIFF-C file with the `fl32` compression type.

use super::dither::{interleaved, Quantizer};
use super::EncodeError;
use crate::buffer::AudioClip;
use crate::config::{BitDepth, ExportFormat, RenderSettings};

const AIFC_VERSION_1: u32 = 0xA280_5140;
const FLOAT_COMPRESSION_NAME: &[u8] = b"32-bit floating point";

/// Chunk sizes of an AIFF file; every size field is 32 bits wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    channels: u16,
    frames: u32,
    pad: u32,
    comm_size: u32,
    ssnd_size: u32,
    form_size: u32,
}

impl Layout {
    fn new(channels: usize, frames: usize, bit_depth: BitDepth) -> Result<Self, EncodeError> {
        let too_large = || EncodeError::TooLarge {
            format: ExportFormat::Aiff,
            frames: frames as u64,
        };
        let channel_count = u16::try_from(channels).map_err(|_| too_large())?;
        let frame_count = u32::try_from(frames).map_err(|_| too_large())?;
        let bytes_per_sample = u32::from(bit_depth.bits() / 8);
        let sound_size = frame_count
            .checked_mul(u32::from(channel_count))
            .and_then(|samples| samples.checked_mul(bytes_per_sample))
            .ok_or_else(too_large)?;
        let pad = sound_size % 2;

        let comm_size = if bit_depth.is_float() {
            18 + 4 + pascal_string().len() as u32
        } else {
            18
        };
        let fver_size = if bit_depth.is_float() { 8 + 4 } else { 0 };
        let ssnd_size = sound_size.checked_add(8).ok_or_else(too_large)?;
        let form_size = ssnd_size
            .checked_add(4 + fver_size + 8 + comm_size + 8 + pad)
            .ok_or_else(too_large)?;

        Ok(Self {
            channels: channel_count,
            frames: frame_count,
            pad,
            comm_size,
            ssnd_size,
            form_size,
        })
    }
}

pub(crate) fn encode(clip: &AudioClip, settings: &RenderSettings) -> Result<Vec<u8>, EncodeError> {
    let bit_depth = settings.bit_depth;
    let Layout {
        channels,
        frames,
        pad,
        comm_size,
        ssnd_size,
        form_size,
    } = Layout::new(clip.channels(), clip.frames(), bit_depth)?;
    let bytes_per_sample = u32::from(bit_depth.bits() / 8);
    let float = bit_depth.is_float();
    let compression = float.then(pascal_string);

    let mut out = Vec::with_capacity(8 + form_size as usize);
    out.extend_from_slice(b"FORM");
    out.extend_from_slice(&form_size.to_be_bytes());
    out.extend_from_slice(if float { b"AIFC" } else { b"AIFF" });

    if float {
        out.extend_from_slice(b"FVER");
        out.extend_from_slice(&4u32.to_be_bytes());
        out.extend_from_slice(&AIFC_VERSION_1.to_be_bytes());
    }

    out.extend_from_slice(b"COMM");
    out.extend_from_slice(&comm_size.to_be_bytes());
    out.extend_from_slice(&channels.to_be_bytes());
    out.extend_from_slice(&frames.to_be_bytes());
    out.extend_from_slice(&bit_depth.bits().to_be_bytes());
    out.extend_from_slice(&extended_sample_rate(settings.sample_rate));
    if let Some(name) = compression {
        out.extend_from_slice(b"fl32");
        out.extend_from_slice(&name);
    }

    out.extend_from_slice(b"SSND");
    out.extend_from_slice(&ssnd_size.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());

    match bit_depth.max_code() {
        Some(max_code) => {
            let mut quantizer = Quantizer::new(max_code, settings.dither);
            let width = bytes_per_sample as usize;
            for sample in interleaved(clip) {
                let code = quantizer.quantise(sample).to_be_bytes();
                out.extend_from_slice(&code[4 - width..]);
            }
        }
        None => {
            for sample in interleaved(clip) {
                out.extend_from_slice(&sample.to_be_bytes());
            }
        }
    }
    if pad == 1 {
        out.push(0);
    }
    Ok(out)
}

/// Even-length Pascal string naming the float compression type.
fn pascal_string() -> Vec<u8> {
    let mut name = Vec::with_capacity(FLOAT_COMPRESSION_NAME.len() + 2);
    name.push(FLOAT_COMPRESSION_NAME.len() as u8);
    name.extend_from_slice(FLOAT_COMPRESSION_NAME);
    if name.len() % 2 == 1 {
        name.push(0);
    }
    name
}

/// 80-bit IEEE 754 extended representation of an integral sample rate.
fn extended_sample_rate(rate: u32) -> [u8; 10] {
    let mut out = [0u8; 10];
    if rate == 0 {
        return out;
    }
    let shift = rate.leading_zeros();
    let exponent = (16_383 + 31 - shift) as u16;
    let mantissa = u64::from(rate) << (32 + shift);
    out[..2].copy_from_slice(&exponent.to_be_bytes());
    out[2..].copy_from_slice(&mantissa.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be_u32(bytes: &[u8]) -> u32 {
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    #[test]
    fn sample_rate_matches_known_encodings() {
        assert_eq!(
            extended_sample_rate(44_100),
            [0x40, 0x0E, 0xAC, 0x44, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            extended_sample_rate(48_000),
            [0x40, 0x0E, 0xBB, 0x80, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn int24_layout_is_big_endian() {
        let clip = AudioClip::with_sample_rate(48_000.0, vec![vec![0.5, -0.5], vec![0.0, 1.0]]);
        let settings = RenderSettings {
            bit_depth: BitDepth::Int24,
            ..RenderSettings::default()
        };
        let bytes = encode(&clip, &settings).unwrap();

        assert_eq!(&bytes[0..4], b"FORM");
        assert_eq!(be_u32(&bytes[4..8]) as usize, bytes.len() - 8);
        assert_eq!(&bytes[8..12], b"AIFF");
        assert_eq!(&bytes[12..16], b"COMM");
        assert_eq!(be_u32(&bytes[16..20]), 18);
        assert_eq!(u16::from_be_bytes([bytes[20], bytes[21]]), 2);
        assert_eq!(be_u32(&bytes[22..26]), 2);
        assert_eq!(u16::from_be_bytes([bytes[26], bytes[27]]), 24);
        assert_eq!(&bytes[38..42], b"SSND");
        assert_eq!(be_u32(&bytes[42..46]), 8 + 12);

        let data = &bytes[54..];
        // 0.5 * 0x7FFFFF rounds to 0x400000
        assert_eq!(&data[0..3], &[0x40, 0x00, 0x00]);
        assert_eq!(&data[3..6], &[0x00, 0x00, 0x00]);
        assert_eq!(&data[9..12], &[0x7F, 0xFF, 0xFF]);
    }

    #[test]
    fn odd_sound_data_is_padded() {
        let clip = AudioClip::with_sample_rate(48_000.0, vec![vec![0.0]]);
        let settings = RenderSettings {
            bit_depth: BitDepth::Int24,
            ..RenderSettings::default()
        };
        let bytes = encode(&clip, &settings).unwrap();
        assert_eq!(bytes.len() % 2, 0);
        assert_eq!(be_u32(&bytes[4..8]) as usize, bytes.len() - 8);
    }

    #[test]
    fn float_uses_aifc() {
        let clip = AudioClip::with_sample_rate(48_000.0, vec![vec![0.25]]);
        let settings = RenderSettings {
            bit_depth: BitDepth::Float32,
            ..RenderSettings::default()
        };
        let bytes = encode(&clip, &settings).unwrap();
        assert_eq!(&bytes[8..12], b"AIFC");
        assert_eq!(&bytes[12..16], b"FVER");
        let tail = &bytes[bytes.len() - 4..];
        assert_eq!(f32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]), 0.25);
    }

    #[test]
    fn layout_matches_written_sizes() {
        let layout = Layout::new(2, 3, BitDepth::Int16).unwrap();
        assert_eq!(layout.ssnd_size, 20);
        assert_eq!(layout.form_size, 4 + 8 + 18 + 8 + 20);
    }

    #[test]
    fn oversized_clip_is_rejected() {
        // 716M stereo 24-bit frames need more than 4 GiB of sound data.
        let err = Layout::new(2, 716_000_000, BitDepth::Int24).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::TooLarge {
                format: ExportFormat::Aiff,
                frames: 716_000_000
            }
        ));
        // Sound data fits in 32 bits but its chunk header does not.
        let near_limit = (u32::MAX / 2) as usize;
        assert!(Layout::new(1, near_limit, BitDepth::Int16).is_err());
        assert!(Layout::new(1, near_limit / 2, BitDepth::Int16).is_ok());
    }
}
