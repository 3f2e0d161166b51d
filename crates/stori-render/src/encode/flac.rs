use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::config::Encoder as FlacEncoder;
use flacenc::error::Verify;
use flacenc::source::MemSource;

use super::dither::{interleaved, Quantizer};
use super::EncodeError;
use crate::buffer::AudioClip;
use crate::config::{ExportFormat, RenderSettings};

/// Encodes an integer-PCM FLAC stream. Float depths are not representable.
pub(crate) fn encode(clip: &AudioClip, settings: &RenderSettings) -> Result<Vec<u8>, EncodeError> {
    let depth = settings.bit_depth;
    let max_code = depth.max_code().ok_or(EncodeError::UnsupportedDepth {
        format: ExportFormat::Flac,
        depth,
    })?;
    if clip.frames() == 0 {
        return Err(EncodeError::Flac("cannot encode an empty stream".into()));
    }

    let channels = clip.channels();
    let mut quantizer = Quantizer::new(max_code, settings.dither);
    let mut samples: Vec<i32> = Vec::with_capacity(clip.frames() * channels);
    samples.extend(interleaved(clip).map(|sample| quantizer.quantise(sample)));

    let config = FlacEncoder::default()
        .into_verified()
        .map_err(|(_, err)| EncodeError::Flac(format!("invalid encoder configuration: {err}")))?;
    let source = MemSource::from_samples(
        &samples,
        channels,
        usize::from(depth.bits()),
        settings.sample_rate as usize,
    );
    let stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
        .map_err(|err| EncodeError::Flac(format!("failed to encode stream: {err:?}")))?;

    let mut sink = ByteSink::new();
    stream
        .write(&mut sink)
        .map_err(|err| EncodeError::Flac(format!("failed to serialise stream: {err:?}")))?;
    Ok(sink.as_slice().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BitDepth;

    #[test]
    fn float_depth_is_rejected() {
        let clip = AudioClip::with_sample_rate(48_000.0, vec![vec![0.0; 64]]);
        let settings = RenderSettings {
            bit_depth: BitDepth::Float32,
            ..RenderSettings::default()
        };
        assert!(matches!(
            encode(&clip, &settings),
            Err(EncodeError::UnsupportedDepth { .. })
        ));
    }

    #[test]
    fn stream_starts_with_marker() {
        let tone: Vec<f32> = (0..4_800).map(|i| (i as f32 * 0.05).sin() * 0.25).collect();
        let clip = AudioClip::with_sample_rate(48_000.0, vec![tone.clone(), tone]);
        let bytes = encode(&clip, &RenderSettings::default()).unwrap();
        assert_eq!(&bytes[..4], b"fLaC");
    }
}
