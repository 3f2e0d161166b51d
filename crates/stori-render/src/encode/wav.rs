use std::io::{Seek, Write};

use hound::{SampleFormat, WavSpec, WavWriter};

use super::dither::{interleaved, Quantizer};
use super::EncodeError;
use crate::buffer::AudioClip;
use crate::config::RenderSettings;

pub(crate) fn write<W>(clip: &AudioClip, settings: &RenderSettings, writer: W) -> Result<(), EncodeError>
where
    W: Write + Seek,
{
    let spec = WavSpec {
        channels: clip.channels() as u16,
        sample_rate: settings.sample_rate,
        bits_per_sample: settings.bit_depth.bits(),
        sample_format: if settings.bit_depth.is_float() {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::new(writer, spec)?;
    match settings.bit_depth.max_code() {
        Some(max_code) => {
            let mut quantizer = Quantizer::new(max_code, settings.dither);
            for sample in interleaved(clip) {
                writer.write_sample(quantizer.quantise(sample))?;
            }
        }
        None => {
            for sample in interleaved(clip) {
                writer.write_sample(sample)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}
