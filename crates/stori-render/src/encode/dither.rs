use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::buffer::AudioClip;
use crate::config::DitherKind;

/// Fixed so repeated exports of the same project are byte-identical.
pub(crate) const DITHER_SEED: u64 = 0x5354_4F52_4944_4954;

struct TpdfDither {
    rng: StdRng,
    scale: f32,
}

impl TpdfDither {
    fn new(seed: u64, scale: f32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            scale,
        }
    }

    fn sample(&mut self) -> f32 {
        let a: f32 = self.rng.gen();
        let b: f32 = self.rng.gen();
        (a - b) / self.scale
    }
}

/// Maps normalised samples onto signed integer codes of a fixed width.
pub(crate) struct Quantizer {
    max_code: i32,
    dither: Option<TpdfDither>,
}

impl Quantizer {
    pub(crate) fn new(max_code: i32, dither: Option<DitherKind>) -> Self {
        let dither = dither.map(|kind| match kind {
            DitherKind::Tpdf => TpdfDither::new(DITHER_SEED, max_code as f32),
        });
        Self { max_code, dither }
    }

    pub(crate) fn quantise(&mut self, sample: f32) -> i32 {
        let mut value = if sample.is_finite() { sample } else { 0.0 };
        if let Some(dither) = self.dither.as_mut() {
            value += dither.sample();
        }
        let max = self.max_code as f32;
        (value * max).round().clamp(-max, max) as i32
    }
}

/// Frame-major interleaving of a clip's channels.
pub(crate) fn interleaved(clip: &AudioClip) -> impl Iterator<Item = f32> + '_ {
    let channels = clip.channels();
    (0..clip.frames()).flat_map(move |frame| (0..channels).map(move |channel| clip.sample(channel, frame)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantise_clamps_full_scale() {
        let mut quantizer = Quantizer::new(i16::MAX as i32, None);
        assert_eq!(quantizer.quantise(1.5), 32_767);
        assert_eq!(quantizer.quantise(-1.5), -32_767);
        assert_eq!(quantizer.quantise(0.0), 0);
        assert_eq!(quantizer.quantise(f32::NAN), 0);
    }

    #[test]
    fn tpdf_stays_within_one_code() {
        let mut quantizer = Quantizer::new(0x7F_FFFF, Some(DitherKind::Tpdf));
        for _ in 0..1_000 {
            assert!(quantizer.quantise(0.0).abs() <= 1);
        }
    }

    #[test]
    fn interleaves_frames() {
        let clip = AudioClip::with_sample_rate(48_000.0, vec![vec![1.0, 2.0], vec![-1.0, -2.0]]);
        let samples: Vec<f32> = interleaved(&clip).collect();
        assert_eq!(samples, vec![1.0, -1.0, 2.0, -2.0]);
    }
}
