//! Oscillator shapes as pure functions of a normalised phase in `[0, 1)`.

use core::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Waveform {
    Sine,
    Sawtooth,
    Square,
    Triangle,
    /// Pulse with a 25% duty cycle.
    Pulse,
    Noise,
}

impl Waveform {
    #[inline]
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            Waveform::Pulse => {
                if phase < 0.25 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Noise => hash_noise(phase),
        }
    }
}

/// Deterministic white noise derived from the phase bits, so identical renders
/// produce identical output.
#[inline]
fn hash_noise(phase: f32) -> f32 {
    let mut x = phase.to_bits();
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    (x as f32 / u32::MAX as f32) * 2.0 - 1.0
}

/// Advances a phase accumulator and wraps it into `[0, 1)`.
#[inline]
pub fn advance_phase(phase: f32, increment: f32) -> f32 {
    let next = phase + increment;
    if next >= 1.0 {
        next - next.floor()
    } else {
        next
    }
}
