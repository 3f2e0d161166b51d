//! Second-order IIR sections designed with the RBJ audio EQ cookbook formulas.

use core::f32::consts::PI;

use crate::gain::db_to_linear;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    pub fn low_shelf(sample_rate: f32, frequency: f32, gain_db: f32) -> Self {
        let a = db_to_linear(gain_db * 0.5);
        let (cos, alpha) = omega_terms(sample_rate, frequency, core::f32::consts::FRAC_1_SQRT_2);
        let sqrt_a = a.sqrt();
        let b0 = a * ((a + 1.0) - (a - 1.0) * cos + 2.0 * sqrt_a * alpha);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos - 2.0 * sqrt_a * alpha);
        let a0 = (a + 1.0) + (a - 1.0) * cos + 2.0 * sqrt_a * alpha;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos);
        let a2 = (a + 1.0) + (a - 1.0) * cos - 2.0 * sqrt_a * alpha;
        Self::normalised(b0, b1, b2, a0, a1, a2)
    }

    pub fn peaking(sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        let a = db_to_linear(gain_db * 0.5);
        let (cos, alpha) = omega_terms(sample_rate, frequency, q);
        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos;
        let b2 = 1.0 - alpha * a;
        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos;
        let a2 = 1.0 - alpha / a;
        Self::normalised(b0, b1, b2, a0, a1, a2)
    }

    pub fn high_shelf(sample_rate: f32, frequency: f32, gain_db: f32) -> Self {
        let a = db_to_linear(gain_db * 0.5);
        let (cos, alpha) = omega_terms(sample_rate, frequency, core::f32::consts::FRAC_1_SQRT_2);
        let sqrt_a = a.sqrt();
        let b0 = a * ((a + 1.0) + (a - 1.0) * cos + 2.0 * sqrt_a * alpha);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cos - 2.0 * sqrt_a * alpha);
        let a0 = (a + 1.0) - (a - 1.0) * cos + 2.0 * sqrt_a * alpha;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos);
        let a2 = (a + 1.0) - (a - 1.0) * cos - 2.0 * sqrt_a * alpha;
        Self::normalised(b0, b1, b2, a0, a1, a2)
    }

    fn normalised(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let inv_a0 = 1.0 / a0.max(1e-6);
        Self {
            b0: b0 * inv_a0,
            b1: b1 * inv_a0,
            b2: b2 * inv_a0,
            a1: a1 * inv_a0,
            a2: a2 * inv_a0,
        }
    }
}

fn omega_terms(sample_rate: f32, frequency: f32, q: f32) -> (f32, f32) {
    let sr = sample_rate.max(1.0);
    let freq = frequency.clamp(10.0, 0.45 * sr);
    let omega = 2.0 * PI * (freq / sr);
    (omega.cos(), omega.sin() / (2.0 * q.max(0.05)))
}

/// Transposed direct form II state for one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    z1: f32,
    z2: f32,
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, input: f32, coeffs: &BiquadCoeffs) -> f32 {
        let output = coeffs.b0 * input + self.z1;
        self.z1 = coeffs.b1 * input - coeffs.a1 * output + self.z2;
        self.z2 = coeffs.b2 * input - coeffs.a2 * output;
        output
    }

    #[inline]
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}
