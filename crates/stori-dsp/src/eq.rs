use crate::biquad::{BiquadCoeffs, BiquadState};

pub const LOW_SHELF_HZ: f32 = 100.0;
pub const MID_PEAK_HZ: f32 = 1_000.0;
pub const MID_PEAK_Q: f32 = 0.7;
pub const HIGH_SHELF_HZ: f32 = 8_000.0;
pub const MAX_GAIN_DB: f32 = 12.0;

const MAX_CHANNELS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqBand {
    Low,
    Mid,
    High,
}

impl EqBand {
    pub const ALL: [EqBand; 3] = [EqBand::Low, EqBand::Mid, EqBand::High];

    fn index(self) -> usize {
        match self {
            EqBand::Low => 0,
            EqBand::Mid => 1,
            EqBand::High => 2,
        }
    }
}

/// Low shelf, mid peak and high shelf in series, gains limited to ±12 dB.
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    sample_rate: f32,
    gains_db: [f32; 3],
    coeffs: [BiquadCoeffs; 3],
    states: [[BiquadState; 3]; MAX_CHANNELS],
}

impl ThreeBandEq {
    pub fn new(sample_rate: f32) -> Self {
        let mut eq = Self {
            sample_rate,
            gains_db: [0.0; 3],
            coeffs: [BiquadCoeffs::IDENTITY; 3],
            states: [[BiquadState::default(); 3]; MAX_CHANNELS],
        };
        for band in EqBand::ALL {
            eq.update_band(band);
        }
        eq
    }

    pub fn with_gains(sample_rate: f32, low_db: f32, mid_db: f32, high_db: f32) -> Self {
        let mut eq = Self::new(sample_rate);
        eq.set_gain_db(EqBand::Low, low_db);
        eq.set_gain_db(EqBand::Mid, mid_db);
        eq.set_gain_db(EqBand::High, high_db);
        eq
    }

    pub fn gain_db(&self, band: EqBand) -> f32 {
        self.gains_db[band.index()]
    }

    /// Updates a band gain. Coefficients are only redesigned when the value
    /// actually changes.
    pub fn set_gain_db(&mut self, band: EqBand, gain_db: f32) {
        let gain_db = gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB);
        let index = band.index();
        if (self.gains_db[index] - gain_db).abs() <= f32::EPSILON {
            return;
        }
        self.gains_db[index] = gain_db;
        self.update_band(band);
    }

    pub fn is_flat(&self) -> bool {
        self.gains_db.iter().all(|gain| gain.abs() <= f32::EPSILON)
    }

    fn update_band(&mut self, band: EqBand) {
        let gain = self.gains_db[band.index()];
        self.coeffs[band.index()] = match band {
            EqBand::Low => BiquadCoeffs::low_shelf(self.sample_rate, LOW_SHELF_HZ, gain),
            EqBand::Mid => BiquadCoeffs::peaking(self.sample_rate, MID_PEAK_HZ, MID_PEAK_Q, gain),
            EqBand::High => BiquadCoeffs::high_shelf(self.sample_rate, HIGH_SHELF_HZ, gain),
        };
    }

    pub fn process(&mut self, channel: usize, samples: &mut [f32]) {
        let Some(states) = self.states.get_mut(channel) else {
            return;
        };
        for sample in samples.iter_mut() {
            let mut value = *sample;
            for (state, coeffs) in states.iter_mut().zip(self.coeffs.iter()) {
                value = state.process(value, coeffs);
            }
            *sample = value;
        }
    }

    pub fn reset(&mut self) {
        for channel in &mut self.states {
            for state in channel.iter_mut() {
                state.reset();
            }
        }
    }
}
