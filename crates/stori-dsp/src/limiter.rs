use crate::gain::db_to_linear;

pub const DEFAULT_CEILING_DB: f32 = -0.3;
pub const DEFAULT_RELEASE_MS: f32 = 80.0;

const MAX_CHANNELS: usize = 2;

fn time_to_coeff(ms: f32, sample_rate: f32) -> f32 {
    let samples = (ms.max(0.1) * 0.001 * sample_rate.max(1.0)).max(1.0);
    (-1.0 / samples).exp()
}

/// Instant-attack peak limiter with an exponential gain recovery.
#[derive(Debug, Clone)]
pub struct PeakLimiter {
    sample_rate: f32,
    ceiling: f32,
    release_coeff: f32,
    gain: [f32; MAX_CHANNELS],
}

impl PeakLimiter {
    pub fn new(sample_rate: f32, ceiling_db: f32, release_ms: f32) -> Self {
        let mut limiter = Self {
            sample_rate,
            ceiling: 1.0,
            release_coeff: 0.0,
            gain: [1.0; MAX_CHANNELS],
        };
        limiter.set_params(ceiling_db, release_ms);
        limiter
    }

    pub fn set_params(&mut self, ceiling_db: f32, release_ms: f32) {
        self.ceiling = db_to_linear(ceiling_db.clamp(-24.0, 0.0));
        self.release_coeff = time_to_coeff(release_ms, self.sample_rate);
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    pub fn process(&mut self, channel: usize, samples: &mut [f32]) {
        let Some(gain) = self.gain.get_mut(channel) else {
            return;
        };
        for sample in samples.iter_mut() {
            let abs = sample.abs();
            if abs * *gain > self.ceiling && abs > 1e-6 {
                *gain = self.ceiling / abs;
            } else {
                *gain = *gain + (1.0 - *gain) * (1.0 - self.release_coeff);
                if abs * *gain > self.ceiling {
                    *gain = self.ceiling / abs;
                }
            }
            *sample *= *gain;
        }
    }

    pub fn reset(&mut self) {
        self.gain = [1.0; MAX_CHANNELS];
    }
}
