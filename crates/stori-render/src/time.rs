use serde::{Deserialize, Serialize};

/// Utility helpers for converting between musical and time domains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tempo(pub f64);

impl Tempo {
    #[inline]
    pub fn beats_per_minute(&self) -> f64 {
        self.0
    }

    #[inline]
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.0
    }

    #[inline]
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * self.seconds_per_beat()
    }

    #[inline]
    pub fn samples_per_beat(&self, sample_rate: f32) -> f64 {
        self.seconds_per_beat() * f64::from(sample_rate)
    }

    /// Absolute sample position of a beat, rounded to the nearest frame.
    #[inline]
    pub fn beat_to_sample(&self, beats: f64, sample_rate: f32) -> u64 {
        (beats.max(0.0) * self.samples_per_beat(sample_rate)).round() as u64
    }

    #[inline]
    pub fn sample_to_beat(&self, sample: u64, sample_rate: f32) -> f64 {
        sample as f64 / self.samples_per_beat(sample_rate)
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.0 > 0.0
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(120.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub fn four_four() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

#[inline]
pub fn seconds_to_frames(seconds: f64, sample_rate: f32) -> u64 {
    (seconds.max(0.0) * f64::from(sample_rate)).round() as u64
}
