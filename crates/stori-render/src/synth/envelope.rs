//! Time-based ADSR envelope.

/// Shortest attack and release, so a voice always starts and ends at zero.
pub const MIN_STAGE_SECONDS: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
    Release,
    Finished,
}

#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,
    stage: EnvelopeStage,
    /// Seconds since note-on, or since the release trigger while releasing.
    elapsed: f32,
    level: f32,
    release_level: f32,
}

impl Envelope {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.max(MIN_STAGE_SECONDS),
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(MIN_STAGE_SECONDS),
            stage: EnvelopeStage::Attack,
            elapsed: 0.0,
            level: 0.0,
            release_level: 0.0,
        }
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_releasing(&self) -> bool {
        matches!(self.stage, EnvelopeStage::Release | EnvelopeStage::Finished)
    }

    pub fn is_finished(&self) -> bool {
        self.stage == EnvelopeStage::Finished
    }

    /// Starts the release from the current level.
    pub fn release(&mut self) {
        if self.is_releasing() {
            return;
        }
        self.release_level = self.level;
        self.elapsed = 0.0;
        self.stage = EnvelopeStage::Release;
    }

    /// Returns the level at the current time, then advances by `dt` seconds.
    pub fn next(&mut self, dt: f32) -> f32 {
        let t = self.elapsed;
        let level = match self.stage {
            EnvelopeStage::Attack | EnvelopeStage::Decay | EnvelopeStage::Sustain => {
                if t < self.attack {
                    self.stage = EnvelopeStage::Attack;
                    t / self.attack
                } else if t - self.attack < self.decay {
                    self.stage = EnvelopeStage::Decay;
                    1.0 + (self.sustain - 1.0) * ((t - self.attack) / self.decay)
                } else {
                    self.stage = EnvelopeStage::Sustain;
                    self.sustain
                }
            }
            EnvelopeStage::Release => {
                if t < self.release {
                    self.release_level * (1.0 - t / self.release)
                } else {
                    self.stage = EnvelopeStage::Finished;
                    0.0
                }
            }
            EnvelopeStage::Finished => 0.0,
        };
        if self.stage != EnvelopeStage::Sustain {
            self.elapsed += dt;
        }
        self.level = level.clamp(0.0, 1.0);
        self.level
    }
}
