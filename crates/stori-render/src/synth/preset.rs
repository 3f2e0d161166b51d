use serde::{Deserialize, Serialize};
use stori_dsp::Waveform;

fn default_waveform() -> Waveform {
    Waveform::Sawtooth
}

/// User preset for the built-in oscillator synthesizer. Times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthPreset {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_waveform")]
    pub waveform: Waveform,
    #[serde(default = "SynthPreset::default_attack")]
    pub attack: f32,
    #[serde(default = "SynthPreset::default_decay")]
    pub decay: f32,
    #[serde(default = "SynthPreset::default_sustain")]
    pub sustain: f32,
    #[serde(default = "SynthPreset::default_release")]
    pub release: f32,
    #[serde(default = "SynthPreset::default_master_volume")]
    pub master_volume: f32,
}

impl SynthPreset {
    fn default_attack() -> f32 {
        0.01
    }

    fn default_decay() -> f32 {
        0.1
    }

    fn default_sustain() -> f32 {
        0.7
    }

    fn default_release() -> f32 {
        0.25
    }

    fn default_master_volume() -> f32 {
        0.8
    }

    pub fn new(name: impl Into<String>, waveform: Waveform) -> Self {
        Self {
            name: name.into(),
            waveform,
            ..Self::default()
        }
    }

    pub fn with_envelope(mut self, attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        self.attack = attack;
        self.decay = decay;
        self.sustain = sustain;
        self.release = release;
        self
    }
}

impl Default for SynthPreset {
    fn default() -> Self {
        Self {
            name: "Init".into(),
            waveform: default_waveform(),
            attack: Self::default_attack(),
            decay: Self::default_decay(),
            sustain: Self::default_sustain(),
            release: Self::default_release(),
            master_volume: Self::default_master_volume(),
        }
    }
}
