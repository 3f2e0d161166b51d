use arrayvec::ArrayVec;
use stori_dsp::oscillator::advance_phase;
use stori_dsp::Waveform;

use super::envelope::Envelope;
use super::SynthPreset;

pub const MAX_VOICES: usize = 64;

#[inline]
pub fn midi_note_to_freq(pitch: u8) -> f32 {
    440.0 * 2f32.powf((f32::from(pitch) - 69.0) / 12.0)
}

#[derive(Debug, Clone)]
pub struct Voice {
    pub pitch: u8,
    pub velocity: u8,
    /// Note-on order, lower is older.
    pub serial: u64,
    /// Note-off arrived while the sustain pedal was down.
    pub held_by_pedal: bool,
    waveform: Waveform,
    gain: f32,
    frequency: f32,
    phase: f32,
    envelope: Envelope,
}

impl Voice {
    pub fn new(pitch: u8, velocity: u8, serial: u64, preset: &SynthPreset) -> Self {
        Self {
            pitch,
            velocity,
            serial,
            held_by_pedal: false,
            waveform: preset.waveform,
            gain: f32::from(velocity.min(127)) / 127.0 * preset.master_volume * 0.5,
            frequency: midi_note_to_freq(pitch),
            phase: 0.0,
            envelope: Envelope::new(preset.attack, preset.decay, preset.sustain, preset.release),
        }
    }

    pub fn is_releasing(&self) -> bool {
        self.envelope.is_releasing()
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }

    pub fn release(&mut self) {
        self.held_by_pedal = false;
        self.envelope.release();
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[inline]
    pub fn next_sample(&mut self, sample_rate: f32, bend_ratio: f32) -> f32 {
        let dt = 1.0 / sample_rate;
        let value = self.waveform.sample(self.phase) * self.envelope.next(dt) * self.gain;
        self.phase = advance_phase(self.phase, self.frequency * bend_ratio * dt);
        value
    }
}

/// Fixed-capacity voice storage; never allocates after construction.
#[derive(Debug, Default)]
pub struct VoicePool {
    voices: ArrayVec<Voice, MAX_VOICES>,
    next_serial: u64,
}

impl VoicePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    /// Starts a voice, stealing the oldest one (releasing voices first) when
    /// the pool is full.
    pub fn note_on(&mut self, pitch: u8, velocity: u8, preset: &SynthPreset) {
        let serial = self.next_serial;
        self.next_serial += 1;
        let voice = Voice::new(pitch, velocity, serial, preset);
        if self.voices.is_full() {
            let victim = self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, voice)| (!voice.is_releasing(), voice.serial))
                .map(|(index, _)| index);
            if let Some(index) = victim {
                self.voices[index] = voice;
            }
            return;
        }
        self.voices.push(voice);
    }

    /// Releases the oldest non-releasing voice playing `pitch`. With the
    /// pedal down the voice is marked held instead.
    pub fn note_off(&mut self, pitch: u8, pedal_down: bool) {
        let target = self
            .voices
            .iter_mut()
            .filter(|voice| voice.pitch == pitch && !voice.is_releasing() && !voice.held_by_pedal)
            .min_by_key(|voice| voice.serial);
        if let Some(voice) = target {
            if pedal_down {
                voice.held_by_pedal = true;
            } else {
                voice.release();
            }
        }
    }

    pub fn release_held(&mut self) {
        for voice in self.voices.iter_mut().filter(|voice| voice.held_by_pedal) {
            voice.release();
        }
    }

    pub fn release_all(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.release();
        }
    }

    pub fn clear(&mut self) {
        self.voices.clear();
    }

    pub fn prune(&mut self) {
        self.voices.retain(|voice| !voice.is_finished());
    }
}
