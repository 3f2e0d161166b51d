//! Built-in oscillator synthesizer driven by a scheduled event queue.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::voice::VoicePool;
use super::SynthPreset;
use crate::buffer::AudioBuffer;
use crate::sched::{EventQueue, MidiEvent, CC_ALL_NOTES_OFF, CC_ALL_SOUND_OFF, CC_SUSTAIN};

/// Pitch bend range in semitones.
pub const BEND_RANGE_SEMITONES: f32 = 2.0;

#[derive(Debug)]
struct SynthState {
    voices: VoicePool,
    queue: EventQueue,
    cursor: u64,
    bend_ratio: f32,
    pedal_down: bool,
}

impl SynthState {
    fn handle(&mut self, event: MidiEvent, preset: &SynthPreset) {
        match event {
            MidiEvent::NoteOn { velocity: 0, pitch } => self.voices.note_off(pitch, self.pedal_down),
            MidiEvent::NoteOn { pitch, velocity } => self.voices.note_on(pitch, velocity, preset),
            MidiEvent::NoteOff { pitch } => self.voices.note_off(pitch, self.pedal_down),
            MidiEvent::PitchBend { value } => {
                let semitones = f32::from(value) / 8192.0 * BEND_RANGE_SEMITONES;
                self.bend_ratio = 2f32.powf(semitones / 12.0);
            }
            MidiEvent::ControlChange { controller, value } => match controller {
                CC_SUSTAIN => {
                    let down = value >= 64;
                    if self.pedal_down && !down {
                        self.voices.release_held();
                    }
                    self.pedal_down = down;
                }
                CC_ALL_SOUND_OFF => self.voices.clear(),
                CC_ALL_NOTES_OFF => self.voices.release_all(),
                _ => {}
            },
        }
    }

    fn synthesize(&mut self, buffer: &mut AudioBuffer, from: usize, to: usize, sample_rate: f32) {
        if from >= to || self.voices.is_empty() {
            return;
        }
        let bend = self.bend_ratio;
        for frame in from..to {
            let mut sample = 0.0;
            for voice in self.voices.voices_mut() {
                sample += voice.next_sample(sample_rate, bend);
            }
            for channel in buffer.channels_mut() {
                channel[frame] += sample;
            }
        }
        self.voices.prune();
    }
}

/// Polyphonic oscillator/ADSR synth. Event dispatch and synthesis run under a
/// `try_lock` on the voice pool and never wait for it.
///
/// A block rendered while the pool is held elsewhere stays silent. Its frames
/// are remembered and the next block starts after them, so scheduled events
/// keep their absolute timing.
#[derive(Debug)]
pub struct OscillatorSynth {
    preset: SynthPreset,
    sample_rate: f32,
    state: Mutex<SynthState>,
    missed_frames: AtomicU64,
}

impl OscillatorSynth {
    pub fn new(preset: SynthPreset, sample_rate: f32) -> Self {
        Self {
            preset,
            sample_rate: sample_rate.max(1.0),
            state: Mutex::new(SynthState {
                voices: VoicePool::new(),
                queue: EventQueue::default(),
                cursor: 0,
                bend_ratio: 1.0,
                pedal_down: false,
            }),
            missed_frames: AtomicU64::new(0),
        }
    }

    pub fn with_schedule(mut self, queue: EventQueue) -> Self {
        self.state.get_mut().queue = queue;
        self
    }

    pub fn preset(&self) -> &SynthPreset {
        &self.preset
    }

    pub fn active_voices(&self) -> usize {
        self.state.lock().voices.len()
    }

    pub fn cursor(&self) -> u64 {
        self.state.lock().cursor
    }

    /// Renders `buffer.len()` frames starting at the internal cursor and adds
    /// them into `buffer`. Scheduled events land on their exact frame; events
    /// already in the past are applied at the start of the block.
    ///
    /// Returns `false` and leaves `buffer` untouched when the voice pool is
    /// busy.
    pub fn render(&self, buffer: &mut AudioBuffer) -> bool {
        let frames = buffer.len();
        let Some(mut state) = self.state.try_lock() else {
            self.missed_frames.fetch_add(frames as u64, Ordering::AcqRel);
            return false;
        };
        let missed = self.missed_frames.swap(0, Ordering::AcqRel);
        state.cursor = state.cursor.saturating_add(missed);
        let start = state.cursor;
        let end = start + frames as u64;
        let mut rendered = 0usize;

        while let Some(event) = state.queue.pop_before(end) {
            let offset = event.sample.saturating_sub(start) as usize;
            state.synthesize(buffer, rendered, offset, self.sample_rate);
            rendered = rendered.max(offset);
            state.handle(event.event, &self.preset);
        }
        state.synthesize(buffer, rendered, frames, self.sample_rate);
        state.cursor = end;
        true
    }
}
