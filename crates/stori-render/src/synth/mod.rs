//! MIDI synthesis backends. Each MIDI track owns exactly one.

use crate::buffer::{AudioBuffer, BufferConfig};
use crate::config::SAMPLER_LOOKAHEAD_BUFFERS;
use crate::project::{InstrumentKind, Track};
use crate::sched::EventQueue;

pub mod envelope;
pub mod oscillator;
pub mod preset;
pub mod sampler;
pub mod voice;

pub use envelope::{Envelope, EnvelopeStage};
pub use oscillator::OscillatorSynth;
pub use preset::SynthPreset;
pub use sampler::{
    SampleBank, SampleBankProvider, SampleInstrument, SamplePlayer, SampleZone, SoundFontError,
    SoundFontProvider,
};
pub use voice::{Voice, VoicePool};

/// Sample instrument plus the events not yet handed to it.
pub struct SamplerTrack {
    instrument: Box<dyn SampleInstrument>,
    queue: EventQueue,
}

impl SamplerTrack {
    pub fn new(instrument: Box<dyn SampleInstrument>, queue: EventQueue) -> Self {
        Self { instrument, queue }
    }

    /// Hands every event before `end` to the instrument. Returns how many
    /// were dispatched.
    pub fn dispatch_until(&mut self, end: u64) -> usize {
        let mut dispatched = 0;
        while let Some(event) = self.queue.pop_before(end) {
            self.instrument.schedule(event);
            dispatched += 1;
        }
        dispatched
    }
}

pub enum InstrumentBackend {
    Synth(OscillatorSynth),
    Sampler(SamplerTrack),
}

impl InstrumentBackend {
    /// Picks the backend named by the track's preset; tracks without one
    /// get the default synth preset.
    pub fn for_track(
        track: &Track,
        queue: EventQueue,
        config: &BufferConfig,
        soundfonts: &dyn SoundFontProvider,
    ) -> Result<Self, SoundFontError> {
        match track.instrument.as_ref().map(|preset| &preset.kind) {
            Some(InstrumentKind::GeneralMidi { program }) => {
                let instrument = soundfonts.instrument(*program, config)?;
                Ok(InstrumentBackend::Sampler(SamplerTrack::new(instrument, queue)))
            }
            Some(InstrumentKind::Synth(preset)) => Ok(Self::synth(preset.clone(), queue, config)),
            None => Ok(Self::synth(SynthPreset::default(), queue, config)),
        }
    }

    fn synth(preset: SynthPreset, queue: EventQueue, config: &BufferConfig) -> Self {
        let synth = OscillatorSynth::new(preset, config.sample_rate).with_schedule(queue);
        InstrumentBackend::Synth(synth)
    }

    /// Forwards sampler events up to `end`; the synth dispatches its own
    /// schedule while rendering.
    pub fn dispatch_until(&mut self, end: u64) -> usize {
        match self {
            InstrumentBackend::Synth(_) => 0,
            InstrumentBackend::Sampler(sampler) => sampler.dispatch_until(end),
        }
    }

    pub fn render(&mut self, start: u64, buffer: &mut AudioBuffer) -> anyhow::Result<()> {
        match self {
            InstrumentBackend::Synth(synth) => {
                if !synth.render(buffer) {
                    tracing::debug!(start, "synth voice pool busy, block skipped");
                }
                Ok(())
            }
            InstrumentBackend::Sampler(sampler) => sampler.instrument.render(start, buffer),
        }
    }
}

/// End of the sampler dispatch window for a buffer starting at `position`.
pub fn lookahead_end(position: u64, block_size: usize) -> u64 {
    position + (SAMPLER_LOOKAHEAD_BUFFERS * block_size) as u64
}
