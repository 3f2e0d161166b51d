//! Sample-playback instruments for General MIDI programs.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrayvec::ArrayVec;
use thiserror::Error;

use crate::buffer::{AudioBuffer, BufferConfig};
use crate::media::{decode_file, DecodedAudio, MediaError};
use crate::sched::{MidiEvent, ScheduledEvent, CC_ALL_NOTES_OFF, CC_ALL_SOUND_OFF, CC_SUSTAIN};

const MAX_SAMPLE_VOICES: usize = 48;
const RELEASE_SECONDS: f32 = 0.08;
const BEND_RANGE_SEMITONES: f64 = 2.0;

#[derive(Debug, Error)]
pub enum SoundFontError {
    #[error("no sample bank for General MIDI program {0}")]
    UnknownProgram(u8),
    #[error("failed to load sample bank from {path}")]
    Load {
        path: PathBuf,
        #[source]
        source: MediaError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Sampler owned by one render session. Events are handed over ahead of time
/// and must be played on their exact frame.
pub trait SampleInstrument: Send {
    fn schedule(&mut self, event: ScheduledEvent);

    /// Adds `buffer.len()` frames starting at absolute frame `start` into
    /// `buffer`.
    fn render(&mut self, start: u64, buffer: &mut AudioBuffer) -> anyhow::Result<()>;

    fn pending_events(&self) -> usize;
}

/// Resolves General MIDI programs to sample instruments.
pub trait SoundFontProvider: Send + Sync {
    fn instrument(
        &self,
        program: u8,
        config: &BufferConfig,
    ) -> Result<Box<dyn SampleInstrument>, SoundFontError>;
}

/// One key/velocity-mapped sample.
#[derive(Debug, Clone)]
pub struct SampleZone {
    pub key_low: u8,
    pub key_high: u8,
    pub velocity_low: u8,
    pub velocity_high: u8,
    pub root_key: u8,
    pub gain: f32,
    pub audio: Arc<DecodedAudio>,
}

impl SampleZone {
    pub fn full_range(audio: Arc<DecodedAudio>, root_key: u8) -> Self {
        Self {
            key_low: 0,
            key_high: 127,
            velocity_low: 0,
            velocity_high: 127,
            root_key,
            gain: 1.0,
            audio,
        }
    }

    fn matches(&self, pitch: u8, velocity: u8) -> bool {
        (self.key_low..=self.key_high).contains(&pitch)
            && (self.velocity_low..=self.velocity_high).contains(&velocity)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SampleBank {
    pub name: String,
    pub zones: Vec<SampleZone>,
}

impl SampleBank {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zones: Vec::new(),
        }
    }

    pub fn with_zone(mut self, zone: SampleZone) -> Self {
        self.zones.push(zone);
        self
    }
}

#[derive(Debug, Clone)]
struct SampleVoice {
    pitch: u8,
    zone: usize,
    position: f64,
    /// Source frames advanced per output frame before pitch bend.
    step: f64,
    gain: f32,
    release: Option<f32>,
    held_by_pedal: bool,
}

/// Built-in [`SampleInstrument`] playing a [`SampleBank`].
pub struct SamplePlayer {
    bank: Arc<SampleBank>,
    sample_rate: f32,
    pending: VecDeque<ScheduledEvent>,
    voices: ArrayVec<SampleVoice, MAX_SAMPLE_VOICES>,
    bend: f64,
    pedal_down: bool,
}

impl SamplePlayer {
    pub fn new(bank: Arc<SampleBank>, config: &BufferConfig) -> Self {
        Self {
            bank,
            sample_rate: config.sample_rate.max(1.0),
            pending: VecDeque::with_capacity(256),
            voices: ArrayVec::new(),
            bend: 1.0,
            pedal_down: false,
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    fn handle(&mut self, event: MidiEvent) {
        match event {
            MidiEvent::NoteOn { pitch, velocity: 0 } | MidiEvent::NoteOff { pitch } => {
                let pedal_down = self.pedal_down;
                if let Some(voice) = self
                    .voices
                    .iter_mut()
                    .find(|voice| voice.pitch == pitch && voice.release.is_none() && !voice.held_by_pedal)
                {
                    if pedal_down {
                        voice.held_by_pedal = true;
                    } else {
                        voice.release = Some(1.0);
                    }
                }
            }
            MidiEvent::NoteOn { pitch, velocity } => self.note_on(pitch, velocity),
            MidiEvent::PitchBend { value } => {
                let semitones = f64::from(value) / 8192.0 * BEND_RANGE_SEMITONES;
                self.bend = 2f64.powf(semitones / 12.0);
            }
            MidiEvent::ControlChange { controller, value } => match controller {
                CC_SUSTAIN => {
                    let down = value >= 64;
                    if self.pedal_down && !down {
                        for voice in self.voices.iter_mut().filter(|voice| voice.held_by_pedal) {
                            voice.held_by_pedal = false;
                            voice.release = Some(1.0);
                        }
                    }
                    self.pedal_down = down;
                }
                CC_ALL_SOUND_OFF => self.voices.clear(),
                CC_ALL_NOTES_OFF => {
                    for voice in self.voices.iter_mut() {
                        voice.release.get_or_insert(1.0);
                    }
                }
                _ => {}
            },
        }
    }

    fn note_on(&mut self, pitch: u8, velocity: u8) {
        let Some(zone_index) = self
            .bank
            .zones
            .iter()
            .position(|zone| zone.matches(pitch, velocity))
        else {
            return;
        };
        let zone = &self.bank.zones[zone_index];
        let transpose = (f64::from(pitch) - f64::from(zone.root_key)) / 12.0;
        let voice = SampleVoice {
            pitch,
            zone: zone_index,
            position: 0.0,
            step: 2f64.powf(transpose) * f64::from(zone.audio.sample_rate) / f64::from(self.sample_rate),
            gain: zone.gain * f32::from(velocity) / 127.0,
            release: None,
            held_by_pedal: false,
        };
        if self.voices.is_full() {
            self.voices.remove(0);
        }
        self.voices.push(voice);
    }

    fn synthesize(&mut self, buffer: &mut AudioBuffer, from: usize, to: usize) {
        let release_step = 1.0 / (RELEASE_SECONDS * self.sample_rate);
        let channels = buffer.channel_count();
        for voice in self.voices.iter_mut() {
            let audio = &self.bank.zones[voice.zone].audio;
            let frames = audio.frames() as f64;
            for frame in from..to {
                if voice.position >= frames {
                    voice.release = Some(0.0);
                    break;
                }
                let envelope = match voice.release.as_mut() {
                    Some(level) if *level <= 0.0 => break,
                    Some(level) => {
                        let current = *level;
                        *level -= release_step;
                        current
                    }
                    None => 1.0,
                };
                let gain = voice.gain * envelope;
                for channel in 0..channels {
                    buffer.channel_mut(channel)[frame] += audio.read(channel, voice.position) * gain;
                }
                voice.position += voice.step * self.bend;
            }
        }
        self.voices
            .retain(|voice| !matches!(voice.release, Some(level) if level <= 0.0));
    }
}

impl SampleInstrument for SamplePlayer {
    fn schedule(&mut self, event: ScheduledEvent) {
        let index = self.pending.partition_point(|pending| pending.sample <= event.sample);
        self.pending.insert(index, event);
    }

    fn render(&mut self, start: u64, buffer: &mut AudioBuffer) -> anyhow::Result<()> {
        let frames = buffer.len();
        let end = start + frames as u64;
        let mut rendered = 0usize;
        while let Some(event) = self.pending.front().copied().filter(|event| event.sample < end) {
            self.pending.pop_front();
            let offset = event.sample.saturating_sub(start) as usize;
            self.synthesize(buffer, rendered, offset);
            rendered = rendered.max(offset);
            self.handle(event.event);
        }
        self.synthesize(buffer, rendered, frames);
        Ok(())
    }

    fn pending_events(&self) -> usize {
        self.pending.len()
    }
}

/// [`SoundFontProvider`] backed by in-memory sample banks keyed by program.
#[derive(Debug, Clone, Default)]
pub struct SampleBankProvider {
    banks: HashMap<u8, Arc<SampleBank>>,
    fallback: Option<Arc<SampleBank>>,
}

impl SampleBankProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, program: u8, bank: SampleBank) {
        self.banks.insert(program, Arc::new(bank));
    }

    pub fn with_bank(mut self, program: u8, bank: SampleBank) -> Self {
        self.insert(program, bank);
        self
    }

    /// Bank used for programs without a dedicated entry.
    pub fn with_fallback(mut self, bank: SampleBank) -> Self {
        self.fallback = Some(Arc::new(bank));
        self
    }

    /// Loads `<program>.<ext>` files (e.g. `0.wav`, `33.flac`) from `dir`,
    /// each as a single full-range zone rooted at middle C. A `default.*` file
    /// becomes the fallback bank.
    pub fn from_directory(dir: &Path) -> Result<Self, SoundFontError> {
        let mut provider = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let program = stem.parse::<u8>().ok().filter(|program| *program < 128);
            if program.is_none() && stem != "default" {
                continue;
            }
            let audio = decode_file(&path).map_err(|source| SoundFontError::Load {
                path: path.clone(),
                source,
            })?;
            let bank = SampleBank::new(stem).with_zone(SampleZone::full_range(Arc::new(audio), 60));
            match program {
                Some(program) => provider.insert(program, bank),
                None => provider.fallback = Some(Arc::new(bank)),
            }
        }
        tracing::debug!(dir = %dir.display(), banks = provider.banks.len(), "loaded sample banks");
        Ok(provider)
    }
}

impl SoundFontProvider for SampleBankProvider {
    fn instrument(
        &self,
        program: u8,
        config: &BufferConfig,
    ) -> Result<Box<dyn SampleInstrument>, SoundFontError> {
        let bank = self
            .banks
            .get(&program)
            .or(self.fallback.as_ref())
            .ok_or(SoundFontError::UnknownProgram(program))?;
        Ok(Box::new(SamplePlayer::new(Arc::clone(bank), config)))
    }
}
