use stori_dsp::pan::constant_power;
use stori_dsp::{EqBand, OnePole, PeakLimiter, ThreeBandEq};

use super::arena::{PluginArena, PluginSlot};
use super::player::RegionPlayer;
use crate::automation::AutomationParameter;
use crate::buffer::AudioBuffer;
use crate::live::MasterSettings;
use crate::project::{BusId, EqSettings, TrackId};
use crate::synth::InstrumentBackend;

/// Ramp time for automated fader and pan moves.
const PARAM_SMOOTHING_MS: f32 = 5.0;

pub(crate) fn eq_from_settings(sample_rate: f32, settings: &EqSettings) -> ThreeBandEq {
    ThreeBandEq::with_gains(sample_rate, settings.low_db, settings.mid_db, settings.high_db)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SendRoute {
    pub bus: BusId,
    pub(crate) bus_index: usize,
    pub level: f32,
    pub pre_fader: bool,
}

/// Per-track mixer: sources, fader and pan, sends, cloned plugins, EQ.
pub struct TrackStrip {
    pub id: TrackId,
    player: RegionPlayer,
    instrument: Option<InstrumentBackend>,
    chain: Vec<PluginSlot>,
    eq: Option<ThreeBandEq>,
    volume: f32,
    pan: f32,
    volume_smoother: OnePole,
    pan_smoother: OnePole,
    sends: Vec<SendRoute>,
    buffer: AudioBuffer,
    pre_fader: Option<AudioBuffer>,
}

impl TrackStrip {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TrackId,
        sample_rate: f32,
        block_size: usize,
        volume: f32,
        pan: f32,
        player: RegionPlayer,
        instrument: Option<InstrumentBackend>,
        chain: Vec<PluginSlot>,
        eq: Option<ThreeBandEq>,
        sends: Vec<SendRoute>,
    ) -> Self {
        let volume = volume.clamp(0.0, 2.0);
        let pan = pan.clamp(-1.0, 1.0);
        let pre_fader = sends
            .iter()
            .any(|send| send.pre_fader)
            .then(|| AudioBuffer::new(2, block_size));
        Self {
            id,
            player,
            instrument,
            chain,
            eq,
            volume,
            pan,
            volume_smoother: OnePole::new(sample_rate, PARAM_SMOOTHING_MS, volume),
            pan_smoother: OnePole::new(sample_rate, PARAM_SMOOTHING_MS, pan),
            sends,
            buffer: AudioBuffer::new(2, block_size),
            pre_fader,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn eq(&self) -> Option<&ThreeBandEq> {
        self.eq.as_ref()
    }

    pub fn sends(&self) -> &[SendRoute] {
        &self.sends
    }

    pub fn chain(&self) -> &[PluginSlot] {
        &self.chain
    }

    pub fn player(&self) -> &RegionPlayer {
        &self.player
    }

    pub(crate) fn instrument_mut(&mut self) -> Option<&mut InstrumentBackend> {
        self.instrument.as_mut()
    }

    pub fn set_parameter(&mut self, parameter: AutomationParameter, value: f32) {
        match parameter {
            AutomationParameter::Volume => self.volume = value.clamp(0.0, 2.0),
            AutomationParameter::Pan => self.pan = value.clamp(-1.0, 1.0),
            AutomationParameter::EqLow => self.set_eq(EqBand::Low, value),
            AutomationParameter::EqMid => self.set_eq(EqBand::Mid, value),
            AutomationParameter::EqHigh => self.set_eq(EqBand::High, value),
        }
    }

    fn set_eq(&mut self, band: EqBand, gain_db: f32) {
        if let Some(eq) = self.eq.as_mut() {
            eq.set_gain_db(band, gain_db);
        }
    }

    pub(crate) fn render(
        &mut self,
        position: u64,
        frames: usize,
        arena: &mut PluginArena,
        buses: &mut [BusStrip],
        master: &mut AudioBuffer,
    ) -> anyhow::Result<()> {
        self.buffer.set_len(frames);
        self.player.render(position, &mut self.buffer);
        if let Some(instrument) = self.instrument.as_mut() {
            instrument.render(position, &mut self.buffer)?;
        }

        if let Some(pre) = self.pre_fader.as_mut() {
            pre.set_len(frames);
            pre.copy_from(&self.buffer);
        }

        self.apply_fader(frames);

        for send in &self.sends {
            let source = match (&self.pre_fader, send.pre_fader) {
                (Some(pre), true) => pre,
                _ => &self.buffer,
            };
            if let Some(bus) = buses.get_mut(send.bus_index) {
                bus.input.add_scaled(source, send.level);
            }
        }

        arena.process_chain(&self.chain, &mut self.buffer)?;

        if let Some(eq) = self.eq.as_mut() {
            for channel in 0..self.buffer.channel_count() {
                eq.process(channel, self.buffer.channel_mut(channel));
            }
        }

        master.add_scaled(&self.buffer, 1.0);
        Ok(())
    }

    fn apply_fader(&mut self, frames: usize) {
        for frame in 0..frames {
            let volume = self.volume_smoother.next(self.volume);
            let (left, right) = constant_power(self.pan_smoother.next(self.pan));
            self.buffer.channel_mut(0)[frame] *= volume * left;
            self.buffer.channel_mut(1)[frame] *= volume * right;
        }
    }
}

/// Bus input summed from track sends, its cloned plugins and output level.
pub struct BusStrip {
    pub id: BusId,
    pub(crate) input: AudioBuffer,
    chain: Vec<PluginSlot>,
    volume: f32,
}

impl BusStrip {
    pub fn new(id: BusId, block_size: usize, volume: f32, chain: Vec<PluginSlot>) -> Self {
        Self {
            id,
            input: AudioBuffer::new(2, block_size),
            chain,
            volume: volume.clamp(0.0, 2.0),
        }
    }

    pub fn chain(&self) -> &[PluginSlot] {
        &self.chain
    }

    pub(crate) fn begin(&mut self, frames: usize) {
        self.input.set_len(frames);
    }

    pub(crate) fn render(
        &mut self,
        arena: &mut PluginArena,
        master: &mut AudioBuffer,
    ) -> anyhow::Result<()> {
        arena.process_chain(&self.chain, &mut self.input)?;
        master.add_scaled(&self.input, self.volume);
        Ok(())
    }
}

/// EQ then limiter between the master mix and the capture point.
#[derive(Debug)]
pub struct MasterChain {
    eq: Option<ThreeBandEq>,
    limiter: Option<PeakLimiter>,
}

impl MasterChain {
    pub fn new(sample_rate: f32, settings: &MasterSettings) -> Self {
        let eq = settings
            .eq
            .enabled
            .then(|| eq_from_settings(sample_rate, &settings.eq));
        let limiter = settings.limiter.enabled.then(|| {
            PeakLimiter::new(
                sample_rate,
                settings.limiter.ceiling_db,
                settings.limiter.release_ms,
            )
        });
        Self { eq, limiter }
    }

    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        for channel in 0..buffer.channel_count() {
            if let Some(eq) = self.eq.as_mut() {
                eq.process(channel, buffer.channel_mut(channel));
            }
            if let Some(limiter) = self.limiter.as_mut() {
                limiter.process(channel, buffer.channel_mut(channel));
            }
        }
    }
}
