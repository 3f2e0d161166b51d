//! Plugins shipped with the engine, used when no external host is attached.

use serde::Deserialize;
use stori_dsp::gain::db_to_linear;
use stori_dsp::FeedbackDelay;

use crate::buffer::{AudioBuffer, BufferConfig};
use crate::plugin::{AudioProcessor, LivePlugin, PluginDescriptor, PluginError, PluginHost};

pub const GAIN_KIND: &str = "stori.gain";
pub const DELAY_KIND: &str = "stori.delay";

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
struct GainState {
    gain_db: f32,
}

impl Default for GainState {
    fn default() -> Self {
        Self { gain_db: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
struct DelayState {
    time_ms: f32,
    feedback: f32,
    mix: f32,
}

impl Default for DelayState {
    fn default() -> Self {
        Self {
            time_ms: 250.0,
            feedback: 0.35,
            mix: 0.3,
        }
    }
}

fn parse_state<T>(plugin: &LivePlugin) -> Result<T, PluginError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if plugin.state.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(plugin.state.clone())
        .map_err(|err| PluginError::InvalidConfig(format!("{}: {err}", plugin.kind)))
}

struct GainPlugin {
    descriptor: PluginDescriptor,
    gain: f32,
}

impl AudioProcessor for GainPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        self.descriptor.clone()
    }

    fn prepare(&mut self, _config: &BufferConfig) -> anyhow::Result<()> {
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> anyhow::Result<()> {
        for sample in buffer.iter_mut() {
            *sample *= self.gain;
        }
        Ok(())
    }
}

struct DelayPlugin {
    descriptor: PluginDescriptor,
    state: DelayState,
    delay: FeedbackDelay,
    sample_rate: f32,
}

impl AudioProcessor for DelayPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        self.descriptor.clone()
    }

    fn prepare(&mut self, config: &BufferConfig) -> anyhow::Result<()> {
        self.sample_rate = config.sample_rate;
        self.delay = FeedbackDelay::new(
            config.sample_rate,
            self.state.time_ms * 0.001,
            self.state.feedback,
            self.state.mix,
        );
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> anyhow::Result<()> {
        let frames = buffer.len();
        let stereo = buffer.channel_count() > 1;
        for frame in 0..frames {
            let left = buffer.channel(0)[frame];
            let right = if stereo { buffer.channel(1)[frame] } else { left };
            let (out_l, out_r) = self.delay.process_sample(left, right);
            buffer.channel_mut(0)[frame] = out_l;
            if stereo {
                buffer.channel_mut(1)[frame] = out_r;
            }
        }
        Ok(())
    }

    fn tail_seconds(&self) -> f64 {
        f64::from(self.delay.decay_seconds(self.sample_rate))
    }
}

/// [`PluginHost`] for the built-in `stori.gain` and `stori.delay` kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPlugins;

impl PluginHost for BuiltinPlugins {
    fn instantiate(
        &self,
        plugin: &LivePlugin,
        config: &BufferConfig,
    ) -> Result<Box<dyn AudioProcessor>, PluginError> {
        let descriptor = plugin.descriptor.clone();
        let mut processor: Box<dyn AudioProcessor> = match plugin.kind.as_str() {
            GAIN_KIND => {
                let state: GainState = parse_state(plugin)?;
                Box::new(GainPlugin {
                    descriptor,
                    gain: db_to_linear(state.gain_db),
                })
            }
            DELAY_KIND => {
                let state: DelayState = parse_state(plugin)?;
                Box::new(DelayPlugin {
                    descriptor,
                    delay: FeedbackDelay::new(config.sample_rate, state.time_ms * 0.001, state.feedback, state.mix),
                    state,
                    sample_rate: config.sample_rate,
                })
            }
            other => return Err(PluginError::UnknownKind(other.to_owned())),
        };
        processor.prepare(config).map_err(PluginError::Prepare)?;
        Ok(processor)
    }
}
