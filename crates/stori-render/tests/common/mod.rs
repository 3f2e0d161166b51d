#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use crossbeam_channel::Receiver;
use stori_render::project::PluginConfig;
use stori_render::synth::SampleBankProvider;
use stori_render::{
    AudioBuffer, AudioProcessor, BufferConfig, BuiltinPlugins, DecodedAudio, LivePlugin, MemoryAssets,
    PluginDescriptor, PluginError, PluginHost, PluginId, Project, RenderServices, SnapshotGraph,
};

pub const SAMPLE_RATE: u32 = 48_000;
pub const LATENCY_KIND: &str = "test.latency";
pub const BLOCKING_KIND: &str = "test.block";

/// Delays its input by a fixed number of samples and reports that latency.
struct LatencyPlugin {
    lines: Vec<VecDeque<f32>>,
    samples: usize,
}

impl AudioProcessor for LatencyPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new(LATENCY_KIND, "Latency", "Tests")
    }

    fn prepare(&mut self, _config: &BufferConfig) -> anyhow::Result<()> {
        self.lines = (0..2)
            .map(|_| std::iter::repeat(0.0).take(self.samples).collect())
            .collect();
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> anyhow::Result<()> {
        for (line, channel) in self.lines.iter_mut().zip(buffer.channels_mut()) {
            for sample in channel.iter_mut() {
                line.push_back(*sample);
                *sample = line.pop_front().unwrap_or(0.0);
            }
        }
        Ok(())
    }

    fn latency_samples(&self) -> usize {
        self.samples
    }
}

/// Blocks its first `process` call until released.
struct BlockingPlugin {
    release: Receiver<()>,
    entered: Arc<AtomicBool>,
    released: bool,
}

impl AudioProcessor for BlockingPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new(BLOCKING_KIND, "Blocking", "Tests")
    }

    fn prepare(&mut self, _config: &BufferConfig) -> anyhow::Result<()> {
        Ok(())
    }

    fn process(&mut self, _buffer: &mut AudioBuffer) -> anyhow::Result<()> {
        if !self.released {
            self.entered.store(true, Ordering::Release);
            self.release
                .recv_timeout(Duration::from_secs(20))
                .map_err(|_| anyhow!("blocking plugin was never released"))?;
            self.released = true;
        }
        Ok(())
    }
}

/// Built-in plugins plus the test processors above.
pub struct TestHost {
    builtin: BuiltinPlugins,
    release: Option<Receiver<()>>,
    pub entered: Arc<AtomicBool>,
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            builtin: BuiltinPlugins,
            release: None,
            entered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_release(mut self, release: Receiver<()>) -> Self {
        self.release = Some(release);
        self
    }
}

impl PluginHost for TestHost {
    fn instantiate(
        &self,
        plugin: &LivePlugin,
        config: &BufferConfig,
    ) -> Result<Box<dyn AudioProcessor>, PluginError> {
        let mut processor: Box<dyn AudioProcessor> = match plugin.kind.as_str() {
            LATENCY_KIND => Box::new(LatencyPlugin {
                lines: Vec::new(),
                samples: plugin.latency_samples,
            }),
            BLOCKING_KIND => {
                let release = self
                    .release
                    .clone()
                    .ok_or_else(|| PluginError::InvalidConfig("no release channel".into()))?;
                Box::new(BlockingPlugin {
                    release,
                    entered: Arc::clone(&self.entered),
                    released: false,
                })
            }
            _ => return self.builtin.instantiate(plugin, config),
        };
        processor.prepare(config).map_err(PluginError::Prepare)?;
        Ok(processor)
    }
}

pub fn plugin(id: u64, kind: &str) -> PluginConfig {
    PluginConfig {
        id: PluginId(id),
        kind: kind.into(),
        name: kind.into(),
        bypassed: false,
        state: serde_json::Value::Null,
        latency_samples: 0,
        tail_seconds: 0.0,
    }
}

pub fn constant(value: f32, frames: usize) -> DecodedAudio {
    DecodedAudio::new(SAMPLE_RATE, vec![vec![value; frames]])
}

pub fn impulse(value: f32, frames: usize) -> DecodedAudio {
    let mut samples = vec![0.0; frames];
    samples[0] = value;
    DecodedAudio::new(SAMPLE_RATE, vec![samples])
}

pub fn services(project: &Arc<Project>, host: TestHost, assets: MemoryAssets) -> RenderServices {
    services_with_banks(project, host, assets, SampleBankProvider::new())
}

pub fn services_with_banks(
    project: &Arc<Project>,
    host: TestHost,
    assets: MemoryAssets,
    banks: SampleBankProvider,
) -> RenderServices {
    RenderServices {
        live: Arc::new(SnapshotGraph::new(Arc::clone(project))),
        plugins: Arc::new(host),
        assets: Arc::new(assets),
        soundfonts: Arc::new(banks),
    }
}

/// Waits for `condition`, giving up after `limit`.
pub fn eventually(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let started = std::time::Instant::now();
    while started.elapsed() < limit {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
