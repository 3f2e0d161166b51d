use serde::{Deserialize, Serialize};

/// Output channel configuration of the render graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Shared configuration passed to processors during preparation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferConfig {
    pub sample_rate: f32,
    pub block_size: usize,
    pub layout: ChannelLayout,
}

impl BufferConfig {
    pub fn new(sample_rate: f32, block_size: usize, layout: ChannelLayout) -> Self {
        Self {
            sample_rate,
            block_size,
            layout,
        }
    }
}

/// Non-interleaved audio buffer for processing.
///
/// Storage is allocated once for the configured block size; [`AudioBuffer::set_len`]
/// only shrinks or regrows within that capacity so the render path never
/// allocates.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(num_channels: usize, block_size: usize) -> Self {
        let channels = (0..num_channels).map(|_| vec![0.0; block_size]).collect();
        Self { channels }
    }

    pub fn from_config(config: &BufferConfig) -> Self {
        Self::new(config.layout.channels(), config.block_size)
    }

    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    pub fn len(&self) -> usize {
        self.channels
            .first()
            .map(|channel| channel.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resizes every channel to `frames`, zeroing the contents.
    pub fn set_len(&mut self, frames: usize) {
        for channel in &mut self.channels {
            channel.clear();
            channel.resize(frames, 0.0);
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.channels
            .iter_mut()
            .flat_map(|channel| channel.iter_mut())
    }

    pub fn channels(&self) -> impl Iterator<Item = &Vec<f32>> {
        self.channels.iter()
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Vec<f32>> {
        self.channels.iter_mut()
    }

    pub fn as_slice(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Mixes `source * gain` into this buffer over the shared frame range.
    pub fn add_scaled(&mut self, source: &AudioBuffer, gain: f32) {
        for (target, source) in self.channels.iter_mut().zip(source.channels.iter()) {
            for (t, s) in target.iter_mut().zip(source.iter()) {
                *t += s * gain;
            }
        }
    }

    pub fn copy_from(&mut self, source: &AudioBuffer) {
        for (target, source) in self.channels.iter_mut().zip(source.channels.iter()) {
            let frames = target.len().min(source.len());
            target[..frames].copy_from_slice(&source[..frames]);
        }
    }

    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|channel| channel.iter())
            .fold(0.0f32, |peak, sample| peak.max(sample.abs()))
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self {
            channels: vec![vec![0.0; 1]],
        }
    }
}

/// Owned, non-interleaved clip of rendered or decoded audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    sample_rate: f32,
    channels: Vec<Vec<f32>>,
}

impl AudioClip {
    pub fn with_sample_rate(sample_rate: f32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or_default()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate.max(1.0))
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        self.channels
            .get(channel)
            .and_then(|channel| channel.get(frame))
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_len_zeroes_contents() {
        let mut buffer = AudioBuffer::new(2, 8);
        buffer.iter_mut().for_each(|s| *s = 1.0);
        buffer.set_len(4);
        assert_eq!(buffer.len(), 4);
        assert!(buffer.channels().all(|c| c.iter().all(|s| *s == 0.0)));
    }

    #[test]
    fn add_scaled_mixes_shared_range() {
        let mut target = AudioBuffer::new(2, 4);
        let mut source = AudioBuffer::new(2, 2);
        source.iter_mut().for_each(|s| *s = 0.5);
        target.add_scaled(&source, 2.0);
        assert_eq!(target.channel(0), &[1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn clip_reports_duration() {
        let clip = AudioClip::with_sample_rate(48_000.0, vec![vec![0.0; 24_000]; 2]);
        assert_eq!(clip.frames(), 24_000);
        assert!((clip.duration_seconds() - 0.5).abs() < 1e-9);
    }
}
