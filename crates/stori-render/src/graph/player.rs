//! Audio region playback scheduled on absolute output frames.

use std::sync::Arc;

use crate::buffer::AudioBuffer;
use crate::media::DecodedAudio;
use crate::project::AudioRegion;
use crate::time::{seconds_to_frames, Tempo};

/// One contiguous read of a source asset.
#[derive(Debug, Clone)]
pub struct ScheduledSegment {
    pub audio: Arc<DecodedAudio>,
    /// First output frame of the segment.
    pub start_frame: u64,
    pub length_frames: u64,
    /// Source position, in source frames, played at `start_frame`.
    pub source_offset: f64,
    /// Source frames per output frame.
    pub step: f64,
    pub gain: f32,
    /// Output frame range of the whole region, for fades.
    pub region_start: u64,
    pub region_end: u64,
    pub fade_in_frames: u64,
    pub fade_out_frames: u64,
}

impl ScheduledSegment {
    pub fn end_frame(&self) -> u64 {
        self.start_frame + self.length_frames
    }

    #[inline]
    fn fade(&self, frame: u64) -> f32 {
        let mut gain = 1.0;
        if self.fade_in_frames > 0 {
            let into = frame.saturating_sub(self.region_start);
            if into < self.fade_in_frames {
                gain *= into as f32 / self.fade_in_frames as f32;
            }
        }
        if self.fade_out_frames > 0 {
            let left = self.region_end.saturating_sub(frame);
            if left < self.fade_out_frames {
                gain *= left as f32 / self.fade_out_frames as f32;
            }
        }
        gain
    }
}

/// Expands a region into its source starts. A looped region repeats its
/// content length `L` (the loop unit, or the source length after the offset)
/// `⌈D / L⌉` times, spaced exactly `L` apart, the last repetition cut at the
/// region end. `delay_seconds` shifts the whole region.
pub fn schedule_region(
    region: &AudioRegion,
    audio: Arc<DecodedAudio>,
    tempo: Tempo,
    sample_rate: f32,
    delay_seconds: f64,
) -> Vec<ScheduledSegment> {
    let start_seconds = tempo.beats_to_seconds(region.start_beat.max(0.0)) + delay_seconds;
    let duration_seconds = tempo.beats_to_seconds(region.duration_beats.max(0.0));
    let region_start = seconds_to_frames(start_seconds, sample_rate);
    let region_end = seconds_to_frames(start_seconds + duration_seconds, sample_rate);
    if region_end <= region_start {
        return Vec::new();
    }

    let source_rate = f64::from(audio.sample_rate.max(1));
    let offset_seconds = region.offset_seconds.max(0.0);
    let template = ScheduledSegment {
        audio: Arc::clone(&audio),
        start_frame: region_start,
        length_frames: region_end - region_start,
        source_offset: offset_seconds * source_rate,
        step: source_rate / f64::from(sample_rate.max(1.0)),
        gain: region.gain.max(0.0),
        region_start,
        region_end,
        fade_in_frames: seconds_to_frames(region.fade_in_seconds, sample_rate),
        fade_out_frames: seconds_to_frames(region.fade_out_seconds, sample_rate),
    };

    if !region.looped {
        return vec![template];
    }

    let unit_seconds = match region.loop_unit_beats {
        Some(beats) if beats > 0.0 => tempo.beats_to_seconds(beats),
        _ => audio.duration_seconds() - offset_seconds,
    };
    if unit_seconds <= 0.0 || !unit_seconds.is_finite() {
        return vec![template];
    }

    let repetitions = (duration_seconds / unit_seconds).ceil().max(1.0) as u64;
    (0..repetitions)
        .filter_map(|index| {
            let start =
                seconds_to_frames(start_seconds + unit_seconds * index as f64, sample_rate);
            let end = seconds_to_frames(start_seconds + unit_seconds * (index + 1) as f64, sample_rate)
                .min(region_end);
            (end > start).then(|| ScheduledSegment {
                start_frame: start,
                length_frames: end - start,
                ..template.clone()
            })
        })
        .collect()
}

/// Plays every scheduled segment of one track.
#[derive(Debug, Default)]
pub struct RegionPlayer {
    segments: Vec<ScheduledSegment>,
}

impl RegionPlayer {
    pub fn new(mut segments: Vec<ScheduledSegment>) -> Self {
        segments.sort_by_key(|segment| segment.start_frame);
        Self { segments }
    }

    pub fn segments(&self) -> &[ScheduledSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Adds the frames `[start, start + buffer.len())` into `buffer`.
    pub fn render(&self, start: u64, buffer: &mut AudioBuffer) {
        let end = start + buffer.len() as u64;
        let channels = buffer.channel_count();
        for segment in &self.segments {
            if segment.start_frame >= end {
                break;
            }
            let from = segment.start_frame.max(start);
            let to = segment.end_frame().min(end);
            for frame in from..to {
                let position =
                    segment.source_offset + (frame - segment.start_frame) as f64 * segment.step;
                let gain = segment.gain * segment.fade(frame);
                let index = (frame - start) as usize;
                for channel in 0..channels {
                    buffer.channel_mut(channel)[index] += segment.audio.read(channel, position) * gain;
                }
            }
        }
    }
}
