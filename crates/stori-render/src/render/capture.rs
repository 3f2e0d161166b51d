//! Drives the offline graph block by block into the output buffer.

use std::sync::atomic::{AtomicBool, Ordering};

use super::progress::RenderProgress;
use crate::automation::AutomationSampler;
use crate::buffer::AudioClip;
use crate::error::RenderError;
use crate::graph::OfflineGraph;
use crate::synth::lookahead_end;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePlan {
    /// Frames kept in the result: content plus tail.
    pub target_frames: u64,
    /// Extra frames rendered and discarded so plugin state can flush.
    pub drain_frames: u64,
}

impl CapturePlan {
    pub fn total_frames(&self) -> u64 {
        self.target_frames.saturating_add(self.drain_frames)
    }

    /// Share of the kept frames captured so far. Drain blocks report 1.0.
    pub fn fraction(&self, captured: u64) -> f32 {
        (captured as f64 / self.target_frames.max(1) as f64).min(1.0) as f32
    }
}

fn allocate_output(channels: usize, frames: u64) -> Result<Vec<Vec<f32>>, RenderError> {
    let capacity = usize::try_from(frames).map_err(|_| RenderError::Allocation { frames })?;
    (0..channels)
        .map(|_| {
            let mut channel = Vec::new();
            channel
                .try_reserve_exact(capacity)
                .map_err(|_| RenderError::Allocation { frames })?;
            Ok(channel)
        })
        .collect()
}

/// Runs the capture loop until the plan is complete or `cancel` is raised.
/// Per block: sampler events are dispatched up to two buffers ahead,
/// automation is evaluated at its sub-block cadence, the rendered frames are
/// appended, progress is published and cancellation is checked.
pub fn run_capture(
    graph: &mut OfflineGraph,
    automation: &AutomationSampler,
    plan: CapturePlan,
    cancel: &AtomicBool,
    progress: &RenderProgress,
) -> Result<AudioClip, RenderError> {
    let config = graph.config().clone();
    let block_size = config.block_size;
    let sample_rate = config.sample_rate;
    let mut output = allocate_output(config.layout.channels(), plan.target_frames)?;
    let total = plan.total_frames();

    graph.dispatch_sampler_events(lookahead_end(0, block_size));

    let mut captured = 0u64;
    while captured < total {
        if cancel.load(Ordering::Acquire) {
            return Err(RenderError::Cancelled);
        }

        let position = graph.position();
        graph.dispatch_sampler_events(lookahead_end(position, block_size));

        for (from, to) in automation.segments(block_size) {
            if !automation.is_empty() {
                automation.apply(position + from as u64, graph);
            }
            let rendered = graph.render(to - from)?;
            let written = output.first().map(Vec::len).unwrap_or_default() as u64;
            let keep = (rendered.len() as u64).min(plan.target_frames.saturating_sub(written)) as usize;
            if keep > 0 {
                for (target, source) in output.iter_mut().zip(rendered.channels()) {
                    target.extend_from_slice(&source[..keep]);
                }
            }
        }
        if !automation.is_empty() {
            automation.apply(position + block_size as u64, graph);
        }

        captured += block_size as u64;
        progress.set_fraction(plan.fraction(captured));
    }

    // Output was only filled up to the target, so the drain is already gone.
    Ok(AudioClip::with_sample_rate(sample_rate, output))
}
