//! Beat-keyed mixer automation evaluated at a fixed sub-buffer rate.

use serde::{Deserialize, Serialize};

use crate::project::{Project, TrackId};
use crate::time::Tempo;

pub mod curve;

pub use curve::{AutomationCurve, CurvePoint, CurveShape};

/// Evaluation rate of automation curves during an export.
pub const AUTOMATION_RATE_HZ: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationParameter {
    Volume,
    Pan,
    EqLow,
    EqMid,
    EqHigh,
}

impl AutomationParameter {
    pub const ALL: [AutomationParameter; 5] = [
        AutomationParameter::Volume,
        AutomationParameter::Pan,
        AutomationParameter::EqLow,
        AutomationParameter::EqMid,
        AutomationParameter::EqHigh,
    ];

    /// Maps a normalised curve value onto the parameter's native range:
    /// volume is linear gain in `[0, 2]`, pan is `[-1, 1]`, EQ bands are dB.
    pub fn map(self, normalized: f32) -> f32 {
        match self {
            AutomationParameter::Volume => normalized.clamp(0.0, 2.0),
            AutomationParameter::Pan => (normalized.clamp(0.0, 1.0) * 2.0 - 1.0).clamp(-1.0, 1.0),
            AutomationParameter::EqLow | AutomationParameter::EqMid | AutomationParameter::EqHigh => {
                eq_gain_db(normalized)
            }
        }
    }
}

#[inline]
pub fn eq_gain_db(normalized: f32) -> f32 {
    (normalized.clamp(0.0, 1.0) - 0.5) * 24.0
}

/// Receives evaluated automation values.
pub trait AutomationTarget {
    fn apply_automation(&mut self, track: TrackId, parameter: AutomationParameter, value: f32);
}

#[derive(Debug, Clone)]
struct TrackAutomation {
    track: TrackId,
    lanes: Vec<(AutomationParameter, AutomationCurve)>,
}

/// Converts render positions to beats and writes curve values onto a target.
#[derive(Debug, Clone)]
pub struct AutomationSampler {
    tempo: Tempo,
    sample_rate: f32,
    interval: usize,
    tracks: Vec<TrackAutomation>,
}

impl AutomationSampler {
    pub fn new(tempo: Tempo, sample_rate: f32) -> Self {
        let interval = (sample_rate / AUTOMATION_RATE_HZ).round().max(1.0) as usize;
        Self {
            tempo,
            sample_rate,
            interval,
            tracks: Vec::new(),
        }
    }

    /// Loads the automation lanes of every track in `tracks`.
    pub fn for_tracks(project: &Project, tracks: &[TrackId], sample_rate: f32) -> Self {
        let mut sampler = Self::new(project.tempo, sample_rate);
        for id in tracks {
            let Some(track) = project.track(*id) else {
                continue;
            };
            for parameter in AutomationParameter::ALL {
                if let Some(lane) = track.automation_for(parameter) {
                    sampler.add_lane(*id, parameter, AutomationCurve::from_points(&lane.points));
                }
            }
        }
        sampler
    }

    pub fn add_lane(&mut self, track: TrackId, parameter: AutomationParameter, curve: AutomationCurve) {
        if curve.is_empty() {
            return;
        }
        match self.tracks.iter_mut().find(|entry| entry.track == track) {
            Some(entry) => {
                entry.lanes.retain(|(existing, _)| *existing != parameter);
                entry.lanes.push((parameter, curve));
            }
            None => self.tracks.push(TrackAutomation {
                track,
                lanes: vec![(parameter, curve)],
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Samples between two evaluations, `sample_rate / 120`.
    pub fn interval(&self) -> usize {
        self.interval
    }

    /// Evaluates every lane at the absolute render position `sample`.
    pub fn apply<T: AutomationTarget>(&self, sample: u64, target: &mut T) {
        let beat = self.tempo.sample_to_beat(sample, self.sample_rate);
        for entry in &self.tracks {
            for (parameter, curve) in &entry.lanes {
                if let Some(value) = curve.value_at(beat) {
                    target.apply_automation(entry.track, *parameter, parameter.map(value));
                }
            }
        }
    }

    /// Sub-block boundaries of a buffer of `frames` frames: offsets at which
    /// the curves are evaluated before rendering the following segment.
    pub fn segments(&self, frames: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let interval = if self.is_empty() { frames.max(1) } else { self.interval };
        (0..frames)
            .step_by(interval)
            .map(move |start| (start, (start + interval).min(frames)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{AutomationLane, AutomationPoint, Track};

    #[derive(Default)]
    struct Recorder(Vec<(TrackId, AutomationParameter, f32)>);

    impl AutomationTarget for Recorder {
        fn apply_automation(&mut self, track: TrackId, parameter: AutomationParameter, value: f32) {
            self.0.push((track, parameter, value));
        }
    }

    #[test]
    fn eq_mapping_spans_plus_minus_twelve() {
        assert_eq!(eq_gain_db(0.0), -12.0);
        assert_eq!(eq_gain_db(0.5), 0.0);
        assert_eq!(eq_gain_db(1.0), 12.0);
        assert_eq!(AutomationParameter::Pan.map(0.0), -1.0);
        assert_eq!(AutomationParameter::Volume.map(3.0), 2.0);
    }

    #[test]
    fn interval_targets_one_hundred_twenty_hertz() {
        let sampler = AutomationSampler::new(Tempo(120.0), 48_000.0);
        assert_eq!(sampler.interval(), 400);
    }

    #[test]
    fn segments_cover_the_buffer() {
        let mut sampler = AutomationSampler::new(Tempo(120.0), 48_000.0);
        sampler.add_lane(
            TrackId(1),
            AutomationParameter::Volume,
            AutomationCurve::from_points(&[AutomationPoint {
                beat: 0.0,
                value: 1.0,
                shape: CurveShape::Linear,
            }]),
        );
        let segments: Vec<_> = sampler.segments(1024).collect();
        assert_eq!(segments, vec![(0, 400), (400, 800), (800, 1024)]);
    }

    #[test]
    fn empty_sampler_renders_whole_buffer() {
        let sampler = AutomationSampler::new(Tempo(120.0), 48_000.0);
        assert_eq!(sampler.segments(512).collect::<Vec<_>>(), vec![(0, 512)]);
    }

    #[test]
    fn evaluates_in_beats() {
        let mut track = Track::new(3);
        track.automation.push(AutomationLane {
            parameter: AutomationParameter::EqHigh,
            points: vec![
                AutomationPoint {
                    beat: 0.0,
                    value: 0.5,
                    shape: CurveShape::Linear,
                },
                AutomationPoint {
                    beat: 2.0,
                    value: 1.0,
                    shape: CurveShape::Linear,
                },
            ],
        });
        let project = Project {
            tracks: vec![track],
            ..Project::default()
        };
        let sampler = AutomationSampler::for_tracks(&project, &[TrackId(3)], 48_000.0);
        let mut recorder = Recorder::default();
        // One beat at 120 BPM is 24 000 samples.
        sampler.apply(24_000, &mut recorder);
        assert_eq!(recorder.0.len(), 1);
        let (track, parameter, value) = recorder.0[0];
        assert_eq!(track, TrackId(3));
        assert_eq!(parameter, AutomationParameter::EqHigh);
        assert!((value - 6.0).abs() < 1e-4);
    }
}
