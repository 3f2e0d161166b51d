//! Sample-timestamped MIDI events generated once per export.

use crate::project::MidiRegion;
use crate::time::Tempo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    ControlChange { controller: u8, value: u8 },
    /// Signed 14-bit bend, `-8192..=8191`.
    PitchBend { value: i16 },
}

pub const CC_SUSTAIN: u8 = 64;
pub const CC_ALL_SOUND_OFF: u8 = 120;
pub const CC_ALL_NOTES_OFF: u8 = 123;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub sample: u64,
    pub event: MidiEvent,
}

impl ScheduledEvent {
    pub fn new(sample: u64, event: MidiEvent) -> Self {
        Self { sample, event }
    }
}

/// Events ordered by sample position, ties in insertion order. Consumption
/// only moves forward.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<ScheduledEvent>,
    cursor: usize,
}

impl EventQueue {
    pub fn new(mut events: Vec<ScheduledEvent>) -> Self {
        // `sort_by_key` is stable.
        events.sort_by_key(|event| event.sample);
        Self { events, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Retires the next pending event if it lies before `end`.
    pub fn pop_before(&mut self, end: u64) -> Option<ScheduledEvent> {
        let event = *self.events.get(self.cursor)?;
        if event.sample >= end {
            return None;
        }
        self.cursor += 1;
        Some(event)
    }

    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }
}

/// Expands MIDI regions into absolute sample events. Muted regions are
/// skipped, looped regions repeat every `duration_beats`, notes are clipped to
/// their repetition and `offset_samples` is added to every timestamp.
pub fn schedule_regions<'a>(
    regions: impl IntoIterator<Item = &'a MidiRegion>,
    tempo: Tempo,
    sample_rate: f32,
    offset_samples: u64,
) -> EventQueue {
    let mut controllers = Vec::new();
    let mut bends = Vec::new();
    let mut offs = Vec::new();
    let mut ons = Vec::new();
    let at = |beat: f64| tempo.beat_to_sample(beat, sample_rate).saturating_add(offset_samples);

    for region in regions {
        if region.muted || region.duration_beats <= 0.0 {
            continue;
        }
        for repetition in 0..region.repetitions() {
            let origin = region.start_beat + region.duration_beats * f64::from(repetition);
            let limit = region.duration_beats;

            for cc in &region.controllers {
                if (0.0..limit).contains(&cc.beat) {
                    controllers.push(ScheduledEvent::new(
                        at(origin + cc.beat),
                        MidiEvent::ControlChange {
                            controller: cc.controller.min(127),
                            value: cc.value.min(127),
                        },
                    ));
                }
            }
            for bend in &region.pitch_bends {
                if (0.0..limit).contains(&bend.beat) {
                    bends.push(ScheduledEvent::new(
                        at(origin + bend.beat),
                        MidiEvent::PitchBend {
                            value: bend.value.clamp(-8192, 8191),
                        },
                    ));
                }
            }
            for note in &region.notes {
                if note.duration_beats <= 0.0 || !(0.0..limit).contains(&note.start_beat) {
                    continue;
                }
                let on = at(origin + note.start_beat);
                let end_beat = (note.start_beat + note.duration_beats).min(limit);
                let off = at(origin + end_beat).max(on.saturating_add(1));
                let pitch = note.pitch.min(127);
                ons.push(ScheduledEvent::new(
                    on,
                    MidiEvent::NoteOn {
                        pitch,
                        velocity: note.velocity.min(127),
                    },
                ));
                offs.push(ScheduledEvent::new(off, MidiEvent::NoteOff { pitch }));
            }
        }
    }

    let mut events = controllers;
    events.append(&mut bends);
    events.append(&mut offs);
    events.append(&mut ons);
    EventQueue::new(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ControllerEvent, MidiNote};

    #[test]
    fn ties_keep_insertion_order() {
        let queue = EventQueue::new(vec![
            ScheduledEvent::new(10, MidiEvent::NoteOn { pitch: 1, velocity: 1 }),
            ScheduledEvent::new(5, MidiEvent::NoteOff { pitch: 2 }),
            ScheduledEvent::new(10, MidiEvent::NoteOff { pitch: 3 }),
        ]);
        let samples: Vec<_> = queue.events().iter().map(|event| event.sample).collect();
        assert_eq!(samples, vec![5, 10, 10]);
        assert_eq!(queue.events()[1].event, MidiEvent::NoteOn { pitch: 1, velocity: 1 });
    }

    #[test]
    fn retirement_is_monotonic() {
        let mut queue = EventQueue::new(vec![
            ScheduledEvent::new(0, MidiEvent::NoteOn { pitch: 60, velocity: 100 }),
            ScheduledEvent::new(100, MidiEvent::NoteOff { pitch: 60 }),
        ]);
        assert_eq!(queue.pop_before(50).map(|event| event.sample), Some(0));
        assert!(queue.pop_before(50).is_none());
        assert!(queue.pop_before(10).is_none());
        assert_eq!(queue.pop_before(101).map(|event| event.sample), Some(100));
        assert!(queue.pop_before(u64::MAX).is_none());
    }

    #[test]
    fn looped_region_repeats_and_clips_notes() {
        let mut region = MidiRegion::new(1.0, 2.0);
        region.looped = true;
        region.loop_count = 2;
        region.notes.push(MidiNote {
            pitch: 60,
            velocity: 90,
            start_beat: 1.0,
            duration_beats: 4.0,
        });
        // 120 BPM at 1 kHz: 500 samples per beat.
        let queue = schedule_regions([&region], Tempo(120.0), 1_000.0, 0);
        let events: Vec<_> = queue.events().iter().map(|e| (e.sample, e.event)).collect();
        assert_eq!(
            events,
            vec![
                (1_000, MidiEvent::NoteOn { pitch: 60, velocity: 90 }),
                (1_500, MidiEvent::NoteOff { pitch: 60 }),
                (2_000, MidiEvent::NoteOn { pitch: 60, velocity: 90 }),
                (2_500, MidiEvent::NoteOff { pitch: 60 }),
            ]
        );
    }

    #[test]
    fn controllers_precede_notes_and_offset_applies() {
        let mut region = MidiRegion::new(0.0, 4.0).with_note(64, 80, 0.0, 1.0);
        region.controllers.push(ControllerEvent {
            controller: 7,
            value: 100,
            beat: 0.0,
        });
        let queue = schedule_regions([&region], Tempo(120.0), 1_000.0, 128);
        assert_eq!(queue.events()[0].sample, 128);
        assert!(matches!(queue.events()[0].event, MidiEvent::ControlChange { .. }));
        assert!(matches!(queue.events()[1].event, MidiEvent::NoteOn { .. }));
    }

    #[test]
    fn muted_and_zero_length_are_skipped() {
        let mut muted = MidiRegion::new(0.0, 4.0).with_note(60, 100, 0.0, 1.0);
        muted.muted = true;
        let zero = MidiRegion::new(0.0, 4.0).with_note(60, 100, 0.0, 0.0);
        let queue = schedule_regions([&muted, &zero], Tempo(120.0), 48_000.0, 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn sub_sample_note_still_closes() {
        let region = MidiRegion::new(0.0, 4.0).with_note(60, 100, 1.0, 1e-6);
        let queue = schedule_regions([&region], Tempo(120.0), 48_000.0, 0);
        let samples: Vec<_> = queue.events().iter().map(|event| event.sample).collect();
        assert_eq!(samples, vec![24_000, 24_001]);
        assert!(matches!(queue.events()[1].event, MidiEvent::NoteOff { pitch: 60 }));
    }
}
