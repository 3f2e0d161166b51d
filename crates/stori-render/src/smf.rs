//! Standard MIDI File export of MIDI regions: format 0, one track, 480 PPQ.

use std::path::{Path, PathBuf};

use midly::num::{u14, u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, TrackEvent, TrackEventKind};
use thiserror::Error;

use crate::project::{MidiRegion, Track};
use crate::time::Tempo;

pub const TICKS_PER_QUARTER: u16 = 480;

#[derive(Debug, Error)]
pub enum SmfError {
    #[error("tempo {0} bpm cannot be written")]
    InvalidTempo(f64),
    #[error("failed to serialise midi file: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

struct TimedEvent<'a> {
    tick: u64,
    order: u8,
    kind: TrackEventKind<'a>,
}

/// Encodes one region with positions relative to the region start.
pub fn region_to_smf(region: &MidiRegion, tempo: Tempo) -> Result<Vec<u8>, SmfError> {
    let mut events = Vec::new();
    collect_region(region, 0.0, &mut events);
    encode(None, tempo, events)
}

/// Encodes every unmuted region of `track` at its absolute position, with
/// looped regions expanded.
pub fn track_to_smf(track: &Track, tempo: Tempo) -> Result<Vec<u8>, SmfError> {
    let mut events = Vec::new();
    for region in track.midi_regions.iter().filter(|region| !region.muted) {
        collect_region(region, region.start_beat, &mut events);
    }
    encode(Some(track.name.as_bytes()), tempo, events)
}

/// Writes [`track_to_smf`] output to `path`.
pub fn export_track(track: &Track, tempo: Tempo, path: &Path) -> Result<(), SmfError> {
    let bytes = track_to_smf(track, tempo)?;
    std::fs::write(path, bytes).map_err(|source| SmfError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), track = %track.name, "midi file written");
    Ok(())
}

fn beat_to_tick(beat: f64) -> u64 {
    (beat.max(0.0) * f64::from(TICKS_PER_QUARTER)).round() as u64
}

fn midi(message: MidiMessage) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::from(0),
        message,
    }
}

fn collect_region(region: &MidiRegion, origin: f64, events: &mut Vec<TimedEvent<'_>>) {
    if region.duration_beats <= 0.0 {
        return;
    }
    let limit = region.duration_beats;
    for repetition in 0..region.repetitions() {
        let base = origin + limit * f64::from(repetition);

        for note in &region.notes {
            if note.duration_beats <= 0.0 || !(0.0..limit).contains(&note.start_beat) {
                continue;
            }
            let on = beat_to_tick(base + note.start_beat);
            let end = (note.start_beat + note.duration_beats).min(limit);
            let off = beat_to_tick(base + end).max(on.saturating_add(1));
            let key = u7::from(note.pitch.min(127));
            events.push(TimedEvent {
                tick: off,
                order: 0,
                kind: midi(MidiMessage::NoteOff { key, vel: u7::from(0) }),
            });
            events.push(TimedEvent {
                tick: on,
                order: 3,
                kind: midi(MidiMessage::NoteOn {
                    key,
                    vel: u7::from(note.velocity.min(127)),
                }),
            });
        }
        for cc in region.controllers.iter().filter(|cc| (0.0..limit).contains(&cc.beat)) {
            events.push(TimedEvent {
                tick: beat_to_tick(base + cc.beat),
                order: 1,
                kind: midi(MidiMessage::Controller {
                    controller: u7::from(cc.controller.min(127)),
                    value: u7::from(cc.value.min(127)),
                }),
            });
        }
        for bend in region.pitch_bends.iter().filter(|bend| (0.0..limit).contains(&bend.beat)) {
            let raw = (i32::from(bend.value.clamp(-8192, 8191)) + 8192) as u16;
            events.push(TimedEvent {
                tick: beat_to_tick(base + bend.beat),
                order: 2,
                kind: midi(MidiMessage::PitchBend {
                    bend: PitchBend(u14::from(raw)),
                }),
            });
        }
    }
}

fn encode<'a>(name: Option<&'a [u8]>, tempo: Tempo, mut events: Vec<TimedEvent<'a>>) -> Result<Vec<u8>, SmfError> {
    if !tempo.is_valid() {
        return Err(SmfError::InvalidTempo(tempo.beats_per_minute()));
    }
    let micros_per_quarter = (60_000_000.0 / tempo.beats_per_minute()).round().min(f64::from(0xFF_FFFF)) as u32;

    events.sort_by_key(|event| (event.tick, event.order));

    let mut track = Vec::with_capacity(events.len() + 3);
    if let Some(name) = name {
        track.push(TrackEvent {
            delta: u28::from(0_u32),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(name)),
        });
    }
    track.push(TrackEvent {
        delta: u28::from(0_u32),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(micros_per_quarter))),
    });

    let mut previous = 0_u64;
    for event in events {
        let delta = (event.tick - previous).min(u64::from(u32::MAX)) as u32;
        track.push(TrackEvent {
            delta: u28::from(delta),
            kind: event.kind,
        });
        previous = event.tick;
    }
    track.push(TrackEvent {
        delta: u28::from(0_u32),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let header = Header {
        format: Format::SingleTrack,
        timing: Timing::Metrical(u15::from(TICKS_PER_QUARTER)),
    };
    let mut bytes = Vec::new();
    Smf {
        header,
        tracks: vec![track],
    }
    .write_std(&mut bytes)
    .map_err(SmfError::Write)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ControllerEvent, PitchBendEvent};

    fn decode(bytes: &[u8]) -> Vec<(u64, TrackEventKind<'_>)> {
        let smf = Smf::parse(bytes).unwrap();
        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(smf.tracks.len(), 1);
        let mut tick = 0;
        smf.tracks[0]
            .iter()
            .map(|event| {
                tick += u64::from(event.delta.as_int());
                (tick, event.kind)
            })
            .collect()
    }

    #[test]
    fn offs_precede_ons_on_shared_ticks() {
        let region = MidiRegion::new(0.0, 4.0)
            .with_note(60, 100, 0.0, 1.0)
            .with_note(62, 100, 1.0, 1.0);
        let bytes = region_to_smf(&region, Tempo(120.0)).unwrap();
        let at_beat_one: Vec<_> = decode(&bytes)
            .into_iter()
            .filter(|(tick, kind)| *tick == 480 && matches!(kind, TrackEventKind::Midi { .. }))
            .collect();
        assert!(matches!(
            at_beat_one[0].1,
            TrackEventKind::Midi {
                message: MidiMessage::NoteOff { .. },
                ..
            }
        ));
        assert!(matches!(
            at_beat_one[1].1,
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { .. },
                ..
            }
        ));
    }

    #[test]
    fn short_notes_close_a_tick_later_and_empty_notes_vanish() {
        let region = MidiRegion::new(0.0, 4.0)
            .with_note(60, 100, 1.0, 0.0001)
            .with_note(64, 100, 2.0, 0.0);
        let bytes = region_to_smf(&region, Tempo(120.0)).unwrap();
        let notes: Vec<_> = decode(&bytes)
            .into_iter()
            .filter_map(|(tick, kind)| match kind {
                TrackEventKind::Midi { message, .. } => Some((tick, message)),
                _ => None,
            })
            .collect();
        assert_eq!(notes.len(), 2);
        assert!(matches!(notes[0], (480, MidiMessage::NoteOn { .. })));
        assert!(matches!(notes[1], (481, MidiMessage::NoteOff { .. })));
    }

    #[test]
    fn tempo_and_end_of_track_are_written() {
        let region = MidiRegion::new(0.0, 1.0);
        let bytes = region_to_smf(&region, Tempo(100.0)).unwrap();
        let events = decode(&bytes);
        assert!(matches!(events[0].1, TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 600_000));
        assert!(matches!(events.last().unwrap().1, TrackEventKind::Meta(MetaMessage::EndOfTrack)));
    }

    #[test]
    fn controllers_and_bends_are_encoded() {
        let mut region = MidiRegion::new(0.0, 2.0);
        region.controllers.push(ControllerEvent {
            controller: 64,
            value: 127,
            beat: 0.5,
        });
        region.pitch_bends.push(PitchBendEvent { value: -8192, beat: 1.0 });
        let bytes = region_to_smf(&region, Tempo(120.0)).unwrap();
        let events = decode(&bytes);
        assert!(events.iter().any(|(tick, kind)| *tick == 240
            && matches!(kind, TrackEventKind::Midi { message: MidiMessage::Controller { controller, value }, .. }
                if controller.as_int() == 64 && value.as_int() == 127)));
        assert!(events.iter().any(|(tick, kind)| *tick == 480
            && matches!(kind, TrackEventKind::Midi { message: MidiMessage::PitchBend { bend }, .. }
                if bend.0.as_int() == 0)));
    }

    #[test]
    fn track_export_expands_loops_at_absolute_positions() {
        let mut track = Track::new(1);
        let mut region = MidiRegion::new(4.0, 1.0).with_note(60, 90, 0.0, 0.5);
        region.looped = true;
        region.loop_count = 3;
        track.midi_regions.push(region);

        let bytes = track_to_smf(&track, Tempo(120.0)).unwrap();
        let ons: Vec<u64> = decode(&bytes)
            .into_iter()
            .filter(|(_, kind)| matches!(kind, TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. }))
            .map(|(tick, _)| tick)
            .collect();
        assert_eq!(ons, vec![4 * 480, 5 * 480, 6 * 480]);
    }

    #[test]
    fn invalid_tempo_is_rejected() {
        assert!(matches!(
            region_to_smf(&MidiRegion::new(0.0, 1.0), Tempo(0.0)),
            Err(SmfError::InvalidTempo(_))
        ));
    }
}
