mod common;

use std::sync::Arc;

use common::*;
use midly::{MidiMessage, Smf, Timing, TrackEventKind};
use stori_render::smf::{region_to_smf, TICKS_PER_QUARTER};
use stori_render::synth::SampleBankProvider;
use stori_render::{
    AudioRegion, BitDepth, ExportFormat, FileAssetProvider, MemoryAssets, MidiRegion, Project, RenderEngine,
    RenderServices, RenderSettings, SnapshotGraph, Tempo, Track,
};

fn tone_project() -> Arc<Project> {
    let mut track = Track::new(1);
    track.audio_regions.push(AudioRegion::new("tone", 0.0, 1.0));
    Arc::new(Project {
        tempo: Tempo(120.0),
        tracks: vec![track],
        ..Project::default()
    })
}

fn tone_assets() -> MemoryAssets {
    let tone = (0..48_000).map(|i| (i as f32 * 0.02).sin() * 0.4).collect();
    MemoryAssets::new().with("tone", stori_render::DecodedAudio::new(48_000, vec![tone]))
}

#[test]
fn wav_export_round_trips_within_quantisation() {
    let project = tone_project();
    let engine = RenderEngine::new(services(&project, TestHost::new(), tone_assets()));
    let settings = RenderSettings {
        bit_depth: BitDepth::Int24,
        ..RenderSettings::default()
    };
    let clip = engine.render(Arc::clone(&project), &settings).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mix.wav");
    let report = stori_render::render::write_export(&clip, &settings, &path).unwrap();
    assert_eq!(report.path, path);
    assert!(report.fallback.is_none());
    assert_eq!(report.frames, clip.frames() as u64);

    let mut reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 48_000);
    assert_eq!(spec.bits_per_sample, 24);
    let step = 1.0 / 0x7F_FFFF as f32;
    let decoded: Vec<i32> = reader.samples::<i32>().map(Result::unwrap).collect();
    assert_eq!(decoded.len(), clip.frames() * 2);
    for (index, code) in decoded.iter().enumerate() {
        let original = clip.sample(index % 2, index / 2);
        assert!((*code as f32 * step - original).abs() <= step);
    }
}

#[test]
fn float_flac_export_falls_back_to_wav() {
    let project = tone_project();
    let engine = RenderEngine::new(services(&project, TestHost::new(), tone_assets()));
    let settings = RenderSettings {
        format: ExportFormat::Flac,
        bit_depth: BitDepth::Float32,
        ..RenderSettings::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mix.flac");

    let report = engine.export_to_file(project, &settings, &path).unwrap();
    let fallback = report.fallback.expect("fallback notice");
    assert_eq!(fallback.intended_format, ExportFormat::Flac);
    assert_eq!(fallback.intended_path, path);
    assert_eq!(fallback.written_path, dir.path().join("mix.wav"));
    assert_eq!(report.format, ExportFormat::Wav);
    assert!(!path.exists());
    assert!(fallback.written_path.exists());
}

#[test]
fn in_memory_export_matches_file_export() {
    let project = tone_project();
    let engine = RenderEngine::new(services(&project, TestHost::new(), tone_assets()));
    let settings = RenderSettings {
        format: ExportFormat::Aiff,
        bit_depth: BitDepth::Int16,
        ..RenderSettings::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mix.aiff");

    engine.export_to_file(Arc::clone(&project), &settings, &path).unwrap();
    let bytes = engine.export_to_bytes(project, &settings).unwrap();
    assert_eq!(bytes, std::fs::read(&path).unwrap());
}

#[test]
fn midi_export_reconstructs_beat_positions() {
    let region = MidiRegion::new(0.0, 4.0)
        .with_note(60, 100, 0.0, 0.5)
        .with_note(64, 100, 1.0, 0.5)
        .with_note(67, 100, 2.5, 0.5);
    let bytes = region_to_smf(&region, Tempo(120.0)).unwrap();

    let smf = Smf::parse(&bytes).unwrap();
    let Timing::Metrical(ppq) = smf.header.timing else {
        panic!("expected metrical timing");
    };
    assert_eq!(ppq.as_int(), TICKS_PER_QUARTER);

    let mut tick = 0u32;
    let mut onsets = Vec::new();
    for event in &smf.tracks[0] {
        tick += event.delta.as_int();
        if let TrackEventKind::Midi {
            message: MidiMessage::NoteOn { .. },
            ..
        } = event.kind
        {
            onsets.push(f64::from(tick) / f64::from(ppq.as_int()));
        }
    }
    assert_eq!(onsets.len(), 3);
    for (decoded, expected) in onsets.iter().zip([0.0, 1.0, 2.5]) {
        assert!((decoded - expected).abs() <= 1.0 / 480.0);
    }
}

fn write_take(path: &std::path::Path, value: i16, frames: usize) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..frames {
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn rerecorded_take_is_heard_on_next_export() {
    let dir = tempfile::tempdir().unwrap();
    let take = dir.path().join("take.wav");
    let mut track = Track::new(1);
    track.audio_regions.push(AudioRegion::new("take.wav", 0.0, 1.0));
    let project = Arc::new(Project {
        tempo: Tempo(120.0),
        tracks: vec![track],
        ..Project::default()
    });
    let engine = RenderEngine::new(RenderServices {
        live: Arc::new(SnapshotGraph::new(Arc::clone(&project))),
        plugins: Arc::new(TestHost::new()),
        assets: Arc::new(FileAssetProvider::new(dir.path())),
        soundfonts: Arc::new(SampleBankProvider::new()),
    });
    let centre = std::f32::consts::FRAC_1_SQRT_2;

    write_take(&take, 16_384, 48_000);
    let first = engine.render(Arc::clone(&project), &RenderSettings::default()).unwrap();
    assert!((first.channel(0).unwrap()[100] - 0.5 * centre).abs() < 1e-4);

    write_take(&take, -8_192, 48_001);
    let second = engine.render(Arc::clone(&project), &RenderSettings::default()).unwrap();
    assert!((second.channel(0).unwrap()[100] + 0.25 * centre).abs() < 1e-4);
}
