use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use stori_render::synth::SampleBankProvider;
use stori_render::{
    BuiltinPlugins, MemoryAssets, MidiRegion, Project, RenderEngine, RenderServices, RenderSettings, SnapshotGraph,
    Tempo, Track,
};

fn synth_project(tracks: u64) -> Arc<Project> {
    let tracks = (0..tracks)
        .map(|id| {
            let mut track = Track::new(id);
            let mut region = MidiRegion::new(0.0, 8.0);
            for step in 0..16 {
                region = region.with_note(48 + (id % 24) as u8, 96, step as f64 * 0.5, 0.4);
            }
            track.midi_regions.push(region);
            track.mixer.volume = 0.05;
            track
        })
        .collect();
    Arc::new(Project {
        tempo: Tempo(120.0),
        tracks,
        ..Project::default()
    })
}

fn offline_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    group.measurement_time(Duration::from_secs(15));
    group.sample_size(10);

    group.bench_function("48_synth_tracks_4s_48k", |b| {
        let project = synth_project(48);
        let engine = RenderEngine::new(RenderServices {
            live: Arc::new(SnapshotGraph::new(Arc::clone(&project))),
            plugins: Arc::new(BuiltinPlugins),
            assets: Arc::new(MemoryAssets::new()),
            soundfonts: Arc::new(SampleBankProvider::new()),
        });
        let settings = RenderSettings::default();

        b.iter(|| {
            engine
                .render(Arc::clone(&project), &settings)
                .expect("render");
        });
    });

    group.finish();
}

criterion_group!(benches, offline_render);
criterion_main!(benches);
