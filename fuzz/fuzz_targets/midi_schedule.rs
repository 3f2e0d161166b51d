#![no_main]

use libfuzzer_sys::fuzz_target;
use stori_render::sched::schedule_regions;
use stori_render::Project;

fuzz_target!(|data: &[u8]| {
    let Ok(project) = serde_json::from_slice::<Project>(data) else {
        return;
    };
    if !project.tempo.is_valid() {
        return;
    }
    for track in &project.tracks {
        let queue = schedule_regions(&track.midi_regions, project.tempo, 48_000.0, 0);
        let events = queue.events();
        assert!(events.windows(2).all(|pair| pair[0].sample <= pair[1].sample));
    }
});
