#![no_main]

use libfuzzer_sys::fuzz_target;
use stori_render::smf::{region_to_smf, track_to_smf};
use stori_render::Project;

fuzz_target!(|data: &[u8]| {
    let Ok(project) = serde_json::from_slice::<Project>(data) else {
        return;
    };
    for track in &project.tracks {
        let _ = track_to_smf(track, project.tempo);
        for region in &track.midi_regions {
            let _ = region_to_smf(region, project.tempo);
        }
    }
});
