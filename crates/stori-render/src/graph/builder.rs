use std::collections::HashMap;

use super::arena::{PluginArena, PluginSlot};
use super::player::{schedule_region, RegionPlayer};
use super::strip::{eq_from_settings, BusStrip, MasterChain, SendRoute, TrackStrip};
use super::OfflineGraph;
use crate::automation::AutomationParameter;
use crate::buffer::BufferConfig;
use crate::error::{PluginOwner, RenderError};
use crate::pdc::DelayCompensation;
use crate::plugin::{LivePlugin, PluginHost};
use crate::project::{BusId, Project, Track, TrackId};
use crate::render::RenderServices;
use crate::sched::schedule_regions;
use crate::synth::InstrumentBackend;

/// Tracks that take part in the mix: enabled, not frozen, audible.
pub fn rendered_tracks(project: &Project) -> Vec<TrackId> {
    let any_solo = project.any_solo();
    project
        .renderable_tracks()
        .filter(|track| track.is_audible(any_solo))
        .map(|track| track.id)
        .collect()
}

fn clone_chain(
    owner: PluginOwner,
    chain: &[LivePlugin],
    host: &dyn PluginHost,
    config: &BufferConfig,
    arena: &mut PluginArena,
) -> Result<Vec<PluginSlot>, RenderError> {
    chain
        .iter()
        .filter(|plugin| plugin.is_active())
        .map(|plugin| {
            let processor = host
                .instantiate(plugin, config)
                .map_err(|source| RenderError::PluginClone {
                    owner,
                    plugin: plugin.id,
                    source,
                })?;
            Ok(arena.insert(processor))
        })
        .collect()
}

fn needs_eq(track: &Track) -> bool {
    track.mixer.eq.enabled
        || [
            AutomationParameter::EqLow,
            AutomationParameter::EqMid,
            AutomationParameter::EqHigh,
        ]
        .into_iter()
        .any(|parameter| track.automation_for(parameter).is_some())
}

/// Builds the offline graph for `project`. Buses are built before tracks so
/// sends can resolve them; any plugin clone failure aborts the build.
pub fn build_graph(
    project: &Project,
    services: &RenderServices,
    config: &BufferConfig,
    pdc: &DelayCompensation,
) -> Result<OfflineGraph, RenderError> {
    let sample_rate = config.sample_rate;
    let mut arena = PluginArena::new();

    let mut buses = Vec::with_capacity(project.buses.len());
    let mut bus_index: HashMap<BusId, usize> = HashMap::new();
    for bus in &project.buses {
        let chain = clone_chain(
            PluginOwner::Bus(bus.id),
            &services.live.bus_plugin_chain(bus.id),
            services.plugins.as_ref(),
            config,
            &mut arena,
        )?;
        bus_index.insert(bus.id, buses.len());
        buses.push(BusStrip::new(bus.id, config.block_size, bus.volume, chain));
    }

    let mut tracks = Vec::new();
    for id in rendered_tracks(project) {
        let Some(track) = project.track(id) else {
            continue;
        };

        let chain = clone_chain(
            PluginOwner::Track(id),
            &services.live.plugin_chain(id),
            services.plugins.as_ref(),
            config,
            &mut arena,
        )?;

        let delay_seconds = pdc.offset_seconds(id, sample_rate);
        let mut segments = Vec::new();
        for region in &track.audio_regions {
            let audio = services
                .assets
                .load(&region.asset)
                .map_err(|source| RenderError::Asset {
                    asset: region.asset.clone(),
                    source,
                })?;
            segments.extend(schedule_region(
                region,
                audio,
                project.tempo,
                sample_rate,
                delay_seconds,
            ));
        }

        let instrument = if track.has_midi() {
            let queue = schedule_regions(
                &track.midi_regions,
                project.tempo,
                sample_rate,
                pdc.offset_samples(id) as u64,
            );
            let backend =
                InstrumentBackend::for_track(track, queue, config, services.soundfonts.as_ref())
                    .map_err(|source| RenderError::Instrument { track: id, source })?;
            Some(backend)
        } else {
            None
        };

        let sends = services
            .live
            .track_sends(id)
            .unwrap_or_else(|| track.sends.clone())
            .into_iter()
            .filter(|send| !send.muted)
            .filter_map(|send| match bus_index.get(&send.bus) {
                Some(index) => Some(SendRoute {
                    bus: send.bus,
                    bus_index: *index,
                    level: send.level.clamp(0.0, 1.0),
                    pre_fader: send.pre_fader,
                }),
                None => {
                    tracing::warn!(track = %id, bus = %send.bus, "send targets a missing bus");
                    None
                }
            })
            .collect();

        let eq = needs_eq(track).then(|| eq_from_settings(sample_rate, &track.mixer.eq));

        tracks.push(TrackStrip::new(
            id,
            sample_rate,
            config.block_size,
            track.mixer.volume,
            track.mixer.pan,
            RegionPlayer::new(segments),
            instrument,
            chain,
            eq,
            sends,
        ));
    }

    let master = MasterChain::new(sample_rate, &services.live.master_settings());
    tracing::info!(
        tracks = tracks.len(),
        buses = buses.len(),
        plugins = arena.len(),
        "offline graph built"
    );
    Ok(OfflineGraph::new(config.clone(), arena, buses, tracks, master))
}
