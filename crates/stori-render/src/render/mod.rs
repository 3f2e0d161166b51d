//! Export sessions: graph construction, the capture thread, its watchdog and
//! the final encode.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

mod capture;
mod progress;
mod settle;

pub use capture::{run_capture, CapturePlan};
pub use progress::{estimate_remaining, ProgressSnapshot, RenderProgress};
pub use settle::{settle_once, Settler};

use crate::automation::AutomationSampler;
use crate::buffer::AudioClip;
use crate::config::{ExportFormat, RenderSettings};
use crate::duration::{self, RenderLength};
use crate::encode::{self, FormatFallback};
use crate::error::RenderError;
use crate::graph::{build_graph, rendered_tracks};
use crate::live::LiveGraph;
use crate::media::AssetProvider;
use crate::pdc::DelayCompensation;
use crate::plugin::PluginHost;
use crate::project::Project;
use crate::synth::SoundFontProvider;

/// Collaborators injected into every render session.
#[derive(Clone)]
pub struct RenderServices {
    pub live: Arc<dyn LiveGraph>,
    pub plugins: Arc<dyn PluginHost>,
    pub assets: Arc<dyn AssetProvider>,
    pub soundfonts: Arc<dyn SoundFontProvider>,
}

/// Raises the cancellation flag of a running export.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases per-session asset state and clears the engine's busy flag once
/// the session's graph is dropped.
struct SessionGuard {
    busy: Arc<AtomicBool>,
    assets: Arc<dyn AssetProvider>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.assets.end_session();
        self.busy.store(false, Ordering::Release);
    }
}

/// Handle onto a running export.
pub struct RenderJob {
    receiver: Receiver<Result<AudioClip, RenderError>>,
    cancel: CancelHandle,
    progress: Arc<RenderProgress>,
    length: RenderLength,
    deadline: Duration,
    render_thread: Option<JoinHandle<()>>,
}

impl RenderJob {
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn length(&self) -> RenderLength {
        self.length
    }

    /// Watchdog deadline: expected duration plus the configured grace.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// True once the outcome is available; `wait` will not block.
    pub fn is_resolved(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Blocks until the session resolves: the rendered audio, or
    /// `Cancelled` / `Timeout` / a processing failure.
    pub fn wait(mut self) -> Result<AudioClip, RenderError> {
        let result = self.receiver.recv().unwrap_or(Err(RenderError::Disconnected));
        if !matches!(result, Err(RenderError::Timeout { .. })) {
            if let Some(handle) = self.render_thread.take() {
                let _ = handle.join();
            }
        }
        result
    }
}

/// Outcome of a file export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub frames: u64,
    pub sample_rate: u32,
    pub fallback: Option<FormatFallback>,
}

/// Offline renderer. At most one session runs at a time.
pub struct RenderEngine {
    services: RenderServices,
    busy: Arc<AtomicBool>,
}

impl RenderEngine {
    pub fn new(services: RenderServices) -> Self {
        Self {
            services,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn services(&self) -> &RenderServices {
        &self.services
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Builds the offline graph and starts the capture thread.
    pub fn start(&self, project: Arc<Project>, settings: &RenderSettings) -> Result<RenderJob, RenderError> {
        settings.validate()?;
        if !project.tempo.is_valid() {
            return Err(RenderError::InvalidProject(format!(
                "tempo must be positive, got {}",
                project.tempo.beats_per_minute()
            )));
        }
        if !project.has_regions() {
            return Err(RenderError::EmptyProject);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RenderError::SessionBusy);
        }
        let guard = SessionGuard {
            busy: Arc::clone(&self.busy),
            assets: Arc::clone(&self.services.assets),
        };

        let progress = Arc::new(RenderProgress::new("Preparing"));
        let config = settings.buffer_config();
        let live = self.services.live.as_ref();
        let length = duration::estimate(&project, live);
        let deadline = Duration::try_from_secs_f64(length.total_seconds())
            .ok()
            .and_then(|length| length.checked_add(settings.timeout_grace))
            .ok_or_else(|| {
                RenderError::InvalidProject(format!(
                    "render length of {} s is out of range",
                    length.total_seconds()
                ))
            })?;
        let tracks = rendered_tracks(&project);

        let compensated: Vec<_> = project.renderable_tracks().map(|track| track.id).collect();
        let pdc = DelayCompensation::from_live(live, &compensated);
        if pdc.max_latency() > 0 {
            tracing::info!(max_latency = pdc.max_latency(), "delay compensation applied");
        }

        progress.set_status("Building graph");
        let mut graph = build_graph(&project, &self.services, &config, &pdc)?;
        let automation = AutomationSampler::for_tracks(&project, &tracks, config.sample_rate);

        let plan = CapturePlan {
            target_frames: length.total_frames(config.sample_rate),
            drain_frames: (settings.drain_buffers * settings.block_size) as u64,
        };

        let (settler, receiver) = settle_once::<Result<AudioClip, RenderError>>();
        let cancel = CancelHandle(Arc::new(AtomicBool::new(false)));
        let (done_tx, done_rx) = bounded::<()>(1);

        tracing::info!(
            target_frames = plan.target_frames,
            drain_frames = plan.drain_frames,
            sample_rate = settings.sample_rate,
            "render started"
        );
        progress.set_status("Rendering");

        let render_thread = {
            let settler = settler.clone();
            let cancel = cancel.clone();
            let progress = Arc::clone(&progress);
            thread::Builder::new()
                .name("stori-render".into())
                .spawn(move || {
                    let result = run_capture(&mut graph, &automation, plan, &cancel.0, &progress);
                    drop(graph);
                    drop(guard);
                    let status = match &result {
                        Ok(_) => "Done",
                        Err(RenderError::Cancelled) => "Cancelled",
                        Err(_) => "Failed",
                    };
                    let outcome = match &result {
                        Ok(clip) => format!("completed {} frames", clip.frames()),
                        Err(err) => err.to_string(),
                    };
                    if settler.settle(result) {
                        progress.finish(status);
                        tracing::info!(outcome = %outcome, "render resolved");
                    }
                    let _ = done_tx.send(());
                })
                .map_err(|source| RenderError::Io {
                    path: PathBuf::from("<render thread>"),
                    source,
                })?
        };

        {
            let cancel = cancel.clone();
            let progress = Arc::clone(&progress);
            thread::Builder::new()
                .name("stori-render-watchdog".into())
                .spawn(move || {
                    if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(deadline) {
                        if settler.settle(Err(RenderError::Timeout { after: deadline })) {
                            cancel.cancel();
                            progress.finish("Timed out");
                            tracing::error!(after = ?deadline, "render timed out");
                        }
                    }
                })
                .map_err(|source| RenderError::Io {
                    path: PathBuf::from("<render watchdog>"),
                    source,
                })?;
        }

        Ok(RenderJob {
            receiver,
            cancel,
            progress,
            length,
            deadline,
            render_thread: Some(render_thread),
        })
    }

    /// Renders to memory and waits for the result.
    pub fn render(&self, project: Arc<Project>, settings: &RenderSettings) -> Result<AudioClip, RenderError> {
        self.start(project, settings)?.wait()
    }

    /// Renders and encodes to `path` in `settings.format`.
    pub fn export_to_file(
        &self,
        project: Arc<Project>,
        settings: &RenderSettings,
        path: &Path,
    ) -> Result<ExportReport, RenderError> {
        let clip = self.render(project, settings)?;
        write_export(&clip, settings, path)
    }

    /// Renders and encodes in memory without touching the file system.
    pub fn export_to_bytes(&self, project: Arc<Project>, settings: &RenderSettings) -> Result<Vec<u8>, RenderError> {
        let clip = self.render(project, settings)?;
        Ok(encode::encode_to_bytes(&clip, settings)?.bytes)
    }
}

/// Encodes a finished render to `path`.
pub fn write_export(clip: &AudioClip, settings: &RenderSettings, path: &Path) -> Result<ExportReport, RenderError> {
    let written = encode::write_file(clip, settings, path)?;
    tracing::info!(
        path = %written.path.display(),
        format = %written.format,
        frames = clip.frames(),
        "export written"
    );
    Ok(ExportReport {
        path: written.path,
        format: written.format,
        frames: clip.frames() as u64,
        sample_rate: settings.sample_rate,
        fallback: written.fallback,
    })
}
