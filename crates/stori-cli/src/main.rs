use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use stori_render::render::write_export;
use stori_render::smf;
use stori_render::{
    BitDepth, BuiltinPlugins, DitherKind, ExportFormat, FileAssetProvider, MasterSettings, Project,
    RenderEngine, RenderServices, RenderSettings, SampleBankProvider, SnapshotGraph, TrackId,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Render(args) => execute_render(args),
        Commands::Midi(args) => execute_midi(args),
    }
}

#[derive(Parser)]
#[command(author, version, about = "Offline rendering tools for Stori projects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a project to an audio file.
    Render(RenderArgs),
    /// Export a track's MIDI regions as a Standard MIDI File.
    Midi(MidiArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Path to the project description (JSON).
    #[arg(long)]
    project: PathBuf,
    /// Output audio file.
    #[arg(long)]
    output: PathBuf,
    /// Output format; inferred from the output extension when omitted.
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// Render settings (JSON); command line flags override its values.
    #[arg(long)]
    settings: Option<PathBuf>,
    #[arg(long)]
    sample_rate: Option<u32>,
    #[arg(long, value_enum)]
    bit_depth: Option<OutputDepth>,
    #[arg(long)]
    block_size: Option<usize>,
    /// Enable TPDF dithering when exporting integer formats.
    #[arg(long)]
    dither: bool,
    /// Seconds added to the expected duration before the render is abandoned.
    #[arg(long)]
    timeout_grace: Option<f64>,
    /// Transcoder used for M4A output.
    #[arg(long)]
    transcoder: Option<PathBuf>,
    /// Directory audio region assets are resolved against. Defaults to the
    /// project file's directory.
    #[arg(long)]
    assets: Option<PathBuf>,
    /// Directory of General MIDI sample banks (`<program>.wav`, `default.wav`).
    #[arg(long)]
    soundfonts: Option<PathBuf>,
    /// Master EQ and limiter settings (JSON) as heard during playback.
    #[arg(long)]
    master: Option<PathBuf>,
}

#[derive(Args)]
struct MidiArgs {
    /// Path to the project description (JSON).
    #[arg(long)]
    project: PathBuf,
    /// Track whose regions are exported.
    #[arg(long)]
    track: u64,
    /// Export only this region (by index), with region-relative timing.
    #[arg(long)]
    region: Option<usize>,
    /// Output `.mid` file.
    #[arg(long)]
    output: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Wav,
    Aiff,
    M4a,
    Flac,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Wav => ExportFormat::Wav,
            OutputFormat::Aiff => ExportFormat::Aiff,
            OutputFormat::M4a => ExportFormat::M4a,
            OutputFormat::Flac => ExportFormat::Flac,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputDepth {
    #[value(name = "16")]
    Int16,
    #[value(name = "24")]
    Int24,
    #[value(name = "32f")]
    Float32,
}

impl From<OutputDepth> for BitDepth {
    fn from(depth: OutputDepth) -> Self {
        match depth {
            OutputDepth::Int16 => BitDepth::Int16,
            OutputDepth::Int24 => BitDepth::Int24,
            OutputDepth::Float32 => BitDepth::Float32,
        }
    }
}

fn load_project(path: &Path) -> Result<Project> {
    let data = fs::read_to_string(path).with_context(|| format!("failed to read project file {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("{} is not a valid project file", path.display()))
}

fn load_master(path: Option<&Path>) -> Result<MasterSettings> {
    let Some(path) = path else {
        return Ok(MasterSettings::default());
    };
    let data = fs::read_to_string(path).with_context(|| format!("failed to read master settings {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("{} is not a valid master settings file", path.display()))
}

fn resolve_settings(args: &RenderArgs) -> Result<RenderSettings> {
    let mut settings = match &args.settings {
        Some(path) => {
            let data =
                fs::read_to_string(path).with_context(|| format!("failed to read settings {}", path.display()))?;
            serde_json::from_str(&data).with_context(|| format!("{} is not a valid settings file", path.display()))?
        }
        None => RenderSettings::default(),
    };

    settings.format = match args.format {
        Some(format) => format.into(),
        None => args
            .output
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::parse::<ExportFormat>)
            .transpose()?
            .unwrap_or(settings.format),
    };
    if let Some(sample_rate) = args.sample_rate {
        settings.sample_rate = sample_rate;
    }
    if let Some(depth) = args.bit_depth {
        settings.bit_depth = depth.into();
    }
    if let Some(block_size) = args.block_size {
        settings.block_size = block_size;
    }
    if args.dither {
        settings.dither = Some(DitherKind::Tpdf);
    }
    if let Some(grace) = args.timeout_grace {
        settings.timeout_grace = Duration::try_from_secs_f64(grace).context("invalid timeout grace")?;
    }
    if args.transcoder.is_some() {
        settings.transcoder = args.transcoder.clone();
    }
    Ok(settings)
}

fn execute_render(args: RenderArgs) -> Result<()> {
    let project = Arc::new(load_project(&args.project)?);
    let settings = resolve_settings(&args)?;
    let master = load_master(args.master.as_deref())?;

    let asset_root = args
        .assets
        .clone()
        .or_else(|| args.project.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let soundfonts = match &args.soundfonts {
        Some(dir) => SampleBankProvider::from_directory(dir)
            .with_context(|| format!("failed to load sample banks from {}", dir.display()))?,
        None => SampleBankProvider::new(),
    };

    let engine = RenderEngine::new(RenderServices {
        live: Arc::new(SnapshotGraph::new(Arc::clone(&project)).with_master(master)),
        plugins: Arc::new(BuiltinPlugins),
        assets: Arc::new(FileAssetProvider::new(asset_root)),
        soundfonts: Arc::new(soundfonts),
    });

    let job = engine.start(Arc::clone(&project), &settings)?;
    tracing::info!(
        project = %project.name,
        seconds = job.length().total_seconds(),
        "rendering"
    );
    let mut last_reported = 0.0;
    while !job.is_resolved() {
        thread::sleep(Duration::from_millis(250));
        let progress = job.progress();
        if progress.fraction - last_reported >= 0.1 {
            last_reported = progress.fraction;
            tracing::info!(
                percent = (progress.fraction * 100.0).round(),
                remaining = ?progress.remaining,
                "{}",
                progress.status
            );
        }
    }
    let clip = job.wait()?;
    let report = write_export(&clip, &settings, &args.output)?;

    println!(
        "Rendered project '{}' ({} frames at {} Hz)",
        project.name, report.frames, report.sample_rate
    );
    println!("  {}: {}", report.format, report.path.display());
    if let Some(fallback) = report.fallback {
        println!("  Note: {fallback}");
    }
    Ok(())
}

fn execute_midi(args: MidiArgs) -> Result<()> {
    let project = load_project(&args.project)?;
    let track = project
        .track(TrackId(args.track))
        .ok_or_else(|| anyhow!("project has no track {}", args.track))?;
    if track.midi_regions.is_empty() {
        bail!("track {} has no MIDI regions", args.track);
    }

    match args.region {
        Some(index) => {
            let region = track
                .midi_regions
                .get(index)
                .ok_or_else(|| anyhow!("track {} has no region {index}", args.track))?;
            let bytes = smf::region_to_smf(region, project.tempo)?;
            fs::write(&args.output, bytes).with_context(|| format!("failed to write {}", args.output.display()))?;
        }
        None => smf::export_track(track, project.tempo, &args.output)?,
    }
    println!("Wrote {}", args.output.display());
    Ok(())
}
