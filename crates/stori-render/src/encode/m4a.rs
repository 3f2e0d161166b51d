//! AAC in an MPEG-4 container, produced by an external transcoder from an
//! intermediate WAV file.

use std::ffi::OsStr;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{wav, EncodeError};
use crate::buffer::AudioClip;
use crate::config::RenderSettings;

const SEARCHED: [&str; 2] = ["afconvert", "ffmpeg"];

/// Writes `clip` as M4A at `output`.
pub(crate) fn transcode(clip: &AudioClip, settings: &RenderSettings, output: &Path) -> Result<(), EncodeError> {
    let program = match &settings.transcoder {
        Some(program) => program.clone(),
        None => find_transcoder().ok_or(EncodeError::TranscoderMissing)?,
    };

    let scratch = tempfile::tempdir().map_err(|source| EncodeError::Io {
        path: std::env::temp_dir(),
        source,
    })?;
    let intermediate = scratch.path().join("stori_export.wav");
    let file = File::create(&intermediate).map_err(|source| EncodeError::Io {
        path: intermediate.clone(),
        source,
    })?;
    wav::write(clip, settings, BufWriter::new(file))?;

    let mut command = Command::new(&program);
    if program.file_stem() == Some(OsStr::new("afconvert")) {
        command.args(["-f", "m4af", "-d", "aac"]).arg(&intermediate).arg(output);
    } else {
        command
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(&intermediate)
            .args(["-c:a", "aac"])
            .arg(output);
    }

    tracing::debug!(program = %program.display(), output = %output.display(), "running transcoder");
    let result = command.output().map_err(|source| EncodeError::TranscoderSpawn {
        program: program.clone(),
        source,
    })?;
    if !result.status.success() {
        return Err(EncodeError::Transcoder {
            program,
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_owned(),
        });
    }
    Ok(())
}

/// Transcodes into a scratch file and returns its contents.
pub(crate) fn encode(clip: &AudioClip, settings: &RenderSettings) -> Result<Vec<u8>, EncodeError> {
    let scratch = tempfile::tempdir().map_err(|source| EncodeError::Io {
        path: std::env::temp_dir(),
        source,
    })?;
    let output = scratch.path().join("stori_export.m4a");
    transcode(clip, settings, &output)?;
    std::fs::read(&output).map_err(|source| EncodeError::Io { path: output, source })
}

fn find_transcoder() -> Option<PathBuf> {
    SEARCHED.iter().find_map(|name| which::which(name).ok())
}
