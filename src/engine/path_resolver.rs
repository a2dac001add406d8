//! # Path Resolution Module
//!
//! Centralizza tutta la logica di calcolo dei path di output e dei file temporanei.
//! Il nome di output è derivato in modo deterministico da stem + suffisso
//! dell'operazione + estensione. Le collisioni non vengono risolte: un file
//! esistente viene sovrascritto da ffmpeg (o l'operazione fallisce con `overwrite = false`).

use crate::config::Config;
use crate::error::PegError;
use crate::operation::{BatchFormat, OperationRequest};
use crate::utils::{dotted_extension, file_stem};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where an operation writes: final output plus the optional palette side file.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPlan {
    pub output: PathBuf,
    pub palette: Option<PathBuf>,
}

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Output file name for `request` applied to `input`
    pub fn output_file_name(request: &OperationRequest, input: &Path) -> Result<String, PegError> {
        let stem = file_stem(input);
        let ext = dotted_extension(input);

        let name = match request {
            OperationRequest::InspectFile => {
                return Err(PegError::Validation("inspection produces no output file".to_string()))
            }
            OperationRequest::ConvertLossless { format } => {
                format!("{}_lossless.{}", stem, format.extension())
            }
            OperationRequest::ConvertLossy { crf } => format!("{}_crf{}.mp4", stem, crf.value()),
            OperationRequest::Trim { .. } => format!("{}_trimmed{}", stem, ext),
            OperationRequest::ExtractAudio { codec } => {
                format!("{}_audio.{}", stem, codec.extension())
            }
            OperationRequest::RemoveAudio => format!("{}_no_audio{}", stem, ext),
            OperationRequest::ToGif { .. } => format!("{}.gif", stem),
            OperationRequest::Crop { .. } => format!("{}_cropped{}", stem, ext),
            OperationRequest::BatchConvert { format, .. } => format!("{}_batch.{}", stem, format),
        };
        Ok(name)
    }

    /// Directory outputs land in: the configured one, else the input's own
    pub fn output_dir(input: &Path, config: &Config) -> PathBuf {
        if let Some(ref dir) = config.output_dir {
            return dir.clone();
        }
        match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Full plan for `request` on `input`
    pub fn plan(
        request: &OperationRequest,
        input: &Path,
        config: &Config,
    ) -> Result<OutputPlan, PegError> {
        let dir = Self::output_dir(input, config);
        let output = dir.join(Self::output_file_name(request, input)?);

        let needs_palette = matches!(
            request,
            OperationRequest::ToGif { .. }
                | OperationRequest::BatchConvert { format: BatchFormat::Gif, .. }
        );
        let palette = needs_palette.then(|| Self::palette_path(input, &dir));

        debug!("Resolved output path: {} -> {}", input.display(), output.display());
        Ok(OutputPlan { output, palette })
    }

    /// Per-input palette, so batch items never share one
    pub fn palette_path(input: &Path, dir: &Path) -> PathBuf {
        dir.join(format!("palette_{}.png", file_stem(input)))
    }

    /// Still frame used by crop selectors
    pub fn preview_path(input: &Path, config: &Config) -> PathBuf {
        Self::output_dir(input, config).join(format!("preview_{}.jpg", file_stem(input)))
    }

    /// Crea le directory parent se necessario
    pub async fn ensure_parent_dirs(path: &Path) -> Result<(), PegError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }
}
