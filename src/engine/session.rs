//! # Session Orchestrator
//!
//! Esegue le richieste del catalogo operazioni dall'inizio alla fine.
//!
//! ## Flusso di una operazione:
//! 1. `PathResolver` calcola output e file temporanei
//! 2. `InvocationBuilder` produce le invocazioni (1 o 2)
//! 3. Ogni invocazione gira nel `ProcessRunner`, una alla volta: quelle di
//!    encoding in streaming attraverso il `ProgressTracker`, le altre in capture
//! 4. Il primo fallimento interrompe l'operazione (`InvocationFailure`)
//!
//! La palette della GIF e il frame di preview del crop sono `SideFile`:
//! vengono rimossi su ogni percorso di uscita, errori e Ctrl-C compresi.

use crate::config::Config;
use crate::crop::{CropSelector, FrameInfo};
use crate::engine::path_resolver::PathResolver;
use crate::engine::progress_tracker::ProgressTracker;
use crate::error::PegError;
use crate::file_manager::SideFile;
use crate::invocation::{Invocation, InvocationBuilder};
use crate::operation::OperationRequest;
use crate::probe::MediaProbe;
use crate::progress::{sink_for, ProgressSink};
use crate::runner::{ProcessOutcome, ProcessRunner};
use crate::tool_resolver::Toolchain;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Diagnostic lines kept for an `InvocationFailure` message.
const DIAGNOSTIC_TAIL: usize = 8;

/// Runs operations for one operator session
pub struct Session {
    config: Config,
    builder: InvocationBuilder,
    runner: ProcessRunner,
    progress: Box<dyn ProgressSink>,
}

impl Session {
    pub fn new(config: Config, toolchain: Toolchain, runner: ProcessRunner) -> Self {
        let builder = InvocationBuilder::new(toolchain, config.overwrite);
        let progress = sink_for(&config);
        Self {
            config,
            builder,
            runner,
            progress,
        }
    }

    /// Replace the progress destination.
    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Probe `input` and parse the metadata.
    #[instrument(skip_all, fields(input = %input.display()))]
    pub async fn inspect(&mut self, input: &Path) -> Result<MediaProbe, PegError> {
        if !input.is_file() {
            return Err(PegError::Validation(format!("input file not found: {}", input.display())));
        }
        let invocation = self.builder.probe(input);
        let stdout = self
            .runner
            .run_capture(&invocation)
            .await
            .into_result(invocation.description())?;
        let probe = MediaProbe::parse(&stdout)?;
        debug!(
            "Probed {}: {} video / {} audio streams",
            input.display(),
            probe.video_streams.len(),
            probe.audio_streams.len()
        );
        Ok(probe)
    }

    /// Execute `request` on `input`.
    ///
    /// Returns the produced file, or `None` when there was nothing to run.
    #[instrument(skip_all, fields(operation = request.kind(), input = %input.display()))]
    pub async fn run(
        &mut self,
        request: &OperationRequest,
        input: &Path,
    ) -> Result<Option<PathBuf>, PegError> {
        if !input.is_file() {
            return Err(PegError::Validation(format!("input file not found: {}", input.display())));
        }

        let plan = PathResolver::plan(request, input, &self.config)?;
        let invocations = self.builder.build(request, input, &plan)?;
        if invocations.is_empty() {
            info!("Nothing to do for {}", input.display());
            return Ok(None);
        }

        PathResolver::ensure_parent_dirs(&plan.output).await?;
        let _palette = plan.palette.as_ref().map(SideFile::new);

        let total = invocations.len();
        for (index, invocation) in invocations.iter().enumerate() {
            self.execute(invocation, index + 1, total).await?;
        }

        info!("✅ {} -> {}", input.display(), plan.output.display());
        Ok(Some(plan.output))
    }

    /// Interactive crop: probe the frame size, optionally extract a preview
    /// frame, ask `selector` for a region, then crop.
    ///
    /// A zero-area selection is not an error: nothing is run and `None` is returned.
    #[instrument(skip_all, fields(input = %input.display()))]
    pub async fn crop(
        &mut self,
        input: &Path,
        selector: &mut dyn CropSelector,
    ) -> Result<Option<PathBuf>, PegError> {
        let probe = self.inspect(input).await?;
        let video = probe
            .primary_video()
            .ok_or_else(|| {
                PegError::Validation(format!("{} has no video stream", input.display()))
            })?;
        let (width, height) = (video.width, video.height);
        if width == 0 || height == 0 {
            return Err(PegError::Validation(format!("unknown frame size for {}", input.display())));
        }

        let region = {
            let mut preview_guard = None;
            let mut frame = FrameInfo {
                width,
                height,
                preview: None,
            };

            if selector.needs_preview() {
                let path = PathResolver::preview_path(input, &self.config);
                PathResolver::ensure_parent_dirs(&path).await?;
                let guard = SideFile::new(&path);
                let invocation = self.builder.preview_frame(input, probe.midpoint(), &path);
                self.execute(&invocation, 1, 1).await?;
                frame.preview = Some(guard.path().to_path_buf());
                preview_guard = Some(guard);
            }

            let selection = selector.select(&frame);
            drop(preview_guard);
            selection?.clamp_to(width, height)
        };

        if region.is_degenerate() {
            info!("Empty crop selection, nothing to do");
            return Ok(None);
        }
        debug!("Crop region {} inside {}x{}", region, width, height);
        self.run(&OperationRequest::Crop { region }, input).await
    }

    /// Run one invocation, reporting progress; any non-success is an error.
    async fn execute(
        &mut self,
        invocation: &Invocation,
        step: usize,
        total: usize,
    ) -> Result<(), PegError> {
        debug!("Step {}/{}: {}", step, total, invocation);
        self.progress.step_started(invocation.description(), step, total);

        let outcome = if invocation.tracks_progress() {
            self.run_tracked(invocation).await
        } else {
            match self.runner.run_capture(invocation).await {
                ProcessOutcome::Failure { exit_code, stderr } => ProcessOutcome::Failure {
                    exit_code,
                    stderr: last_lines(stderr.lines(), DIAGNOSTIC_TAIL),
                },
                outcome => outcome,
            }
        };

        self.progress.step_finished(outcome.is_success());
        if let ProcessOutcome::Failure { exit_code, .. } = &outcome {
            warn!("{} exited with {:?}", invocation.description(), exit_code);
        }
        outcome.into_result(invocation.description()).map(|_| ())
    }

    async fn run_tracked(&mut self, invocation: &Invocation) -> ProcessOutcome {
        let mut tracker = ProgressTracker::new();
        let mut diagnostics: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL);
        let progress = &mut self.progress;

        let outcome = self
            .runner
            .run_streaming(invocation, |line| {
                if let Some(fraction) = tracker.observe_line(line) {
                    progress.fraction(fraction);
                } else if !is_status_line(line) {
                    if diagnostics.len() == DIAGNOSTIC_TAIL {
                        diagnostics.pop_front();
                    }
                    diagnostics.push_back(line.trim().to_string());
                }
            })
            .await;

        // Exited (successfully or not): the bar completes, the step mark tells the outcome.
        let completed = tracker.finish();
        if !matches!(outcome, ProcessOutcome::Interrupted) {
            if let Some(fraction) = completed {
                progress.fraction(fraction);
            }
        }

        match outcome {
            ProcessOutcome::Failure { exit_code, stderr } if stderr.is_empty() => {
                ProcessOutcome::Failure {
                    exit_code,
                    stderr: last_lines(diagnostics.iter().map(String::as_str), DIAGNOSTIC_TAIL),
                }
            }
            outcome => outcome,
        }
    }
}

/// ffmpeg's periodic `frame= ... time= ...` status line.
fn is_status_line(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("frame=") || line.starts_with("size=")
}

fn last_lines<'a>(lines: impl Iterator<Item = &'a str>, count: usize) -> String {
    let lines: Vec<&str> = lines.filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
