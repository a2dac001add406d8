//! # Batch Conversion Module
//!
//! Converte tutti i video di una directory, un file alla volta.
//!
//! ## Responsabilità:
//! - Esecuzione sequenziale (un solo encoder attivo, nessuna contesa di risorse)
//! - Isolamento dei fallimenti: un `InvocationFailure` viene registrato e si
//!   prosegue col file successivo
//! - Un'interruzione dell'operatore (Ctrl-C) ferma l'intero batch
//! - Riepilogo finale (`BatchSummary`) con esito per file

use crate::engine::session::Session;
use crate::error::PegError;
use crate::json_output::JsonMessage;
use crate::operation::OperationRequest;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Outcome for one input file
#[derive(Debug)]
pub struct BatchEntry {
    pub input: PathBuf,
    pub result: Result<PathBuf, PegError>,
}

/// Outcome of a whole batch, in input order
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub entries: Vec<BatchEntry>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().ok().cloned())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.result.is_err())
    }

    pub fn converted_count(&self) -> usize {
        self.entries.len() - self.failed_count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Converted: {} | Failed: {} | Time: {:.1}s",
            self.entries.len(),
            self.converted_count(),
            self.failed_count(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Drives one batch request over a list of files
pub struct BatchRunner<'a> {
    session: &'a mut Session,
}

impl<'a> BatchRunner<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// Convert every file in `inputs`.
    ///
    /// Only fatal errors (interrupt, missing tool) abort the batch.
    pub async fn run(
        &mut self,
        request: &OperationRequest,
        inputs: &[PathBuf],
    ) -> Result<BatchSummary, PegError> {
        if !matches!(request, OperationRequest::BatchConvert { .. }) {
            return Err(PegError::Validation(format!(
                "{} is not a batch operation",
                request.kind()
            )));
        }

        let started = Instant::now();
        let total = inputs.len();
        let json = self.session.config().json_output;
        let mut summary = BatchSummary::default();
        info!("🚀 Batch conversion of {} files", total);

        for (index, input) in inputs.iter().enumerate() {
            info!("[{}/{}] {}", index + 1, total, input.display());

            let result = self.session.run(request, input).await.and_then(|output| {
                output.ok_or_else(|| {
                    PegError::Validation(format!("no output produced for {}", input.display()))
                })
            });

            let result = match result {
                Err(e) if e.is_fatal() => {
                    error!("Batch stopped at {}: {}", input.display(), e);
                    return Err(e);
                }
                other => other,
            };
            match &result {
                Err(e) => error!("❌ {}: {}", input.display(), e),
                Ok(output) => info!("✅ {} -> {}", input.display(), output.display()),
            }

            if json {
                JsonMessage::batch_item(input.clone(), index + 1, total, &result).emit();
            }
            summary.entries.push(BatchEntry {
                input: input.clone(),
                result,
            });
        }

        summary.elapsed = started.elapsed();
        info!("{}", summary.format_summary());
        Ok(summary)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::engine::session::tests::{session_with, FFMPEG_OK};
    use crate::operation::{BatchFormat, ContainerFormat};
    use crate::runner::InterruptHandle;
    use tempfile::TempDir;

    fn inputs(dir: &std::path::Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"video").unwrap();
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failure_of_one_file_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = r#"for last; do :; done
case "$*" in
  *second.mkv*) echo 'second.mkv: moov atom not found' >&2; exit 1 ;;
esac
: > "$last"
"#;
        let (mut session, _) = session_with(dir.path(), ffmpeg);
        let files = inputs(dir.path(), &["first.mkv", "second.mkv", "third.mkv"]);
        let request = OperationRequest::batch(BatchFormat::Container(ContainerFormat::Mp4), None);

        let summary = BatchRunner::new(&mut session).run(&request, &files).await.unwrap();

        let out = dir.path().join("out");
        assert!(out.join("first_batch.mp4").exists());
        assert!(!out.join("second_batch.mp4").exists());
        assert!(out.join("third_batch.mp4").exists());

        assert_eq!(summary.converted_count(), 2);
        let failures: Vec<&BatchEntry> = summary.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].input, files[1]);
        assert!(matches!(failures[0].result, Err(PegError::InvocationFailure { .. })));
    }

    #[tokio::test]
    async fn test_gif_batch_uses_per_file_palettes() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session_with(dir.path(), FFMPEG_OK);
        let files = inputs(dir.path(), &["a.mp4", "b.webm"]);
        let request = OperationRequest::batch(BatchFormat::Gif, None);

        let summary = BatchRunner::new(&mut session).run(&request, &files).await.unwrap();
        assert_eq!(summary.failed_count(), 0);

        let out = dir.path().join("out");
        assert_eq!(summary.outputs(), vec![out.join("a_batch.gif"), out.join("b_batch.gif")]);
        assert!(!out.join("palette_a.png").exists());
        assert!(!out.join("palette_b.png").exists());
    }

    #[tokio::test]
    async fn test_interrupt_aborts_batch() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session_with(dir.path(), FFMPEG_OK);
        let interrupt: InterruptHandle = session.runner().interrupt_handle().clone();
        interrupt.interrupt();

        let files = inputs(dir.path(), &["a.mkv", "b.mkv"]);
        let request = OperationRequest::batch(BatchFormat::Container(ContainerFormat::Mkv), None);
        let err = BatchRunner::new(&mut session).run(&request, &files).await.unwrap_err();
        assert!(matches!(err, PegError::Interrupted));
    }

    #[tokio::test]
    async fn test_rejects_single_file_requests() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session_with(dir.path(), FFMPEG_OK);
        let err = BatchRunner::new(&mut session)
            .run(&OperationRequest::RemoveAudio, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PegError::Validation(_)));
    }

    #[test]
    fn test_summary_format() {
        let summary = BatchSummary {
            entries: vec![
                BatchEntry { input: "a.mp4".into(), result: Ok("a_batch.mkv".into()) },
                BatchEntry { input: "b.mp4".into(), result: Err(PegError::Interrupted) },
            ],
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(
            summary.format_summary(),
            "Processed: 2 files | Converted: 1 | Failed: 1 | Time: 1.5s"
        );
    }
}
