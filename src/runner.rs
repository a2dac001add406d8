//! # Process Runner Module
//!
//! Esegue le invocazioni come processi figli, uno alla volta.
//!
//! ## Modalità:
//! - `run_capture`: attende la fine del processo e restituisce stdout (o exit code + stderr)
//! - `run_streaming`: legge stdout e stderr riga per riga mentre il processo gira
//!   e invoca la callback per ogni riga, poi attende l'uscita
//!
//! ## Dettagli:
//! - Le righe sono separate sia da `\n` che da `\r`: ffmpeg riscrive la riga di
//!   stato (`frame= ... time=...`) con `\r`, senza mai andare a capo
//! - Il canale tra lettori e callback ha capacità 1: nessun buffering oltre una riga
//! - Un'interruzione dell'operatore (Ctrl-C) uccide il processo figlio in esecuzione
//! - Gli errori del processo non vengono mai propagati come `Err`: il chiamante
//!   riceve sempre un `ProcessOutcome` da controllare

use crate::error::PegError;
use crate::invocation::Invocation;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Terminal result of one child-process run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Exit code zero, with captured stdout (empty in streaming mode)
    Success(String),
    /// Non-zero exit, or the process could not be started
    Failure { exit_code: Option<i32>, stderr: String },
    /// Killed after an operator interrupt
    Interrupted,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Success(_))
    }

    /// Stdout on success, otherwise the matching error kind.
    pub fn into_result(self, description: &str) -> Result<String, PegError> {
        match self {
            ProcessOutcome::Success(stdout) => Ok(stdout),
            ProcessOutcome::Failure { exit_code, stderr } => Err(PegError::InvocationFailure {
                description: description.to_string(),
                exit_code,
                stderr,
            }),
            ProcessOutcome::Interrupted => Err(PegError::Interrupted),
        }
    }
}

/// Shared flag raised when the operator interrupts the session.
#[derive(Clone)]
pub struct InterruptHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn interrupt(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Raise the flag on every Ctrl-C for the rest of the process lifetime.
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                info!("Received interrupt, stopping current operation");
                handle.interrupt();
            }
        })
    }
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once the interrupt flag is raised.
async fn interrupted(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Forward `reader` to `tx` one line at a time, splitting on `\n` and `\r`.
async fn pump_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        let (consumed, complete, eof) = match reader.fill_buf().await {
            Ok([]) => (0, false, true),
            Ok(available) => match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => {
                    line.extend_from_slice(&available[..pos]);
                    (pos + 1, true, false)
                }
                None => {
                    line.extend_from_slice(available);
                    (available.len(), false, false)
                }
            },
            Err(e) => {
                debug!("Output stream closed with error: {}", e);
                (0, false, true)
            }
        };
        reader.consume(consumed);

        if (complete || eof) && !line.is_empty() {
            let text = String::from_utf8_lossy(&line).into_owned();
            line.clear();
            if tx.send(text).await.is_err() {
                return;
            }
        }
        if eof {
            return;
        }
    }
}

/// Runs invocations as child processes
#[derive(Clone, Default)]
pub struct ProcessRunner {
    interrupt: InterruptHandle,
}

impl ProcessRunner {
    pub fn new(interrupt: InterruptHandle) -> Self {
        Self { interrupt }
    }

    pub fn interrupt_handle(&self) -> &InterruptHandle {
        &self.interrupt
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_failure(invocation: &Invocation, err: std::io::Error) -> ProcessOutcome {
        warn!("Failed to start {}: {}", invocation.program().display(), err);
        ProcessOutcome::Failure {
            exit_code: None,
            stderr: format!("failed to start {}: {}", invocation.program().display(), err),
        }
    }

    /// Run to completion and capture the output.
    pub async fn run_capture(&self, invocation: &Invocation) -> ProcessOutcome {
        debug!("Running: {}", invocation);
        let mut interrupt = self.interrupt.subscribe();
        if *interrupt.borrow_and_update() {
            return ProcessOutcome::Interrupted;
        }

        let child = match Self::command(invocation).spawn() {
            Ok(child) => child,
            Err(e) => return Self::spawn_failure(invocation, e),
        };

        tokio::select! {
            output = child.wait_with_output() => match output {
                Ok(output) if output.status.success() => {
                    ProcessOutcome::Success(String::from_utf8_lossy(&output.stdout).into_owned())
                }
                Ok(output) => ProcessOutcome::Failure {
                    exit_code: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                },
                Err(e) => ProcessOutcome::Failure { exit_code: None, stderr: e.to_string() },
            },
            // il future di wait_with_output viene droppato: kill_on_drop termina il figlio
            _ = interrupted(&mut interrupt) => {
                warn!("Interrupted: {}", invocation.description());
                ProcessOutcome::Interrupted
            }
        }
    }

    /// Run while handing every output line (stdout and stderr) to `on_line`.
    pub async fn run_streaming<F>(&self, invocation: &Invocation, mut on_line: F) -> ProcessOutcome
    where
        F: FnMut(&str),
    {
        debug!("Running (streaming): {}", invocation);
        let mut interrupt = self.interrupt.subscribe();
        if *interrupt.borrow_and_update() {
            return ProcessOutcome::Interrupted;
        }

        let mut child = match Self::command(invocation).spawn() {
            Ok(child) => child,
            Err(e) => return Self::spawn_failure(invocation, e),
        };

        let (tx, mut lines) = mpsc::channel::<String>(1);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(stderr, tx.clone()));
        }
        drop(tx);

        loop {
            tokio::select! {
                line = lines.recv() => match line {
                    Some(line) => on_line(&line),
                    None => break,
                },
                _ = interrupted(&mut interrupt) => {
                    warn!("Interrupted: {}", invocation.description());
                    let _ = child.kill().await;
                    return ProcessOutcome::Interrupted;
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = interrupted(&mut interrupt) => None,
        };
        let Some(status) = status else {
            let _ = child.kill().await;
            return ProcessOutcome::Interrupted;
        };

        match status {
            Ok(status) if status.success() => ProcessOutcome::Success(String::new()),
            Ok(status) => ProcessOutcome::Failure {
                exit_code: status.code(),
                stderr: String::new(),
            },
            Err(e) => ProcessOutcome::Failure { exit_code: None, stderr: e.to_string() },
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> Invocation {
        Invocation::new(PathBuf::from("sh"), crate::args!["-c", script], "test script")
    }

    #[tokio::test]
    async fn test_capture_success() {
        let outcome = ProcessRunner::default().run_capture(&sh("printf '{\"format\":{}}'")).await;
        assert_eq!(outcome, ProcessOutcome::Success("{\"format\":{}}".to_string()));
    }

    #[tokio::test]
    async fn test_capture_failure_keeps_stderr() {
        let outcome = ProcessRunner::default().run_capture(&sh("echo boom >&2; exit 3")).await;
        assert_eq!(
            outcome,
            ProcessOutcome::Failure { exit_code: Some(3), stderr: "boom\n".to_string() }
        );
        let err = outcome.into_result("Probing").unwrap_err();
        assert!(matches!(err, PegError::InvocationFailure { exit_code: Some(3), .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_failure_value() {
        let inv = Invocation::new(PathBuf::from("/nonexistent/ffprobe-xyz"), Vec::new(), "ffprobe");
        let outcome = ProcessRunner::default().run_capture(&inv).await;
        assert!(matches!(outcome, ProcessOutcome::Failure { exit_code: None, .. }));
        let outcome = ProcessRunner::default().run_streaming(&inv, |_| {}).await;
        assert!(matches!(outcome, ProcessOutcome::Failure { exit_code: None, .. }));
    }

    #[tokio::test]
    async fn test_streaming_splits_on_carriage_returns() {
        let mut lines = Vec::new();
        let script = sh("printf 'first\\rsecond\\r\\nthird\\nlast' >&2");
        let outcome = ProcessRunner::default()
            .run_streaming(&script, |l| lines.push(l.to_string()))
            .await;
        assert_eq!(outcome, ProcessOutcome::Success(String::new()));
        assert_eq!(lines, vec!["first", "second", "third", "last"]);
    }

    #[tokio::test]
    async fn test_streaming_merges_both_streams() {
        let mut lines = Vec::new();
        let script = sh("echo to-stdout; echo to-stderr >&2; exit 2");
        let outcome = ProcessRunner::default()
            .run_streaming(&script, |l| lines.push(l.to_string()))
            .await;
        assert_eq!(outcome, ProcessOutcome::Failure { exit_code: Some(2), stderr: String::new() });
        lines.sort();
        assert_eq!(lines, vec!["to-stderr", "to-stdout"]);
    }

    #[tokio::test]
    async fn test_interrupt_kills_child() {
        let handle = InterruptHandle::new();
        let runner = ProcessRunner::new(handle.clone());

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.interrupt();
        });

        let started = Instant::now();
        let outcome = runner.run_streaming(&sh("echo started >&2; exec sleep 30"), |_| {}).await;
        assert_eq!(outcome, ProcessOutcome::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(handle.is_interrupted());

        let outcome = runner.run_capture(&sh("echo never")).await;
        assert_eq!(outcome, ProcessOutcome::Interrupted);
        assert!(matches!(outcome.into_result("x"), Err(PegError::Interrupted)));
    }

    #[tokio::test]
    async fn test_pump_lines_from_reader() {
        let (tx, mut rx) = mpsc::channel(1);
        let data: &[u8] =
            b"Duration: 00:00:10.00, start\n\rframe=1 time=00:00:01.00\rframe=2 time=00:00:02.00";
        tokio::spawn(pump_lines(data, tx));

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(
            lines,
            vec![
                "Duration: 00:00:10.00, start",
                "frame=1 time=00:00:01.00",
                "frame=2 time=00:00:02.00"
            ]
        );
    }
}
