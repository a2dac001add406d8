//! # Progress Reporting Module
//!
//! Questo modulo mostra all'operatore l'avanzamento di ogni invocazione.
//!
//! ## Responsabilità:
//! - Trait `ProgressSink`: destinazione degli aggiornamenti (terminale, JSON, test)
//! - Spinner `indicatif` finché la durata del media non è nota
//! - Barra percentuale appena arriva la prima frazione
//! - Eventi JSON su stdout quando `json_output` è attivo
//!
//! ## Visual feedback:
//! ```text
//! ⠋ Generating color palette
//! ⠙ [00:00:04] [████████████████████>-------------------]  52% Encoding with CRF 23
//! ✅ Encoding with CRF 23
//! ```

use crate::config::Config;
use crate::json_output::JsonMessage;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
const BAR_LENGTH: u64 = 100;

/// Receives progress updates for one step at a time.
pub trait ProgressSink: Send {
    /// A new invocation starts. `step` is 1-based.
    fn step_started(&mut self, description: &str, step: usize, total_steps: usize);

    /// Completion fraction in [0, 1] for the current step.
    fn fraction(&mut self, fraction: f64);

    fn step_finished(&mut self, success: bool);
}

/// Pick the sink matching the output mode.
pub fn sink_for(config: &Config) -> Box<dyn ProgressSink> {
    if config.json_output {
        Box::new(JsonProgress::default())
    } else {
        Box::new(TerminalProgress::new())
    }
}

/// Terminal spinner/bar backed by `indicatif`
#[derive(Default)]
pub struct TerminalProgress {
    bar: Option<ProgressBar>,
    description: String,
    determinate: bool,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    fn switch_to_bar(bar: &ProgressBar) {
        bar.set_length(BAR_LENGTH);
        if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=>-"));
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn step_started(&mut self, description: &str, step: usize, total_steps: usize) {
        if let Some(previous) = self.bar.take() {
            previous.finish_and_clear();
        }
        self.description = if total_steps > 1 {
            format!("[{}/{}] {}", step, total_steps, description)
        } else {
            description.to_string()
        };
        self.determinate = false;
        self.bar = Some(Self::spinner(&self.description));
    }

    fn fraction(&mut self, fraction: f64) {
        let Some(bar) = self.bar.as_ref() else {
            return;
        };
        if !self.determinate {
            Self::switch_to_bar(bar);
            self.determinate = true;
        }
        bar.set_position((fraction.clamp(0.0, 1.0) * BAR_LENGTH as f64).round() as u64);
    }

    fn step_finished(&mut self, success: bool) {
        if let Some(bar) = self.bar.take() {
            let mark = if success { "✅" } else { "❌" };
            bar.finish_with_message(format!("{} {}", mark, self.description));
        }
    }
}

/// Progress as JSON lines on stdout
#[derive(Debug, Default)]
pub struct JsonProgress {
    description: String,
}

impl ProgressSink for JsonProgress {
    fn step_started(&mut self, description: &str, step: usize, total_steps: usize) {
        self.description = description.to_string();
        JsonMessage::step_start(description, step, total_steps).emit();
    }

    fn fraction(&mut self, fraction: f64) {
        JsonMessage::progress(&self.description, fraction).emit();
    }

    fn step_finished(&mut self, success: bool) {
        JsonMessage::step_complete(&self.description, success).emit();
    }
}

/// Everything a sink was told, in order.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RecordedEvent {
    Started(String),
    Fraction(f64),
    Finished(bool),
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingProgress {
    events: std::sync::Arc<std::sync::Mutex<Vec<RecordedEvent>>>,
}

#[cfg(test)]
impl RecordingProgress {
    pub(crate) fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn fractions(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Fraction(f) => Some(f),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl ProgressSink for RecordingProgress {
    fn step_started(&mut self, description: &str, _step: usize, _total_steps: usize) {
        self.events.lock().unwrap().push(RecordedEvent::Started(description.to_string()));
    }

    fn fraction(&mut self, fraction: f64) {
        self.events.lock().unwrap().push(RecordedEvent::Fraction(fraction));
    }

    fn step_finished(&mut self, success: bool) {
        self.events.lock().unwrap().push(RecordedEvent::Finished(success));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_switches_to_bar_on_first_fraction() {
        let mut sink = TerminalProgress::new();
        sink.step_started("Encoding", 1, 1);
        assert!(!sink.determinate);

        sink.fraction(0.42);
        assert!(sink.determinate);
        assert_eq!(sink.bar.as_ref().map(|b| b.position()), Some(42));

        sink.fraction(1.0);
        assert_eq!(sink.bar.as_ref().map(|b| b.position()), Some(100));

        sink.step_finished(true);
        assert!(sink.bar.is_none());
    }

    #[test]
    fn test_terminal_labels_multi_step_operations() {
        let mut sink = TerminalProgress::new();
        sink.step_started("Generating color palette", 1, 2);
        assert_eq!(sink.description, "[1/2] Generating color palette");
        sink.step_started("Creating GIF", 2, 2);
        assert_eq!(sink.description, "[2/2] Creating GIF");
        assert!(!sink.determinate);
    }

    #[test]
    fn test_fraction_without_step_is_ignored() {
        let mut sink = TerminalProgress::new();
        sink.fraction(0.5);
        sink.step_finished(false);
        assert!(sink.bar.is_none());
    }

    #[test]
    fn test_recording_sink() {
        let recorder = RecordingProgress::default();
        let mut sink: Box<dyn ProgressSink> = Box::new(recorder.clone());
        sink.step_started("Trimming video", 1, 1);
        sink.fraction(0.5);
        sink.step_finished(true);

        assert_eq!(
            recorder.events(),
            vec![
                RecordedEvent::Started("Trimming video".to_string()),
                RecordedEvent::Fraction(0.5),
                RecordedEvent::Finished(true),
            ]
        );
        assert_eq!(recorder.fractions(), vec![0.5]);
    }
}
