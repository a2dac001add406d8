//! # Progress Tracking Module
//!
//! Trasforma l'output testuale di ffmpeg in una frazione di completamento.
//!
//! ## Responsabilità:
//! - Riconosce l'annuncio della durata totale (`Duration: HH:MM:SS.xx,`)
//! - Riconosce il tempo elaborato (`time=HH:MM:SS.xx`)
//! - Riporta frazioni in [0, 1] mai decrescenti
//! - Forza 1.0 all'uscita del processo (anche con errore), solo se la durata era nota
//!
//! ## Stati:
//! `AwaitingDuration -> Tracking -> Done`
//!
//! Righe malformate o parziali non sono mai un errore: vengono ignorate.

use crate::timecode::TimeCode;
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

static DURATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration:\s*([^,\s]+)").expect("valid duration pattern"));

static ELAPSED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btime=\s*(\S+)").expect("valid elapsed pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    AwaitingDuration,
    Tracking,
    Done,
}

/// Progress state for one streaming run.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    state: TrackerState,
    total_seconds: Option<f64>,
    elapsed_seconds: f64,
    last_reported: f64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: TrackerState::AwaitingDuration,
            total_seconds: None,
            elapsed_seconds: 0.0,
            last_reported: 0.0,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn total_seconds(&self) -> Option<f64> {
        self.total_seconds
    }

    /// Last valid elapsed value seen.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// Feed one output line; returns the fraction to report, if any.
    pub fn observe_line(&mut self, line: &str) -> Option<f64> {
        if self.state == TrackerState::AwaitingDuration {
            if let Some(total) = Self::capture(&DURATION_PATTERN, line).filter(|t| *t > 0.0) {
                trace!("Total duration: {:.2}s", total);
                self.total_seconds = Some(total);
                self.state = TrackerState::Tracking;
            }
        }

        if self.state != TrackerState::Tracking {
            return None;
        }

        let elapsed = Self::capture(&ELAPSED_PATTERN, line)?;
        self.elapsed_seconds = elapsed;
        let total = self.total_seconds?;

        let fraction = (elapsed / total).clamp(0.0, 1.0);
        self.last_reported = self.last_reported.max(fraction);
        Some(self.last_reported)
    }

    /// Process exited: report completion if a duration was ever known.
    pub fn finish(&mut self) -> Option<f64> {
        let was_tracking = self.state == TrackerState::Tracking;
        self.state = TrackerState::Done;
        if was_tracking {
            self.last_reported = 1.0;
            Some(1.0)
        } else {
            None
        }
    }

    fn capture(pattern: &Regex, line: &str) -> Option<f64> {
        let field = pattern.captures(line)?.get(1)?.as_str();
        TimeCode::parse(field).ok().map(|tc| tc.as_secs())
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DURATION_LINE: &str = "  Duration: 00:00:10.00, start: 0.000000, bitrate: 1205 kb/s";

    fn frame_line(time: &str) -> String {
        format!(
            "frame=  120 fps= 30 q=28.0 size=     256kB time={} bitrate= 419.4kbits/s speed=1.01x",
            time
        )
    }

    #[test]
    fn test_patterns_compile() {
        assert!(DURATION_PATTERN.is_match(DURATION_LINE));
        assert!(ELAPSED_PATTERN.is_match(&frame_line("00:00:01.00")));
        assert!(!ELAPSED_PATTERN.is_match("out_time=00:00:01.00"));
    }

    #[test]
    fn test_reports_non_decreasing_fractions_ending_at_one() {
        let mut tracker = ProgressTracker::new();
        let mut reported = Vec::new();

        let mut lines = vec![
            "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mp4':".to_string(),
            DURATION_LINE.to_string(),
        ];
        for t in ["00:00:02.50", "00:00:05.00", "00:00:04.00", "00:00:12.00"] {
            lines.push(frame_line(t));
        }
        for line in &lines {
            reported.extend(tracker.observe_line(line));
        }
        reported.extend(tracker.finish());

        assert_eq!(reported, vec![0.25, 0.5, 0.5, 1.0, 1.0]);
        assert!(reported.windows(2).all(|w| w[0] <= w[1]));
        assert!(reported.iter().all(|f| (0.0..=1.0).contains(f)));
        assert_eq!(tracker.state(), TrackerState::Done);
    }

    #[test]
    fn test_no_duration_never_reports() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.observe_line(&frame_line("00:00:01.00")), None);
        assert_eq!(tracker.observe_line(&frame_line("00:00:02.00")), None);
        assert_eq!(tracker.finish(), None);
        assert_eq!(tracker.state(), TrackerState::Done);
    }

    #[test]
    fn test_malformed_elapsed_keeps_last_value() {
        let mut tracker = ProgressTracker::new();
        tracker.observe_line(DURATION_LINE);
        assert_eq!(tracker.observe_line(&frame_line("00:00:03.00")), Some(0.3));

        assert_eq!(tracker.observe_line("frame=  1 time=garbage bitrate=N/A"), None);
        assert_eq!(tracker.observe_line("time="), None);
        assert_eq!(tracker.observe_line(&frame_line("N/A")), None);
        assert_eq!(tracker.elapsed_seconds(), 3.0);
    }

    #[test]
    fn test_only_first_duration_counts() {
        let mut tracker = ProgressTracker::new();
        tracker.observe_line(DURATION_LINE);
        tracker.observe_line("  Duration: 00:01:40.00, start: 0.000000, bitrate: 128 kb/s");
        assert_eq!(tracker.total_seconds(), Some(10.0));
    }

    #[test]
    fn test_unusable_duration_is_ignored() {
        let mut tracker = ProgressTracker::new();
        tracker.observe_line("  Duration: N/A, bitrate: N/A");
        tracker.observe_line("  Duration: 00:00:00.00, start: 0.000000");
        assert_eq!(tracker.state(), TrackerState::AwaitingDuration);

        tracker.observe_line(DURATION_LINE);
        assert_eq!(tracker.state(), TrackerState::Tracking);
    }

    #[test]
    fn test_progress_key_values_are_not_elapsed() {
        let mut tracker = ProgressTracker::new();
        tracker.observe_line(DURATION_LINE);
        assert_eq!(tracker.observe_line("out_time=00:00:05.000000"), None);
    }
}
