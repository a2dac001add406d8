//! # Time-code Module
//!
//! Parsing e formattazione dei time-code `HH:MM:SS[.frazione]`.
//!
//! ## Responsabilità:
//! - Converte i time-code inseriti dall'utente (trim) in secondi
//! - Converte i marker `Duration:` / `time=` di ffmpeg in secondi
//! - Produce la rappresentazione testuale per display e per argomenti ffmpeg
//!
//! ## Regole:
//! - Esattamente tre campi separati da `:`
//! - Ore e minuti troncati a interi, secondi in virgola mobile
//! - Valori negativi o non finiti rifiutati con `FormatError`

use crate::error::PegError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Default number of decimals used when displaying a time-code.
pub const DISPLAY_PRECISION: usize = 2;

/// A non-negative offset or duration, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct TimeCode(f64);

impl TimeCode {
    pub const ZERO: TimeCode = TimeCode(0.0);

    /// Build from a number of seconds; rejects negative and non-finite values.
    pub fn from_secs(seconds: f64) -> Result<Self, PegError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PegError::FormatError(format!(
                "time must be a non-negative number of seconds, got {}",
                seconds
            )));
        }
        Ok(Self(seconds))
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Parse `HH:MM:SS[.fraction]`.
    pub fn parse(text: &str) -> Result<Self, PegError> {
        let text = text.trim();
        let fields: Vec<&str> = text.split(':').collect();
        if fields.len() != 3 {
            return Err(PegError::FormatError(format!(
                "expected HH:MM:SS[.fraction], got '{}'",
                text
            )));
        }

        let hours = Self::parse_field(fields[0], text)?.trunc();
        let minutes = Self::parse_field(fields[1], text)?.trunc();
        let seconds = Self::parse_field(fields[2], text)?;

        Self::from_secs(hours * 3600.0 + minutes * 60.0 + seconds)
    }

    fn parse_field(field: &str, whole: &str) -> Result<f64, PegError> {
        // f64::from_str accetta "inf", "NaN" e "1e3": per i time-code servono solo cifre
        let is_plain_number = !field.is_empty()
            && field.chars().all(|c| c.is_ascii_digit() || c == '.')
            && field.chars().filter(|&c| c == '.').count() <= 1
            && field != ".";
        if !is_plain_number {
            return Err(PegError::FormatError(format!(
                "'{}' is not a numeric field in time-code '{}'",
                field, whole
            )));
        }
        field.parse::<f64>().map_err(|_| {
            PegError::FormatError(format!(
                "'{}' is not a numeric field in time-code '{}'",
                field, whole
            ))
        })
    }

    /// Render as `HH:MM:SS.fff` with `precision` decimals on the seconds field.
    pub fn format(&self, precision: usize) -> String {
        let scale = 10f64.powi(precision as i32);
        let total = (self.0 * scale).round() / scale;

        let hours = (total / 3600.0).floor();
        let minutes = ((total - hours * 3600.0) / 60.0).floor();
        let seconds = (total - hours * 3600.0 - minutes * 60.0).max(0.0);

        if precision == 0 {
            format!("{:02}:{:02}:{:02}", hours as u64, minutes as u64, seconds.round() as u64)
        } else {
            format!(
                "{:02}:{:02}:{:0width$.prec$}",
                hours as u64,
                minutes as u64,
                seconds,
                width = precision + 3,
                prec = precision
            )
        }
    }

    /// Render for an ffmpeg argument: no decimals unless a fraction is present
    /// (millisecond resolution).
    pub fn to_arg(&self) -> String {
        let millis = (self.0 * 1000.0).round();
        if millis % 1000.0 == 0.0 {
            return self.format(0);
        }
        let text = self.format(3);
        text.trim_end_matches('0').to_string()
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(DISPLAY_PRECISION))
    }
}

impl FromStr for TimeCode {
    type Err = PegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        assert_eq!(TimeCode::parse("00:00:05").unwrap().as_secs(), 5.0);
        assert_eq!(TimeCode::parse("00:01:30").unwrap().as_secs(), 90.0);
        assert_eq!(TimeCode::parse("01:02:03.50").unwrap().as_secs(), 3723.5);
        assert_eq!(TimeCode::parse(" 00:00:07.25 ").unwrap().as_secs(), 7.25);
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert!(matches!(TimeCode::parse("01:30"), Err(PegError::FormatError(_))));
        assert!(matches!(TimeCode::parse("1:2:3:4"), Err(PegError::FormatError(_))));
        assert!(matches!(TimeCode::parse(""), Err(PegError::FormatError(_))));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        let bad_values = [
            "aa:00:00",
            "00:xx:00",
            "00:00:garbage",
            "00:00:inf",
            "-1:00:00",
            "00:00:1e3",
            "00::00",
            "N/A",
        ];
        for bad in bad_values {
            assert!(
                matches!(TimeCode::parse(bad), Err(PegError::FormatError(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_format_display() {
        assert_eq!(TimeCode::from_secs(0.0).unwrap().to_string(), "00:00:00.00");
        assert_eq!(TimeCode::from_secs(3723.5).unwrap().to_string(), "01:02:03.50");
        assert_eq!(TimeCode::from_secs(59.999).unwrap().to_string(), "00:01:00.00");
        assert_eq!(TimeCode::from_secs(90.0).unwrap().format(0), "00:01:30");
    }

    #[test]
    fn test_to_arg() {
        assert_eq!(TimeCode::from_secs(5.0).unwrap().to_arg(), "00:00:05");
        assert_eq!(TimeCode::from_secs(90.0).unwrap().to_arg(), "00:01:30");
        assert_eq!(TimeCode::from_secs(12.5).unwrap().to_arg(), "00:00:12.5");
        assert_eq!(TimeCode::from_secs(1.25).unwrap().to_arg(), "00:00:01.25");
    }

    #[test]
    fn test_round_trip() {
        let mut t = 0.0;
        while t < 200_000.0 {
            let tc = TimeCode::from_secs(t).unwrap();
            let back = TimeCode::parse(&tc.to_string()).unwrap();
            assert!((back.as_secs() - t).abs() <= 0.01, "{} -> {} -> {}", t, tc, back.as_secs());
            t = t * 1.37 + 0.013;
        }
    }

    #[test]
    fn test_from_secs_rejects_negative() {
        assert!(TimeCode::from_secs(-0.5).is_err());
        assert!(TimeCode::from_secs(f64::NAN).is_err());
    }
}
