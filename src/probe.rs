//! # Probe Result Module
//!
//! Modello tipizzato dei metadati restituiti da `ffprobe -print_format json`.
//!
//! ## Responsabilità:
//! - Parsing del documento JSON (`format` obbligatorio, `streams` opzionale)
//! - Estrazione tollerante: numeri mancanti = 0, stringhe mancanti = "N/A"
//! - Numeri accettati sia come stringa (`"1205000"`) sia come numero JSON
//! - Partizione degli stream in video/audio, ordine originale preservato
//!
//! Un documento non JSON o senza oggetto `format` è un `ParseFailure`.

use crate::error::PegError;
use crate::timecode::TimeCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder for string fields the prober did not report.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatInfo {
    /// Human readable container name (`format_long_name`)
    pub container: String,
    /// Short demuxer name(s) (`format_name`)
    pub format_name: String,
    pub size_bytes: u64,
    pub duration_seconds: f64,
    /// Overall bitrate in bits/second
    pub bit_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoStream {
    pub index: u32,
    pub codec_name: String,
    pub width: u32,
    pub height: u32,
    /// Rational frame rate as reported, e.g. `30000/1001`
    pub frame_rate: String,
}

impl VideoStream {
    /// Frame rate as a number, when the rational is well formed.
    pub fn fps(&self) -> Option<f64> {
        let (num, den) = self.frame_rate.split_once('/')?;
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        (den > 0.0).then(|| num / den)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioStream {
    pub index: u32,
    pub codec_name: String,
    pub sample_rate: u32,
    pub channels: u32,
}

/// Metadata of one media file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaProbe {
    pub format: FormatInfo,
    pub video_streams: Vec<VideoStream>,
    pub audio_streams: Vec<AudioStream>,
}

#[derive(Debug, Deserialize)]
struct RawProbe {
    format: serde_json::Map<String, Value>,
    #[serde(default)]
    streams: Vec<serde_json::Map<String, Value>>,
}

impl MediaProbe {
    /// Parse the prober's JSON document.
    pub fn parse(json: &str) -> Result<Self, PegError> {
        let raw: RawProbe = serde_json::from_str(json)?;
        let format = &raw.format;

        let mut probe = MediaProbe {
            format: FormatInfo {
                container: text(format.get("format_long_name")),
                format_name: text(format.get("format_name")),
                size_bytes: unsigned(format.get("size")),
                duration_seconds: float(format.get("duration")),
                bit_rate: unsigned(format.get("bit_rate")),
            },
            video_streams: Vec::new(),
            audio_streams: Vec::new(),
        };

        for stream in &raw.streams {
            let index = small(stream.get("index"));
            let codec_name = text(stream.get("codec_name"));
            match stream.get("codec_type").and_then(Value::as_str) {
                Some("video") => probe.video_streams.push(VideoStream {
                    index,
                    codec_name,
                    width: small(stream.get("width")),
                    height: small(stream.get("height")),
                    frame_rate: text(stream.get("r_frame_rate")),
                }),
                Some("audio") => probe.audio_streams.push(AudioStream {
                    index,
                    codec_name,
                    sample_rate: small(stream.get("sample_rate")),
                    channels: small(stream.get("channels")),
                }),
                _ => {}
            }
        }

        Ok(probe)
    }

    pub fn primary_video(&self) -> Option<&VideoStream> {
        self.video_streams.first()
    }

    /// Middle of the media, where a preview frame is taken.
    pub fn midpoint(&self) -> TimeCode {
        TimeCode::from_secs(self.format.duration_seconds / 2.0).unwrap_or(TimeCode::ZERO)
    }

    pub fn size_mb(&self) -> f64 {
        self.format.size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn bit_rate_kbps(&self) -> f64 {
        self.format.bit_rate as f64 / 1000.0
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn float(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0)
}

fn unsigned(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_else(|| float(value) as u64),
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or_else(|_| float(value) as u64),
        _ => 0,
    }
}

fn small(value: Option<&Value>) -> u32 {
    u32::try_from(unsigned(value)).unwrap_or(u32::MAX)
}
