//! # Operation Catalog Types
//!
//! Definisce le operazioni supportate e i loro parametri tipizzati.
//!
//! ## Operazioni:
//! - `InspectFile`: metadata del file via ffprobe
//! - `ConvertLossless`: remux in un altro container senza ricodifica
//! - `ConvertLossy`: ricodifica video con CRF scelto, audio copiato
//! - `Trim`: taglio tra due time-code in stream copy
//! - `ExtractAudio` / `RemoveAudio`: estrazione o rimozione della traccia audio
//! - `ToGif`: GIF a due passate con palette
//! - `Crop`: crop rettangolare del video
//! - `BatchConvert`: remux o GIF su tutti i video della directory
//!
//! Una `OperationRequest` viene costruita dall'input dell'operatore e consumata
//! una sola volta dal builder delle invocazioni.

use crate::crop::CropRegion;
use crate::error::PegError;
use crate::timecode::TimeCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target container for a lossless remux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Mp4,
    Mkv,
    Mov,
    Avi,
    Webm,
}

impl ContainerFormat {
    pub const ALL: [ContainerFormat; 5] = [
        ContainerFormat::Mp4,
        ContainerFormat::Mkv,
        ContainerFormat::Mov,
        ContainerFormat::Avi,
        ContainerFormat::Webm,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mkv => "mkv",
            ContainerFormat::Mov => "mov",
            ContainerFormat::Avi => "avi",
            ContainerFormat::Webm => "webm",
        }
    }

    /// Text subtitle codec the container can carry, `None` when it carries none.
    pub fn subtitle_codec(&self) -> Option<&'static str> {
        match self {
            ContainerFormat::Mp4 | ContainerFormat::Mov => Some("mov_text"),
            ContainerFormat::Mkv => Some("srt"),
            ContainerFormat::Webm => Some("webvtt"),
            ContainerFormat::Avi => None,
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ContainerFormat {
    type Err = PegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('.').to_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == wanted)
            .ok_or_else(|| PegError::FormatError(format!("unsupported container format '{}'", s)))
    }
}

/// Audio codec choices for audio extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// MP3 (lossy), VBR quality 2
    Mp3,
    /// FLAC (lossless)
    Flac,
    /// WAV (uncompressed PCM)
    Wav,
}

impl AudioCodec {
    /// Encoder arguments following `-c:a`, one token each.
    pub fn encoder_args(&self) -> Vec<String> {
        match self {
            AudioCodec::Mp3 => crate::args!["libmp3lame", "-q:a", "2"],
            AudioCodec::Flac => crate::args!["flac"],
            AudioCodec::Wav => crate::args!["pcm_s16le"],
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Flac => "flac",
            AudioCodec::Wav => "wav",
        }
    }
}

impl FromStr for AudioCodec {
    type Err = PegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(AudioCodec::Mp3),
            "flac" => Ok(AudioCodec::Flac),
            "wav" => Ok(AudioCodec::Wav),
            other => Err(PegError::FormatError(format!("unsupported audio codec '{}'", other))),
        }
    }
}

/// Named quality presets for lossy re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreset {
    High,
    Medium,
    Low,
}

impl QualityPreset {
    pub fn crf(&self) -> Crf {
        match self {
            QualityPreset::High => Crf(18),
            QualityPreset::Medium => Crf(23),
            QualityPreset::Low => Crf(28),
        }
    }
}

impl FromStr for QualityPreset {
    type Err = PegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(QualityPreset::High),
            "medium" => Ok(QualityPreset::Medium),
            "low" => Ok(QualityPreset::Low),
            other => Err(PegError::FormatError(format!(
                "unknown quality preset '{}' (expected high, medium or low)",
                other
            ))),
        }
    }
}

/// x264 constant rate factor, 0..=51.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crf(u8);

impl Crf {
    pub const MAX: u8 = 51;

    pub fn new(value: u8) -> Result<Self, PegError> {
        if value > Self::MAX {
            return Err(PegError::FormatError(format!(
                "CRF must be between 0 and {}, got {}",
                Self::MAX,
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl FromStr for Crf {
    type Err = PegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u8>()
            .map_err(|_| PegError::FormatError(format!("CRF must be a number, got '{}'", s)))?;
        Self::new(value)
    }
}

/// Frame rate and width of a palette-based GIF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GifParams {
    pub fps: u32,
    pub width: u32,
}

impl GifParams {
    pub const MAX_FPS: u32 = 100;

    pub fn new(fps: u32, width: u32) -> Result<Self, PegError> {
        if fps == 0 || fps > Self::MAX_FPS {
            return Err(PegError::FormatError(format!(
                "GIF frame rate must be between 1 and {}, got {}",
                Self::MAX_FPS,
                fps
            )));
        }
        if width == 0 {
            return Err(PegError::FormatError("GIF width must be greater than 0".to_string()));
        }
        Ok(Self { fps, width })
    }

    /// Shared `fps,scale` filter prefix of both GIF passes.
    pub fn scale_filter(&self) -> String {
        format!("fps={},scale={}:-1:flags=lanczos", self.fps, self.width)
    }
}

impl Default for GifParams {
    fn default() -> Self {
        Self { fps: 15, width: 480 }
    }
}

/// Output of a batch conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchFormat {
    Container(ContainerFormat),
    Gif,
}

impl FromStr for BatchFormat {
    type Err = PegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().trim_start_matches('.').eq_ignore_ascii_case("gif") {
            return Ok(BatchFormat::Gif);
        }
        ContainerFormat::from_str(s).map(BatchFormat::Container)
    }
}

impl fmt::Display for BatchFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchFormat::Container(c) => fmt::Display::fmt(c, f),
            BatchFormat::Gif => f.write_str("gif"),
        }
    }
}

/// One operator request over the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationRequest {
    InspectFile,
    ConvertLossless { format: ContainerFormat },
    ConvertLossy { crf: Crf },
    Trim { start: TimeCode, end: TimeCode },
    ExtractAudio { codec: AudioCodec },
    RemoveAudio,
    ToGif { params: GifParams },
    Crop { region: CropRegion },
    BatchConvert { format: BatchFormat, gif: Option<GifParams> },
}

impl OperationRequest {
    /// Trim request; the end must come strictly after the start.
    pub fn trim(start: TimeCode, end: TimeCode) -> Result<Self, PegError> {
        if end <= start {
            return Err(PegError::FormatError(format!(
                "end time {} must be after start time {}",
                end, start
            )));
        }
        Ok(OperationRequest::Trim { start, end })
    }

    /// Batch request; GIF output needs its parameters.
    pub fn batch(format: BatchFormat, gif: Option<GifParams>) -> Self {
        let gif = match format {
            BatchFormat::Gif => Some(gif.unwrap_or_default()),
            BatchFormat::Container(_) => None,
        };
        OperationRequest::BatchConvert { format, gif }
    }

    /// Short name used in logs and JSON events.
    pub fn kind(&self) -> &'static str {
        match self {
            OperationRequest::InspectFile => "inspect",
            OperationRequest::ConvertLossless { .. } => "convert_lossless",
            OperationRequest::ConvertLossy { .. } => "convert_lossy",
            OperationRequest::Trim { .. } => "trim",
            OperationRequest::ExtractAudio { .. } => "extract_audio",
            OperationRequest::RemoveAudio => "remove_audio",
            OperationRequest::ToGif { .. } => "to_gif",
            OperationRequest::Crop { .. } => "crop",
            OperationRequest::BatchConvert { .. } => "batch_convert",
        }
    }
}
