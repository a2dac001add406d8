//! # Crop Region Module
//!
//! Regione rettangolare di crop e selettori intercambiabili che la producono.
//!
//! ## Responsabilità:
//! - `CropRegion`: (x, y, larghezza, altezza) in pixel
//! - Normalizzazione di una selezione "a trascinamento" (due angoli qualsiasi)
//! - Clamp della regione dentro le dimensioni del frame di riferimento
//! - Trait `CropSelector`: qualsiasi collaboratore (picker grafico, prompt numerico,
//!   preset fisso) che sappia produrre una `CropRegion`
//!
//! Una selezione ad area nulla non è un errore: l'operazione di crop diventa un no-op.

use crate::error::PegError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Rectangle inside a reference frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Region spanned by two opposite corners, in any drag direction.
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: x1.abs_diff(x2),
            height: y1.abs_diff(y2),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clip the region to a `frame_width` x `frame_height` frame.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Self {
        let x = self.x.min(frame_width);
        let y = self.y.min(frame_height);
        Self {
            x,
            y,
            width: self.width.min(frame_width - x),
            height: self.height.min(frame_height - y),
        }
    }

    /// `crop=w:h:x:y` video filter.
    pub fn filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

impl fmt::Display for CropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Parses the geometry notation `WIDTHxHEIGHT+X+Y` (offsets optional).
impl FromStr for CropRegion {
    type Err = PegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PegError::FormatError(format!("expected WIDTHxHEIGHT+X+Y, got '{}'", s));
        let number = |part: &str| part.trim().parse::<u32>().map_err(|_| invalid());

        let mut parts = s.trim().split('+');
        let size = parts.next().ok_or_else(invalid)?;
        let (w, h) = size.split_once(['x', 'X']).ok_or_else(invalid)?;
        let x = parts.next().map(number).transpose()?.unwrap_or(0);
        let y = parts.next().map(number).transpose()?.unwrap_or(0);
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(x, y, number(w)?, number(h)?))
    }
}

/// Reference frame handed to a selector.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    /// Still frame extracted from the video midpoint, when the selector asked for one.
    pub preview: Option<PathBuf>,
}

/// Anything that can turn a reference frame into a crop selection.
pub trait CropSelector {
    /// Whether `select` needs a still frame to show.
    ///
    /// A graphical picker drawing a rectangle over the frame returns `true`; numeric
    /// selectors like `FixedCrop` and `CornerSelection` work from the frame size alone.
    fn needs_preview(&self) -> bool {
        false
    }

    fn select(&mut self, frame: &FrameInfo) -> Result<CropRegion, PegError>;
}

/// Selector returning a region decided up front (command line, preset).
#[derive(Debug, Clone, Copy)]
pub struct FixedCrop(pub CropRegion);

impl CropSelector for FixedCrop {
    fn select(&mut self, _frame: &FrameInfo) -> Result<CropRegion, PegError> {
        Ok(self.0)
    }
}

/// Selector built from two drag corners, as a pointer-based picker reports them.
#[derive(Debug, Clone, Copy)]
pub struct CornerSelection {
    pub start: (u32, u32),
    pub end: (u32, u32),
}

impl CropSelector for CornerSelection {
    fn select(&mut self, _frame: &FrameInfo) -> Result<CropRegion, PegError> {
        Ok(CropRegion::from_corners(self.start.0, self.start.1, self.end.0, self.end.1))
    }
}

impl FromStr for CornerSelection {
    type Err = PegError;

    /// `X1,Y1,X2,Y2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| PegError::FormatError(format!("expected X1,Y1,X2,Y2, got '{}'", s)))?;
        match values.as_slice() {
            [x1, y1, x2, y2] => Ok(Self { start: (*x1, *y1), end: (*x2, *y2) }),
            _ => Err(PegError::FormatError(format!("expected X1,Y1,X2,Y2, got '{}'", s))),
        }
    }
}
