//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei media e i file temporanei.
//!
//! ## Responsabilità:
//! - Discovery dei file media nella directory di lavoro (non ricorsiva)
//! - Riconoscimento delle estensioni (case-insensitive)
//! - Formattazione human-readable delle dimensioni
//! - `SideFile`: file temporanei (palette GIF, preview del crop) rimossi
//!   sempre, anche in caso di errore o interruzione
//!
//! ## Formati riconosciuti:
//! - **Selezione singola**: MKV, MP4, AVI, MOV, WebM, FLV, WMV, MP3, FLAC, WAV, OGG
//! - **Batch video**: MKV, MP4, AVI, MOV, WebM, FLV, WMV
//!
//! ## Esempio:
//! ```ignore
//! let files = FileManager::find_media_files(Path::new("."))?;
//! for file in files {
//!     println!("{} ({})", file.display(), FileManager::format_size(size));
//! }
//! ```

use anyhow::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions offered for single-file operations.
pub const MEDIA_EXTENSIONS: [&str; 11] = [
    "mkv", "mp4", "avi", "mov", "webm", "flv", "wmv", "mp3", "flac", "wav", "ogg",
];

/// Extensions picked up by batch conversion.
pub const BATCH_VIDEO_EXTENSIONS: [&str; 7] = ["mkv", "mp4", "avi", "mov", "webm", "flv", "wmv"];

/// Manages file discovery in the working directory
pub struct FileManager;

impl FileManager {
    /// Size of a file in bytes
    pub async fn get_file_size(path: &Path) -> Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Media files directly inside `dir`, sorted by name
    pub fn find_media_files(dir: &Path) -> Result<Vec<PathBuf>> {
        Self::scan(dir, Self::is_media)
    }

    /// Video files directly inside `dir` eligible for batch conversion, sorted by name
    pub fn find_batch_videos(dir: &Path) -> Result<Vec<PathBuf>> {
        Self::scan(dir, Self::is_batch_video)
    }

    fn scan(dir: &Path, keep: fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(anyhow::anyhow!("Not a directory: {}", dir.display()));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| keep(p))
            .collect();
        files.sort();
        Ok(files)
    }

    fn has_extension(path: &Path, allowed: &[&str]) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| allowed.contains(&ext.as_str()))
    }

    /// Check if a file is a recognised media file
    pub fn is_media(path: &Path) -> bool {
        Self::has_extension(path, &MEDIA_EXTENSIONS)
    }

    /// Check if a file is a video eligible for batch conversion
    pub fn is_batch_video(path: &Path) -> bool {
        Self::has_extension(path, &BATCH_VIDEO_EXTENSIONS)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

/// Transient file removed when the guard goes out of scope.
///
/// Removal failures are logged and never turned into an operation error.
#[derive(Debug)]
pub struct SideFile {
    path: PathBuf,
}

impl SideFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SideFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed side file {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove side file {}: {}", self.path.display(), e),
        }
    }
}
