//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i default delle operazioni
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//!
//! ## Parametri di configurazione:
//! - `ffmpeg_path` / `ffprobe_path`: path espliciti dei tool (default: ricerca automatica)
//! - `output_dir`: directory dei file prodotti (default: accanto al file di input)
//! - `overwrite`: sovrascrive output esistenti (`-y`) o fallisce (`-n`) (default: true)
//! - `default_crf`: CRF per la conversione lossy (0-51, default: 23)
//! - `gif_fps` / `gif_width`: parametri GIF di default (15 fps, 480 px)
//! - `json_output`: eventi JSON su stdout invece della progress bar
//! - `log_file`: file di log (default: stderr)
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     default_crf: 28,
//!     overwrite: false,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::PegError;
use crate::operation::{Crf, GifParams};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit ffmpeg executable
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe executable
    pub ffprobe_path: Option<PathBuf>,
    /// Output directory (None = next to the input file)
    pub output_dir: Option<PathBuf>,
    /// Overwrite existing outputs without asking
    pub overwrite: bool,
    /// CRF used by lossy conversion when none is given
    pub default_crf: u8,
    /// GIF frame rate
    pub gif_fps: u32,
    /// GIF width in pixels
    pub gif_width: u32,
    /// Output progress and results as JSON for programmatic use
    pub json_output: bool,
    /// Log file (None = stderr)
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            output_dir: None,
            overwrite: true,
            default_crf: 23,
            gif_fps: 15,
            gif_width: 480,
            json_output: false,
            log_file: None,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        Crf::new(self.default_crf)?;
        GifParams::new(self.gif_fps, self.gif_width)?;

        if let Some(ref output_dir) = self.output_dir {
            if !output_dir.exists() {
                return Err(anyhow::anyhow!(
                    "Output directory does not exist: {}",
                    output_dir.display()
                ));
            }
            if !output_dir.is_dir() {
                return Err(anyhow::anyhow!(
                    "Output path is not a directory: {}",
                    output_dir.display()
                ));
            }
        }

        Ok(())
    }

    /// GIF parameters from the configured defaults, with per-command overrides
    pub fn gif_params(&self, fps: Option<u32>, width: Option<u32>) -> Result<GifParams, PegError> {
        GifParams::new(fps.unwrap_or(self.gif_fps), width.unwrap_or(self.gif_width))
    }

    /// Default config file location (`<config_dir>/peg-this/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("peg-this").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.default_crf = 52;
        assert!(config.validate().is_err());

        config.default_crf = 23;
        config.gif_fps = 0;
        assert!(config.validate().is_err());

        config.gif_fps = 15;
        config.gif_width = 0;
        assert!(config.validate().is_err());

        config.gif_width = 480;
        config.output_dir = Some(PathBuf::from("/definitely/not/here"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.default_crf, 23);
        assert_eq!(config.gif_fps, 15);
        assert_eq!(config.gif_width, 480);
        assert!(config.overwrite);
        assert!(!config.json_output);
        assert_eq!(config.gif_params(None, None).unwrap(), GifParams::default());
        assert_eq!(config.gif_params(Some(10), None).unwrap(), GifParams { fps: 10, width: 480 });
        assert!(matches!(config.gif_params(None, Some(0)), Err(PegError::FormatError(_))));
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let original_config = Config {
            default_crf: 28,
            gif_fps: 10,
            gif_width: 320,
            overwrite: false,
            output_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.default_crf, 28);
        assert_eq!(loaded_config.gif_fps, 10);
        assert_eq!(loaded_config.gif_width, 320);
        assert!(!loaded_config.overwrite);
        assert_eq!(loaded_config.output_dir.as_deref(), Some(temp_dir.path()));
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(&config_path, r#"{ "gif_fps": 12 }"#).await.unwrap();

        let loaded = Config::from_file(&config_path).await.unwrap();
        assert_eq!(loaded.gif_fps, 12);
        assert_eq!(loaded.default_crf, 23);

        let missing = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(missing.gif_width, 480);
    }
}
