//! # Tool Path Resolver
//!
//! Trova gli eseguibili esterni (ffmpeg, ffprobe) nei diversi ambienti:
//! - Path esplicito da configurazione o command line
//! - Directory indicata da `PEG_THIS_TOOLS_DIR`
//! - Stessa directory dell'eseguibile (distribuzione "portable")
//! - `PATH` di sistema
//!
//! Se uno dei tool manca la sessione non può partire (`MissingTool`).

use crate::config::Config;
use crate::error::PegError;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable pointing at a directory with bundled tools.
pub const TOOLS_DIR_ENV: &str = "PEG_THIS_TOOLS_DIR";

/// Tools the session cannot run without.
pub const REQUIRED_TOOLS: [&str; 2] = ["ffmpeg", "ffprobe"];

/// Tool path resolver for the different deployment layouts
pub struct ToolPathResolver {
    /// Directory with bundled tools, if any
    tools_dir: Option<PathBuf>,
    /// Directory of the running executable
    exe_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    /// Create a new path resolver
    pub fn new() -> Self {
        let tools_dir = env::var_os(TOOLS_DIR_ENV)
            .map(PathBuf::from)
            .filter(|p| p.is_dir());
        if let Some(ref dir) = tools_dir {
            debug!("Using tools directory from {}: {:?}", TOOLS_DIR_ENV, dir);
        }

        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        Self { tools_dir, exe_dir }
    }

    fn executable_name(tool_name: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", tool_name)
        } else {
            tool_name.to_string()
        }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        let executable = Self::executable_name(tool_name);

        for dir in self.tools_dir.iter().chain(self.exe_dir.iter()) {
            let candidate = dir.join(&executable);
            debug!("Checking bundled path: {:?}", candidate);
            if candidate.is_file() {
                debug!("Using bundled tool: {} -> {:?}", tool_name, candidate);
                return Some(candidate);
            }
        }

        let found = self.find_in_system_path(&executable);
        match found {
            Some(ref path) => debug!("Using system tool: {} -> {:?}", tool_name, path),
            None => warn!("Tool not found: {}", tool_name),
        }
        found
    }

    /// Find tool in system PATH
    fn find_in_system_path(&self, executable: &str) -> Option<PathBuf> {
        let path_var = env::var_os("PATH")?;
        env::split_paths(&path_var)
            .map(|dir| dir.join(executable))
            .find(|path| path.is_file())
    }

    /// Installation hint shown next to a missing tool
    fn install_instructions(tool_name: &str) -> String {
        if cfg!(target_os = "linux") {
            match tool_name {
                "ffmpeg" | "ffprobe" => "sudo apt-get install ffmpeg".to_string(),
                _ => format!("sudo apt-get install {}", tool_name),
            }
        } else if cfg!(target_os = "macos") {
            "brew install ffmpeg".to_string()
        } else {
            format!(
                "place {} next to this program or add it to PATH",
                Self::executable_name(tool_name)
            )
        }
    }

    /// Check if a tool is available and provide installation instructions if not
    pub fn check_tool_with_instructions(&self, tool_name: &str) -> Result<PathBuf, String> {
        self.resolve_tool(tool_name).ok_or_else(|| {
            format!(
                "Tool '{}' not found. To install, run:\n  {}",
                tool_name,
                Self::install_instructions(tool_name)
            )
        })
    }

    /// Get a report of tool availability
    pub fn get_tools_report(&self) -> String {
        let mut report = String::from("Tool availability:\n");
        if let Some(ref dir) = self.tools_dir {
            report.push_str(&format!("Bundled tools dir: {:?}\n", dir));
        }
        for tool in REQUIRED_TOOLS {
            match self.check_tool_with_instructions(tool) {
                Ok(path) => report.push_str(&format!("  ✅ {} -> {:?}\n", tool, path)),
                Err(_) => report.push_str(&format!(
                    "  ❌ {} (install with: {})\n",
                    tool,
                    Self::install_instructions(tool)
                )),
            }
        }
        report
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved encoder/prober pair used by a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Toolchain {
    /// Resolve both tools, honouring explicit paths from the configuration.
    pub fn resolve(config: &Config) -> Result<Self, PegError> {
        let resolver = ToolPathResolver::new();
        Ok(Self {
            ffmpeg: Self::pick(&resolver, "ffmpeg", config.ffmpeg_path.as_deref())?,
            ffprobe: Self::pick(&resolver, "ffprobe", config.ffprobe_path.as_deref())?,
        })
    }

    fn pick(
        resolver: &ToolPathResolver,
        tool: &str,
        explicit: Option<&Path>,
    ) -> Result<PathBuf, PegError> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(PegError::MissingTool(format!(
                "{} (configured path {} does not exist)",
                tool,
                path.display()
            )));
        }
        resolver
            .check_tool_with_instructions(tool)
            .map_err(PegError::MissingTool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_paths_win() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = dir.path().join("my-ffmpeg");
        let ffprobe = dir.path().join("my-ffprobe");
        std::fs::write(&ffmpeg, "").unwrap();
        std::fs::write(&ffprobe, "").unwrap();

        let config = Config {
            ffmpeg_path: Some(ffmpeg.clone()),
            ffprobe_path: Some(ffprobe.clone()),
            ..Default::default()
        };
        let toolchain = Toolchain::resolve(&config).unwrap();
        assert_eq!(toolchain.ffmpeg, ffmpeg);
        assert_eq!(toolchain.ffprobe, ffprobe);
    }

    #[test]
    fn test_missing_explicit_path_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            ffmpeg_path: Some(dir.path().join("nope")),
            ffprobe_path: Some(dir.path().join("nope")),
            ..Default::default()
        };
        let err = Toolchain::resolve(&config).unwrap_err();
        assert!(matches!(err, PegError::MissingTool(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unknown_tool_not_found() {
        let resolver = ToolPathResolver::new();
        assert_eq!(resolver.resolve_tool("definitely-not-a-real-tool-4821"), None);
        let msg = resolver
            .check_tool_with_instructions("definitely-not-a-real-tool-4821")
            .unwrap_err();
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_tools_report_lists_required_tools() {
        let report = ToolPathResolver::new().get_tools_report();
        assert!(report.contains("ffmpeg"));
        assert!(report.contains("ffprobe"));
    }
}
