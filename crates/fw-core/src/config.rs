//! Engine configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool path overrides and the per-job defaults. Every section defaults
//! sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Environment variable overriding the ffmpeg executable path.
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";
/// Environment variable overriding the ffprobe executable path.
pub const FFPROBE_PATH_ENV: &str = "FFPROBE_PATH";
/// Environment variable overriding the flvmeta executable path.
pub const FLVMETA_PATH_ENV: &str = "FLVMETA_PATH";
/// Environment variable overriding the flvtool2 executable path.
pub const FLVTOOL2_PATH_ENV: &str = "FLVTOOL2_PATH";

/// Default number of retained stdout/stderr lines per job.
pub const DEFAULT_LOG_LINES: usize = 100;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub job: JobDefaults,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None`, the file does not exist or cannot be parsed.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.ffprobe_path", &self.tools.ffprobe_path),
            ("tools.flvtool_path", &self.tools.flvtool_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "{name} {} does not exist; the search path will be used",
                        p.display()
                    ));
                }
            }
        }

        if !(-20..=20).contains(&self.job.niceness) {
            warnings.push(format!(
                "job.niceness {} is outside -20..=20 and will be clamped",
                self.job.niceness
            ));
        }

        if self.job.timeout_secs == Some(0) {
            warnings.push("job.timeout_secs is 0; no timeout will be applied".into());
        }

        if let Some(ref dir) = self.job.working_dir {
            if !dir.is_dir() {
                warnings.push(format!("job.working_dir {} is not a directory", dir.display()));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Explicit paths to the external tools.
///
/// A path that does not exist is ignored and discovery falls back to the
/// environment and the search path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub flvtool_path: Option<PathBuf>,
}

impl ToolsConfig {
    /// Build a tools config from the `FFMPEG_PATH`, `FFPROBE_PATH`,
    /// `FLVMETA_PATH` and `FLVTOOL2_PATH` environment variables.
    pub fn from_env() -> Self {
        let var = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        Self {
            ffmpeg_path: var(FFMPEG_PATH_ENV),
            ffprobe_path: var(FFPROBE_PATH_ENV),
            flvtool_path: var(FLVMETA_PATH_ENV).or_else(|| var(FLVTOOL2_PATH_ENV)),
        }
    }
}

/// Defaults applied to every new job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDefaults {
    /// Kill the process after this many seconds. `None` disables the timeout.
    pub timeout_secs: Option<u64>,
    /// Scheduling priority applied through `nice` on unix.
    pub niceness: i32,
    /// Retained stdout/stderr lines; 0 keeps everything.
    #[serde(default = "default_log_lines")]
    pub log_lines: usize,
    /// Working directory of the spawned process.
    pub working_dir: Option<PathBuf>,
}

fn default_log_lines() -> usize {
    DEFAULT_LOG_LINES
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            niceness: 0,
            log_lines: DEFAULT_LOG_LINES,
            working_dir: None,
        }
    }
}
