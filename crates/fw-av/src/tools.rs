//! External tool discovery and the process-wide capability cache.
//!
//! [`ToolCache`] resolves the ffmpeg, ffprobe and flvmeta/flvtool2
//! executables and memoizes the version and the capability tables ffmpeg
//! advertises. Entries are populated on first request and kept until
//! [`ToolCache::reset`]. A shared instance is available from
//! [`ToolCache::global`]; tests and embedders can build isolated ones with
//! [`ToolCache::new`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, OnceLock};

use fw_core::config::{
    ToolsConfig, FFMPEG_PATH_ENV, FFPROBE_PATH_ENV, FLVMETA_PATH_ENV, FLVTOOL2_PATH_ENV,
};
use fw_core::{Error, Result};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::capabilities::{
    parse_codecs, parse_encoders, parse_filters, parse_formats, Codecs, Encoders, Filters,
    Formats,
};
use crate::command::ToolCommand;

static RE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"version\s+(\S+)").expect("valid version regex"));

/// Well-known install locations searched after `PATH`.
#[cfg(unix)]
const FALLBACK_DIRS: &[&str] = &["/usr/local/bin", "/opt/homebrew/bin", "/usr/bin", "/bin"];
#[cfg(not(unix))]
const FALLBACK_DIRS: &[&str] = &[];

/// Parsed `ffmpeg -version` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolVersion {
    /// Version token as printed, e.g. `6.1.1-3ubuntu5` or `n7.0`.
    pub raw: String,
    /// Leniently parsed semantic version, when the token has a numeric core.
    pub semver: Option<semver::Version>,
}

impl ToolVersion {
    /// Parse the first `version <token>` occurrence of `-version` output.
    pub fn parse(output: &str) -> Option<Self> {
        let raw = RE_VERSION.captures(output)?[1].to_string();
        let semver = lenient_semver(&raw);
        Some(Self { raw, semver })
    }
}

/// Extract `major.minor.patch` from tokens such as `n6.0`, `4.4.2-0ubuntu`
/// or `7.1`. Git snapshot builds (`N-113027-g...`) yield `None`.
fn lenient_semver(raw: &str) -> Option<semver::Version> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    if start > 1 {
        return None;
    }
    let core: String = raw[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts: Vec<&str> = core.split('.').filter(|p| !p.is_empty()).take(3).collect();
    if parts.is_empty() {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    semver::Version::parse(&parts.join(".")).ok()
}

/// Availability information for a tool, returned by [`ToolCache::report`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version token, if it could be determined.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct CacheState {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    flvtool: Option<PathBuf>,
    version: Option<ToolVersion>,
    formats: Option<Arc<Formats>>,
    codecs: Option<Arc<Codecs>>,
    encoders: Option<Arc<Encoders>>,
    filters: Option<Arc<Filters>>,
}

/// Memoized tool paths, version and capability tables.
#[derive(Debug, Default)]
pub struct ToolCache {
    config: ToolsConfig,
    state: RwLock<CacheState>,
}

static GLOBAL: OnceLock<Arc<ToolCache>> = OnceLock::new();

impl ToolCache {
    /// Create an empty cache resolving tools with `config` overrides.
    pub fn new(config: ToolsConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// The shared process-wide cache (no explicit path overrides; the
    /// environment variables still apply).
    pub fn global() -> Arc<ToolCache> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ToolCache::default())))
    }

    /// Clear every cached path, version and table.
    pub fn reset(&self) {
        *self.state.write() = CacheState::default();
        tracing::debug!("Tool cache reset");
    }

    /// Path to ffmpeg.
    ///
    /// Resolution order: configured path, `FFMPEG_PATH`, `PATH`, then
    /// well-known install locations. Paths that do not exist are skipped.
    pub fn ffmpeg_path(&self) -> Result<PathBuf> {
        if let Some(path) = self.state.read().ffmpeg.clone() {
            return Ok(path);
        }
        let path = discover("ffmpeg", self.config.ffmpeg_path.as_deref(), &[FFMPEG_PATH_ENV])
            .ok_or_else(|| Error::tool_not_found("ffmpeg"))?;
        self.state.write().ffmpeg = Some(path.clone());
        Ok(path)
    }

    /// Path to ffprobe.
    ///
    /// Like [`ToolCache::ffmpeg_path`], additionally trying the directory
    /// ffmpeg lives in before the well-known locations.
    pub fn ffprobe_path(&self) -> Result<PathBuf> {
        if let Some(path) = self.state.read().ffprobe.clone() {
            return Ok(path);
        }
        let path = self
            .ffprobe_candidate()
            .ok_or_else(|| Error::tool_not_found("ffprobe"))?;
        self.state.write().ffprobe = Some(path.clone());
        Ok(path)
    }

    fn ffprobe_candidate(&self) -> Option<PathBuf> {
        let explicit = self.config.ffprobe_path.as_deref();
        if let Some(path) = from_overrides(explicit, &[FFPROBE_PATH_ENV]) {
            return Some(path);
        }
        if let Ok(path) = which::which("ffprobe") {
            return Some(path);
        }
        if let Ok(ffmpeg) = self.ffmpeg_path() {
            let sibling = ffmpeg.with_file_name(exe_name("ffprobe"));
            if sibling.is_file() {
                tracing::debug!("Using ffprobe next to ffmpeg: {}", sibling.display());
                return Some(sibling);
            }
        }
        from_fallback_dirs("ffprobe")
    }

    /// Path to the FLV metadata fix-up tool: flvmeta, else flvtool2.
    pub fn flvtool_path(&self) -> Result<PathBuf> {
        if let Some(path) = self.state.read().flvtool.clone() {
            return Ok(path);
        }
        let path = from_overrides(
            self.config.flvtool_path.as_deref(),
            &[FLVMETA_PATH_ENV, FLVTOOL2_PATH_ENV],
        )
        .or_else(|| which::which("flvmeta").ok())
        .or_else(|| which::which("flvtool2").ok())
        .ok_or_else(|| Error::tool_not_found("flvtool2 or flvmeta"))?;
        self.state.write().flvtool = Some(path.clone());
        Ok(path)
    }

    /// Version reported by `ffmpeg -version`.
    pub async fn version(&self) -> Result<ToolVersion> {
        if let Some(version) = self.state.read().version.clone() {
            return Ok(version);
        }
        let out = ToolCommand::new(self.ffmpeg_path()?)
            .arg("-version")
            .execute()
            .await?;
        let version = ToolVersion::parse(&out.stdout)
            .ok_or_else(|| Error::process("could not parse ffmpeg version output"))?;
        self.state.write().version = Some(version.clone());
        Ok(version)
    }

    /// Formats known to ffmpeg (`-formats`).
    pub async fn formats(&self) -> Result<Arc<Formats>> {
        if let Some(formats) = self.state.read().formats.clone() {
            return Ok(formats);
        }
        let formats = Arc::new(parse_formats(&self.query("-formats").await?));
        self.state.write().formats = Some(Arc::clone(&formats));
        Ok(formats)
    }

    /// Codecs known to ffmpeg (`-codecs`).
    pub async fn codecs(&self) -> Result<Arc<Codecs>> {
        if let Some(codecs) = self.state.read().codecs.clone() {
            return Ok(codecs);
        }
        let codecs = Arc::new(parse_codecs(&self.query("-codecs").await?));
        self.state.write().codecs = Some(Arc::clone(&codecs));
        Ok(codecs)
    }

    /// Encoders known to ffmpeg (`-encoders`).
    pub async fn encoders(&self) -> Result<Arc<Encoders>> {
        if let Some(encoders) = self.state.read().encoders.clone() {
            return Ok(encoders);
        }
        let encoders = Arc::new(parse_encoders(&self.query("-encoders").await?));
        self.state.write().encoders = Some(Arc::clone(&encoders));
        Ok(encoders)
    }

    /// Filters known to ffmpeg (`-filters`).
    pub async fn filters(&self) -> Result<Arc<Filters>> {
        if let Some(filters) = self.state.read().filters.clone() {
            return Ok(filters);
        }
        let filters = Arc::new(parse_filters(&self.query("-filters").await?));
        self.state.write().filters = Some(Arc::clone(&filters));
        Ok(filters)
    }

    async fn query(&self, flag: &str) -> Result<String> {
        tracing::debug!("Querying ffmpeg {flag}");
        let out = ToolCommand::new(self.ffmpeg_path()?)
            .args(["-hide_banner", flag])
            .execute()
            .await?;
        Ok(out.stdout)
    }

    /// Availability of ffmpeg, ffprobe and the FLV fix-up tool.
    pub async fn report(&self) -> Vec<ToolInfo> {
        let mut infos = Vec::with_capacity(3);

        let ffmpeg = self.ffmpeg_path().ok();
        let version = match ffmpeg {
            Some(_) => self.version().await.ok().map(|v| v.raw),
            None => None,
        };
        infos.push(ToolInfo {
            name: "ffmpeg".into(),
            available: ffmpeg.is_some(),
            version,
            path: ffmpeg,
        });

        let ffprobe = self.ffprobe_path().ok();
        let version = match ffprobe {
            Some(ref path) => probe_version(path).await,
            None => None,
        };
        infos.push(ToolInfo {
            name: "ffprobe".into(),
            available: ffprobe.is_some(),
            version,
            path: ffprobe,
        });

        let flvtool = self.flvtool_path().ok();
        infos.push(ToolInfo {
            name: flvtool
                .as_deref()
                .and_then(Path::file_stem)
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "flvmeta".into()),
            available: flvtool.is_some(),
            version: None,
            path: flvtool,
        });

        infos
    }
}

async fn probe_version(path: &Path) -> Option<String> {
    let out = ToolCommand::new(path.to_path_buf())
        .arg("-version")
        .execute()
        .await
        .ok()?;
    ToolVersion::parse(&out.stdout).map(|v| v.raw)
}

fn exe_name(name: &str) -> String {
    format!("{name}{}", std::env::consts::EXE_SUFFIX)
}

/// Configured path, then the first environment variable naming an existing file.
fn from_overrides(explicit: Option<&Path>, env_vars: &[&str]) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::debug!("Configured path {} does not exist", path.display());
    }
    for var in env_vars {
        let Some(value) = std::env::var_os(var).filter(|v| !v.is_empty()) else {
            continue;
        };
        let path = PathBuf::from(value);
        if path.exists() {
            return Some(path);
        }
        tracing::debug!("{var}={} does not exist; ignoring", path.display());
    }
    None
}

fn from_fallback_dirs(name: &str) -> Option<PathBuf> {
    FALLBACK_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(exe_name(name)))
        .find(|p| p.is_file())
}

fn discover(name: &str, explicit: Option<&Path>, env_vars: &[&str]) -> Option<PathBuf> {
    from_overrides(explicit, env_vars)
        .or_else(|| which::which(name).ok())
        .or_else(|| from_fallback_dirs(name))
}
