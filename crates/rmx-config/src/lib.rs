//! Config file loading and settings resolution.
//!
//! Values flow in two layers: an optional YAML file supplies defaults, CLI
//! flags override them. Resolution and validation happen in one place
//! ([`Settings::resolve`]) so both binaries agree on precedence.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Fallback bind address for the daemon.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Fallback refresh interval in seconds (one hour, like the classic cron
/// cadence for registry mirrors).
pub const DEFAULT_REFRESH_SECS: u64 = 3600;

// ---------------------------------------------------------------------------
// File layer
// ---------------------------------------------------------------------------

/// The raw config file. Every key is optional; absence means "defer to the
/// CLI flag or the built-in default".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Local dump files.
    pub files: Option<Vec<String>>,
    /// Remote dump URLs (http/https/ftp).
    pub urls: Option<Vec<String>>,
    /// Authoritative export URL.
    pub rpki: Option<String>,
    /// Refresh interval for continuous mode.
    pub refresh_secs: Option<u64>,
    /// Append covered registry routes instead of dropping them.
    #[serde(rename = "unsafe")]
    pub unsafe_merge: Option<bool>,
    /// Daemon bind address.
    pub listen: Option<String>,
    /// One-shot output path.
    pub output: Option<String>,
}

impl FileConfig {
    /// Parse YAML. An empty document is a valid, empty config.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let cfg: Option<FileConfig> = serde_yaml::from_str(raw).context("invalid yaml")?;
        Ok(cfg.unwrap_or_default())
    }
}

/// Probe order when no explicit `--config` path is given: `RMX_CONFIG`
/// first, then the working directory, then the system location.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(3);
    if let Ok(env_path) = std::env::var("RMX_CONFIG") {
        if !env_path.is_empty() {
            paths.push(PathBuf::from(env_path));
        }
    }
    paths.push(PathBuf::from("roamix.yaml"));
    paths.push(PathBuf::from("/etc/roamix/roamix.yaml"));
    paths
}

/// Load the config file layer.
///
/// An explicit path must exist and parse; without one, the candidate
/// locations are probed in order and a complete miss yields the empty
/// config. The returned path is the file actually used, for logging.
pub fn load_file_config(explicit: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let cfg = read_config_file(path)?;
        return Ok((cfg, Some(path.to_path_buf())));
    }

    for path in candidate_paths() {
        if path.is_file() {
            let cfg = read_config_file(&path)?;
            return Ok((cfg, Some(path)));
        }
    }

    Ok((FileConfig::default(), None))
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    FileConfig::from_yaml_str(&raw)
        .with_context(|| format!("invalid config file: {}", path.display()))
}

// ---------------------------------------------------------------------------
// Flag layer
// ---------------------------------------------------------------------------

/// CLI-provided values. Lists override the file layer only when non-empty;
/// the `unsafe` flag can force the policy on but never off.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub files: Vec<String>,
    pub urls: Vec<String>,
    pub rpki: Option<String>,
    pub refresh_secs: Option<u64>,
    pub unsafe_merge: bool,
    pub listen: Option<String>,
    pub output: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Fully resolved, validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub files: Vec<String>,
    pub urls: Vec<String>,
    pub rpki: String,
    pub refresh: Duration,
    pub unsafe_merge: bool,
    pub listen: String,
    pub output: Option<String>,
}

impl Settings {
    /// Merge the two layers and validate.
    ///
    /// A run needs at least one registry source and an authoritative export
    /// location; a zero refresh interval is rejected rather than spinning.
    pub fn resolve(file: FileConfig, ov: Overrides) -> Result<Self> {
        let files = if ov.files.is_empty() {
            file.files.unwrap_or_default()
        } else {
            ov.files
        };
        let urls = if ov.urls.is_empty() {
            file.urls.unwrap_or_default()
        } else {
            ov.urls
        };

        let rpki = match ov.rpki.or(file.rpki) {
            Some(u) => u,
            None => bail!("no authoritative export location configured (--rpki or config 'rpki')"),
        };

        if files.is_empty() && urls.is_empty() {
            bail!("no registry sources configured (--file/--irrdb or config 'files'/'urls')");
        }

        let refresh_secs = ov
            .refresh_secs
            .or(file.refresh_secs)
            .unwrap_or(DEFAULT_REFRESH_SECS);
        if refresh_secs == 0 {
            bail!("refresh interval must be positive");
        }

        Ok(Settings {
            files,
            urls,
            rpki,
            refresh: Duration::from_secs(refresh_secs),
            unsafe_merge: ov.unsafe_merge || file.unsafe_merge.unwrap_or(false),
            listen: ov
                .listen
                .or(file.listen)
                .unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            output: ov.output.or(file.output),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
