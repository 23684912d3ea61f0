//! Layered configuration.
//!
//! Defaults < config file < command-line flags. The file lives at
//! `$XDG_CONFIG_HOME/photark/config.toml` unless `PHOTARK_CONFIG` or
//! `--config` points elsewhere. The merged result is immutable and passed
//! down into the stages; nothing reads configuration globally.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub planner: PlannerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            scanner: ScannerConfig::default(),
            extractor: ExtractorConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photark")
        .join("catalog.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Print a status line every N files.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Seconds of silence before the "scanning" indicator prints anyway.
    #[serde(default = "default_stats_update_interval")]
    pub stats_update_interval: u64,

    /// Retry a transient stat error once before skipping the file.
    #[serde(default = "default_retry_io_errors")]
    pub retry_io_errors: bool,

    /// Entries with longer absolute paths are skipped with a warning.
    #[serde(default = "default_max_path_length")]
    pub max_path_length: usize,
}

fn default_progress_interval() -> u64 {
    1000
}

fn default_stats_update_interval() -> u64 {
    5
}

fn default_retry_io_errors() -> bool {
    true
}

fn default_max_path_length() -> usize {
    4096
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            progress_interval: default_progress_interval(),
            stats_update_interval: default_stats_update_interval(),
            retry_io_errors: default_retry_io_errors(),
            max_path_length: default_max_path_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Default selection strategy: "full" or "selective".
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Cap on files processed per run; unset means everything selected.
    #[serde(default)]
    pub limit: Option<usize>,

    /// Files handed to one exiftool invocation.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Files below this size are skipped as likely corrupt or placeholder.
    /// A typical JPEG thumbnail is ~10 KB; the smallest valid RAW is ~1 MB.
    #[serde(default = "default_min_file_size_bytes")]
    pub min_file_size_bytes: u64,

    /// Deadline for one batch invocation before retry and fallback.
    #[serde(default = "default_batch_timeout_seconds")]
    pub batch_timeout_seconds: u64,
}

fn default_strategy() -> String {
    "selective".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_min_file_size_bytes() -> u64 {
    10 * 1024
}

fn default_batch_timeout_seconds() -> u64 {
    300
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            limit: None,
            batch_size: default_batch_size(),
            min_file_size_bytes: default_min_file_size_bytes(),
            batch_timeout_seconds: default_batch_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Below this share of dated images a folder goes to _mixed_dates.
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,

    /// At or above this agreement on one date, the folder adopts it.
    #[serde(default = "default_min_prevalence")]
    pub min_prevalence: f64,

    /// At or above this calendar-month spread a folder goes to _mixed_dates.
    #[serde(default = "default_max_date_span_months")]
    pub max_date_span_months: i64,

    /// Annotation cap in characters.
    #[serde(default = "default_max_annotation_length")]
    pub max_annotation_length: usize,

    /// Extensions counted as images for coverage statistics. Videos are
    /// deliberately absent; folder date consensus reads images only.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Video extensions; these never count toward coverage but do qualify a
    /// sibling as a sidecar counterpart (Canon THM rides with MOV).
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,

    /// Extensions that can ride along as sidecars.
    #[serde(default = "default_sidecar_extensions")]
    pub sidecar_extensions: Vec<String>,
}

fn default_min_coverage() -> f64 {
    0.30
}

fn default_min_prevalence() -> f64 {
    0.80
}

fn default_max_date_span_months() -> i64 {
    3
}

fn default_max_annotation_length() -> usize {
    10
}

fn default_image_extensions() -> Vec<String> {
    [
        "arw", "jpg", "jpeg", "nef", "dng", "tif", "tiff", "heic", "cr2", "srw", "png", "psd",
        "bmp", "gif",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_video_extensions() -> Vec<String> {
    ["mp4", "m4v", "mov", "mkv", "avi", "mts", "m2ts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_sidecar_extensions() -> Vec<String> {
    ["xmp", "json", "xml", "thm", "aae"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_coverage: default_min_coverage(),
            min_prevalence: default_min_prevalence(),
            max_date_span_months: default_max_date_span_months(),
            max_annotation_length: default_max_annotation_length(),
            image_extensions: default_image_extensions(),
            video_extensions: default_video_extensions(),
            sidecar_extensions: default_sidecar_extensions(),
        }
    }
}

impl Config {
    /// Load from the default location, `PHOTARK_CONFIG` overriding it. A
    /// missing file is just the defaults.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os("PHOTARK_CONFIG") {
            Some(p) => PathBuf::from(p),
            None => Self::config_dir().join("config.toml"),
        };
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("photark")
    }
}
