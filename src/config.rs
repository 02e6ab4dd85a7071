//! Upload imaging configuration.
//!
//! Settings are read once from a `config.toml` (by default the one inside the
//! library directory) into an [`UploadConfig`] value that is passed down
//! explicitly. Nothing in the crate looks settings up on its own.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [resize]
//! enabled = false           # Scale uploads down to fit max_size
//! max_size = 100            # Longest allowed edge in pixels
//!
//! [watermark]
//! enabled = false           # Composite the watermark asset onto uploads
//! # path = "watermark.png"  # Asset path, relative to assets_dir
//! position = "bottom-right" # top-left, top, top-right, left, center,
//!                           # right, bottom-left, bottom, bottom-right
//! assets_dir = "assets"     # Relative to the library directory
//!
//! [library]
//! public_url = "/assets/files" # Prefix of public file URLs
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{NormalizeConfig, Watermark, WatermarkPosition};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest edge used when resizing is enabled without an explicit bound.
pub const DEFAULT_MAX_IMAGE_SIZE: u32 = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Cannot read watermark {path}: {source}")]
    WatermarkAsset {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub resize: ResizeConfig,
    pub watermark: WatermarkConfig,
    pub library: LibraryConfig,
    pub processing: ProcessingConfig,
}

/// Resize-to-bound settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub enabled: bool,
    pub max_size: u32,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

/// Watermark overlay settings.
///
/// An enabled watermark without a `path` does nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub position: WatermarkPosition,
    pub assets_dir: String,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            position: WatermarkPosition::default(),
            assets_dir: "assets".to_string(),
        }
    }
}

/// Where stored files are served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    pub public_url: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            public_url: "/assets/files".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel normalization workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

impl UploadConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resize.max_size == 0 {
            return Err(ConfigError::Validation(
                "resize.max_size must be greater than 0".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Path of the watermark asset, if watermarking is active.
    pub fn watermark_path(&self, base_dir: &Path) -> Option<PathBuf> {
        if !self.watermark.enabled {
            return None;
        }
        let path = self.watermark.path.as_deref()?;
        Some(base_dir.join(&self.watermark.assets_dir).join(path))
    }

    /// Resolve the settings of one normalization pass, loading the watermark
    /// asset relative to `base_dir`.
    pub fn normalize_config(&self, base_dir: &Path) -> Result<NormalizeConfig, ConfigError> {
        let watermark = match self.watermark_path(base_dir) {
            Some(path) => {
                let bytes = fs::read(&path)
                    .map_err(|source| ConfigError::WatermarkAsset { path, source })?;
                Some(Watermark {
                    bytes,
                    position: self.watermark.position,
                })
            }
            None => None,
        };
        Ok(NormalizeConfig {
            max_size: self.resize.enabled.then_some(self.resize.max_size),
            watermark,
        })
    }
}

/// Load config from a `config.toml` file.
///
/// A missing file yields the defaults. Unknown keys and out-of-range values
/// are errors.
pub fn load_config(path: &Path) -> Result<UploadConfig, ConfigError> {
    if !path.exists() {
        return Ok(UploadConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: UploadConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Upload Imaging Configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Resize-to-bound
# ---------------------------------------------------------------------------
[resize]
# Scale JPEG/PNG uploads down so neither edge exceeds max_size.
# Smaller images are never enlarged.
enabled = false

# Longest allowed edge in pixels.
max_size = 100

# ---------------------------------------------------------------------------
# Watermark
# ---------------------------------------------------------------------------
[watermark]
# Composite an image onto every JPEG/PNG upload.
enabled = false

# Watermark asset, relative to assets_dir. Nothing is applied while unset.
# path = "watermark.png"

# Anchor: top-left, top, top-right, left, center, right,
# bottom-left, bottom, bottom-right.
position = "bottom-right"

# Directory holding the watermark asset, relative to the library.
assets_dir = "assets"

# ---------------------------------------------------------------------------
# Library
# ---------------------------------------------------------------------------
[library]
# Prefix of the public URL of stored files.
public_url = "/assets/files"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for batch normalization. Omit for auto (CPU cores).
# max_processes = 4
"##
}
