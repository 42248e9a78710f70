pub mod resolve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use self::resolve::{Overrides, VisualConfig};

pub const ENV_TOLERANCE: &str = "VISUAL_MISMATCH_TOLERANCE";
pub const ENV_REPORT_DIR: &str = "VISUAL_REPORT_DIR";
pub const ENV_PENDING_DIR: &str = "VISUAL_BASELINE_PENDING_DIR";
pub const ENV_IMAGE_SCALE: &str = "VISUAL_REPORT_IMAGE_SCALE";
pub const ENV_IMAGE_QUALITY: &str = "VISUAL_REPORT_IMAGE_QUALITY";

/// `[visual]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisualSection {
    /// Fraction (`0.01`), percentage (`1`) or `"1%"`.
    #[serde(default)]
    pub tolerance: Option<ToleranceValue>,
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
    #[serde(default)]
    pub pending_dir: Option<PathBuf>,
    /// Per-pixel perceptual threshold (0.0-1.0).
    #[serde(default)]
    pub pixel_threshold: Option<f64>,
}

/// `[report_images]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportImagesSection {
    /// Downscale factor in (0, 1]. 1 keeps images untouched.
    #[serde(default)]
    pub scale: Option<f64>,
    /// 1-100.
    #[serde(default)]
    pub quality: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToleranceValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub visual: VisualSection,
    #[serde(default)]
    pub report_images: ReportImagesSection,
}

pub fn validate_scale(v: f64) -> Result<f64, String> {
    if !(v > 0.0 && v <= 1.0) {
        return Err(format!("scale must be greater than 0.0 and at most 1.0, got {v}"));
    }
    Ok(v)
}

pub fn validate_quality(v: u8) -> Result<u8, String> {
    if !(1..=100).contains(&v) {
        return Err(format!("quality must be between 1 and 100, got {v}"));
    }
    Ok(v)
}

pub fn validate_pixel_threshold(v: f64) -> Result<f64, String> {
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("pixel_threshold must be between 0.0 and 1.0, got {v}"));
    }
    Ok(v)
}

pub fn parse(content: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(content).context("Failed to parse visual config")?;
    if let Some(v) = config.visual.pixel_threshold {
        validate_pixel_threshold(v).map_err(|e| anyhow::anyhow!("visual.{e}"))?;
    }
    if let Some(v) = config.report_images.scale {
        validate_scale(v).map_err(|e| anyhow::anyhow!("report_images.{e}"))?;
    }
    if let Some(v) = config.report_images.quality {
        validate_quality(v).map_err(|e| anyhow::anyhow!("report_images.{e}"))?;
    }
    Ok(config)
}

/// Load `path` if it exists. A missing file is an empty layer, not an error.
pub fn load_optional(path: &Path) -> Result<FileConfig> {
    if !path.is_file() {
        return Ok(FileConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
}
