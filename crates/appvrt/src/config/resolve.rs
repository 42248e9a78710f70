use std::path::{Path, PathBuf};

use super::{
    ENV_IMAGE_QUALITY, ENV_IMAGE_SCALE, ENV_PENDING_DIR, ENV_REPORT_DIR, ENV_TOLERANCE,
    FileConfig, ToleranceValue, load_optional, validate_pixel_threshold, validate_quality,
    validate_scale,
};
use crate::compare::DEFAULT_THRESHOLD;
use crate::error::VisualError;
use crate::gate::Tolerance;
use crate::report::CompressionSettings;
use crate::store::{DEFAULT_REPORT_DIR, ReportLayout};

/// Values set programmatically by the harness; they win over everything.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub tolerance: Option<Tolerance>,
    pub report_dir: Option<PathBuf>,
    pub pending_dir: Option<PathBuf>,
    pub pixel_threshold: Option<f64>,
    pub image_scale: Option<f64>,
    pub image_quality: Option<u8>,
}

/// Fully resolved config after overrides > env > file > defaults merge.
#[derive(Debug, Clone)]
pub struct VisualConfig {
    pub tolerance: Tolerance,
    pub report_dir: PathBuf,
    /// `None` means `<report_dir>/visual-baseline-pending`.
    pub pending_dir: Option<PathBuf>,
    pub pixel_threshold: f64,
    pub compression: CompressionSettings,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            pending_dir: None,
            pixel_threshold: DEFAULT_THRESHOLD,
            compression: CompressionSettings::default(),
        }
    }
}

impl VisualConfig {
    /// Resolve against the process environment and an optional config file.
    pub fn new(overrides: Overrides, config_file: Option<&Path>) -> Result<Self, VisualError> {
        let file = match config_file {
            Some(path) => load_optional(path).map_err(|e| VisualError::Config(format!("{e:#}")))?,
            None => FileConfig::default(),
        };
        Self::resolve(overrides, |key| std::env::var(key).ok(), file)
    }

    /// Merge the layers. `env` is injected so the merge can be exercised
    /// without touching the process environment.
    pub fn resolve(
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
        file: FileConfig,
    ) -> Result<Self, VisualError> {
        let defaults = Self::default();
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // 1. Env layer
        let env_tolerance = env(ENV_TOLERANCE)
            .map(|v| Tolerance::parse(&v))
            .transpose()
            .map_err(|e| VisualError::Config(format!("{ENV_TOLERANCE}: {e}")))?;
        let env_scale = env(ENV_IMAGE_SCALE)
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| format!("{ENV_IMAGE_SCALE} must be a number, got {v:?}"))
            })
            .transpose()
            .map_err(VisualError::Config)?;
        let env_quality = env(ENV_IMAGE_QUALITY)
            .map(|v| {
                v.parse::<u8>()
                    .map_err(|_| format!("{ENV_IMAGE_QUALITY} must be an integer 1-100, got {v:?}"))
            })
            .transpose()
            .map_err(VisualError::Config)?;

        // 2. File layer
        let file_tolerance = file
            .visual
            .tolerance
            .map(|v| match v {
                ToleranceValue::Number(n) => Ok(Tolerance::new(n)),
                ToleranceValue::Text(s) => Tolerance::parse(&s),
            })
            .transpose()
            .map_err(|e| VisualError::Config(format!("visual.{e}")))?;

        // 3. Overrides > env > file > defaults
        let tolerance = overrides
            .tolerance
            .or(env_tolerance)
            .or(file_tolerance)
            .unwrap_or(defaults.tolerance);

        let report_dir = overrides
            .report_dir
            .or_else(|| env(ENV_REPORT_DIR).map(PathBuf::from))
            .or(file.visual.report_dir)
            .unwrap_or(defaults.report_dir);

        let pending_dir = overrides
            .pending_dir
            .or_else(|| env(ENV_PENDING_DIR).map(PathBuf::from))
            .or(file.visual.pending_dir);

        let pixel_threshold = overrides
            .pixel_threshold
            .or(file.visual.pixel_threshold)
            .unwrap_or(defaults.pixel_threshold);
        validate_pixel_threshold(pixel_threshold).map_err(VisualError::Config)?;

        let scale = overrides
            .image_scale
            .or(env_scale)
            .or(file.report_images.scale)
            .unwrap_or(defaults.compression.scale);
        validate_scale(scale).map_err(VisualError::Config)?;

        let quality = overrides
            .image_quality
            .or(env_quality)
            .or(file.report_images.quality)
            .unwrap_or(defaults.compression.quality);
        validate_quality(quality).map_err(VisualError::Config)?;

        Ok(Self {
            tolerance,
            report_dir,
            pending_dir,
            pixel_threshold,
            compression: CompressionSettings { scale, quality },
        })
    }

    pub fn layout(&self) -> ReportLayout {
        ReportLayout::new(&self.report_dir, self.pending_dir.clone())
    }
}
