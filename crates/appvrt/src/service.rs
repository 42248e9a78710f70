//! Boundary with the collaborators that drive the device: the visual
//! comparison service, the capture primitive and the raw screenshot
//! primitive. Their results come in several shapes and are normalized here,
//! once, into the types the rest of the crate works with.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonKind {
    #[default]
    Screen,
    Element,
    FullPage,
    TabbablePage,
}

/// Opaque reference to a UI element, owned by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareOptions {
    /// Selectors whose elements are hidden before capturing.
    #[serde(default)]
    pub hide_elements: Vec<String>,
    /// Service-specific options passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    /// Human-chosen identifier; not unique across a run.
    pub tag: String,
    pub kind: ComparisonKind,
    pub element: Option<ElementHandle>,
    pub options: CompareOptions,
}

impl ComparisonRequest {
    pub fn screen(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            kind: ComparisonKind::Screen,
            element: None,
            options: CompareOptions::default(),
        }
    }

    pub fn element(element: ElementHandle, tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            kind: ComparisonKind::Element,
            element: Some(element),
            options: CompareOptions::default(),
        }
    }

    pub fn full_page(tag: impl Into<String>) -> Self {
        Self {
            kind: ComparisonKind::FullPage,
            ..Self::screen(tag)
        }
    }

    pub fn tabbable_page(tag: impl Into<String>) -> Self {
        Self {
            kind: ComparisonKind::TabbablePage,
            ..Self::screen(tag)
        }
    }

    pub fn with_options(mut self, options: CompareOptions) -> Self {
        self.options = options;
        self
    }
}

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Root folders the comparison service reads baselines from and writes
/// actual captures to, when it exposes them.
#[derive(Debug, Clone, Default)]
pub struct ServiceFolders {
    pub baseline: Option<PathBuf>,
    pub actual: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Comparison results
// ---------------------------------------------------------------------------

/// Mismatch as reported by the service: a percentage (0-100) given as a
/// number, a numeric string, or nested inside an object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawMismatch(pub Value);

const MISMATCH_KEYS: [&str; 4] = ["misMatchPercentage", "mismatchPercentage", "mismatch", "value"];

impl RawMismatch {
    pub fn percent(pct: f64) -> Self {
        Self(Value::from(pct))
    }

    /// Convert to a fraction in [0, 1]. `None` when no usable number is found.
    pub fn fraction(&self) -> Option<f64> {
        percent_of(&self.0).map(|pct| (pct / 100.0).clamp(0.0, 1.0))
    }
}

fn percent_of(value: &Value) -> Option<f64> {
    let pct = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        Value::Object(map) => {
            return MISMATCH_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(percent_of));
        }
        _ => return None,
    };
    (pct.is_finite() && pct >= 0.0).then_some(pct)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFolders {
    #[serde(default)]
    pub baseline: Option<PathBuf>,
    #[serde(alias = "current")]
    pub actual: PathBuf,
    #[serde(default)]
    pub diff: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonPayload {
    #[serde(default, alias = "misMatchPercentage", alias = "mismatchPercentage")]
    pub mismatch: RawMismatch,
    pub folders: RawFolders,
}

/// What `compare` hands back: one payload, or one per device/instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawComparison {
    Flat(ComparisonPayload),
    PerDevice(BTreeMap<String, ComparisonPayload>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonFolders {
    pub baseline: Option<PathBuf>,
    pub current: PathBuf,
    pub diff: Option<PathBuf>,
}

/// Canonical comparison result.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    /// Fraction of differing pixels; `None` when the service gave nothing usable.
    pub mismatch: Option<f64>,
    pub folders: ComparisonFolders,
    /// Device/instance id the result was taken from, for keyed results.
    pub device: Option<String>,
}

impl ComparisonPayload {
    fn into_result(self, device: Option<String>) -> ComparisonResult {
        ComparisonResult {
            mismatch: self.mismatch.fraction(),
            folders: ComparisonFolders {
                baseline: self.folders.baseline,
                current: self.folders.actual,
                diff: self.folders.diff,
            },
            device,
        }
    }
}

impl RawComparison {
    /// Collapse to a single result. A keyed result reduces to its worst
    /// device (highest mismatch; ties keep the first key). `None` for an
    /// empty map.
    pub fn normalize(self) -> Option<ComparisonResult> {
        match self {
            Self::Flat(payload) => Some(payload.into_result(None)),
            Self::PerDevice(map) => {
                let mut worst: Option<ComparisonResult> = None;
                for (device, payload) in map {
                    let candidate = payload.into_result(Some(device));
                    let replace = match &worst {
                        None => true,
                        Some(current) => {
                            candidate.mismatch.unwrap_or(-1.0) > current.mismatch.unwrap_or(-1.0)
                        }
                    };
                    if replace {
                        worst = Some(candidate);
                    }
                }
                worst
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Capture results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedImage {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl SavedImage {
    fn full_path(&self) -> Option<PathBuf> {
        match (&self.path, &self.file_name) {
            (Some(dir), Some(name)) => Some(dir.join(name)),
            _ => None,
        }
    }
}

/// Keyed is tried first: every field of `SavedImage` is optional, so any
/// object would otherwise parse as flat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCapture {
    PerDevice(BTreeMap<String, SavedImage>),
    Flat(SavedImage),
}

impl RawCapture {
    /// Path of the saved file: the flat entry, or the first keyed entry
    /// carrying both a directory and a file name.
    pub fn saved_path(&self) -> Option<PathBuf> {
        match self {
            Self::Flat(img) => img.full_path(),
            Self::PerDevice(map) => map.values().find_map(SavedImage::full_path),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Visual comparison service: compares a capture against its baseline.
pub trait VisualService {
    fn folders(&self) -> ServiceFolders;

    /// Fails with a message containing `Baseline image not found` when the
    /// tag has no approved baseline.
    fn compare(
        &self,
        request: &ComparisonRequest,
    ) -> impl Future<Output = Result<RawComparison, ServiceError>> + Send;
}

/// Capture primitive matching the request kind (screen, element, ...).
pub trait CaptureService {
    fn save(
        &self,
        request: &ComparisonRequest,
        target_dir: &Path,
    ) -> impl Future<Output = Result<RawCapture, ServiceError>> + Send;
}

/// Raw full-screen capture, independent of the comparison service.
pub trait ScreenshotService {
    fn save_screenshot(&self, path: &Path) -> impl Future<Output = Result<(), ServiceError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mismatch_accepts_number_string_and_object() {
        assert_eq!(RawMismatch(json!(5)).fraction(), Some(0.05));
        assert_eq!(RawMismatch(json!("0.5")).fraction(), Some(0.005));
        assert_eq!(RawMismatch(json!("12.5%")).fraction(), Some(0.125));
        assert_eq!(
            RawMismatch(json!({ "misMatchPercentage": 2 })).fraction(),
            Some(0.02)
        );
        assert_eq!(
            RawMismatch(json!({ "result": 1, "mismatch": { "value": "50" } })).fraction(),
            Some(0.5)
        );
    }

    #[test]
    fn mismatch_rejects_unusable_values() {
        assert_eq!(RawMismatch(json!(null)).fraction(), None);
        assert_eq!(RawMismatch(json!("abc")).fraction(), None);
        assert_eq!(RawMismatch(json!(-3)).fraction(), None);
        assert_eq!(RawMismatch(json!({ "other": 4 })).fraction(), None);
        assert_eq!(RawMismatch(json!([1, 2])).fraction(), None);
    }

    #[test]
    fn mismatch_is_clamped() {
        assert_eq!(RawMismatch(json!(250)).fraction(), Some(1.0));
    }

    #[test]
    fn flat_json_normalizes() {
        let raw: RawComparison = serde_json::from_value(json!({
            "misMatchPercentage": 1.5,
            "folders": { "actual": "/out/actual/home.png", "baseline": "/base/home.png" }
        }))
        .unwrap();
        let r = raw.normalize().unwrap();
        assert_eq!(r.mismatch, Some(0.015));
        assert_eq!(r.folders.current, PathBuf::from("/out/actual/home.png"));
        assert_eq!(r.folders.baseline, Some(PathBuf::from("/base/home.png")));
        assert_eq!(r.folders.diff, None);
        assert_eq!(r.device, None);
    }

    #[test]
    fn device_keyed_json_picks_worst_device() {
        let raw: RawComparison = serde_json::from_value(json!({
            "pixel-8": { "mismatch": 0.2, "folders": { "actual": "/a/p8.png" } },
            "iphone-15": { "mismatch": "3.1", "folders": { "actual": "/a/i15.png" } },
            "tablet": { "mismatch": null, "folders": { "actual": "/a/t.png" } }
        }))
        .unwrap();
        assert!(matches!(raw, RawComparison::PerDevice(_)));
        let r = raw.normalize().unwrap();
        assert_eq!(r.device.as_deref(), Some("iphone-15"));
        assert!((r.mismatch.unwrap() - 0.031).abs() < 1e-12);
    }

    #[test]
    fn empty_device_map_normalizes_to_none() {
        assert!(RawComparison::PerDevice(BTreeMap::new()).normalize().is_none());
    }

    #[test]
    fn capture_paths_from_both_shapes() {
        let flat: RawCapture =
            serde_json::from_value(json!({ "path": "/p", "fileName": "a.png" })).unwrap();
        assert_eq!(flat.saved_path(), Some(PathBuf::from("/p/a.png")));

        let keyed: RawCapture = serde_json::from_value(json!({
            "a": { "path": "/p" },
            "b": { "path": "/q", "fileName": "b.png" }
        }))
        .unwrap();
        assert_eq!(keyed.saved_path(), Some(PathBuf::from("/q/b.png")));
    }
}
