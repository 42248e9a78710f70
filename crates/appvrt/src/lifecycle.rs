//! Compare, and when the tag has no approved baseline, stage the current
//! capture as a pending one instead of failing.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{IssueKind, VisualError};
use crate::service::{CaptureService, ComparisonRequest, ComparisonResult, VisualService};
use crate::store;

/// Substring the comparison service puts in its error when a tag has no baseline.
pub const BASELINE_MISSING_MARKER: &str = "Baseline image not found";

static ACTUAL_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"The image can be found here:\r?\n([^\r\n]+)").expect("actual-path regex compiles")
});

pub fn is_baseline_missing(message: &str) -> bool {
    message.contains(BASELINE_MISSING_MARKER)
}

/// Actual capture path named on the line after `The image can be found here:`.
pub fn extract_actual_path(message: &str) -> Option<PathBuf> {
    let captured = ACTUAL_PATH.captures(message)?.get(1)?.as_str().trim();
    (!captured.is_empty()).then(|| PathBuf::from(captured))
}

/// Outcome of a missing-baseline recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingBaseline {
    pub tag: String,
    /// Staged candidate; `None` when neither the service output nor a fresh
    /// capture could be saved.
    pub pending: Option<PathBuf>,
    /// Folder the candidate must be moved into to become the baseline.
    pub destination: PathBuf,
}

impl MissingBaseline {
    pub fn message(&self) -> String {
        match &self.pending {
            Some(pending) => format!(
                "Missing baseline for \"{}\". Saved pending baseline at {}. Move it into {} to enable comparison.",
                self.tag,
                pending.display(),
                self.destination.display()
            ),
            None => format!(
                "Missing baseline for \"{}\". Unable to save pending baseline. Move the screenshot into {} manually.",
                self.tag,
                self.destination.display()
            ),
        }
    }
}

/// Terminal states of one comparison. Anything else is `VisualError::Fatal`.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ComparisonResult),
    /// The service answered with an empty device map.
    Empty,
    BaselineMissing(MissingBaseline),
}

impl Resolution {
    /// Mismatch the gate should act on; a missing baseline counts as zero.
    pub fn mismatch(&self) -> Option<f64> {
        match self {
            Self::Resolved(result) => result.mismatch,
            Self::Empty => None,
            Self::BaselineMissing(_) => Some(0.0),
        }
    }
}

pub struct BaselineManager<C> {
    capture: C,
    pending_root: PathBuf,
    default_baseline_root: PathBuf,
}

impl<C: CaptureService + Sync> BaselineManager<C> {
    pub fn new(capture: C, pending_root: PathBuf, default_baseline_root: PathBuf) -> Self {
        Self {
            capture,
            pending_root,
            default_baseline_root,
        }
    }

    pub async fn resolve<V: VisualService + Sync>(
        &self,
        service: &V,
        request: &ComparisonRequest,
    ) -> Result<Resolution, VisualError> {
        match service.compare(request).await {
            Ok(raw) => Ok(raw.normalize().map_or(Resolution::Empty, Resolution::Resolved)),
            Err(e) if is_baseline_missing(&e.message) => {
                let missing = self.stage_missing(service, request, &e.message).await;
                Ok(Resolution::BaselineMissing(missing))
            }
            Err(e) => Err(VisualError::Fatal {
                tag: request.tag.clone(),
                message: e.message,
            }),
        }
    }

    async fn stage_missing<V: VisualService + Sync>(
        &self,
        service: &V,
        request: &ComparisonRequest,
        message: &str,
    ) -> MissingBaseline {
        let folders = service.folders();

        let mut pending = extract_actual_path(message)
            .filter(|p| p.is_file())
            .and_then(|actual| {
                match store::stage_pending(&self.pending_root, &actual, folders.actual.as_deref()) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(
                            tag = %request.tag,
                            issue = ?IssueKind::Infrastructure,
                            "Failed to copy pending baseline: {e:#}"
                        );
                        None
                    }
                }
            });

        if pending.is_none() {
            debug!(tag = %request.tag, "No actual capture in error; capturing into pending root");
            pending = self.capture_pending(request).await;
        }

        let missing = MissingBaseline {
            tag: request.tag.clone(),
            pending,
            destination: folders
                .baseline
                .unwrap_or_else(|| self.default_baseline_root.clone()),
        };
        warn!(tag = %missing.tag, issue = ?IssueKind::BaselineMissing, "{}", missing.message());
        missing
    }

    async fn capture_pending(&self, request: &ComparisonRequest) -> Option<PathBuf> {
        if let Err(e) = std::fs::create_dir_all(&self.pending_root) {
            warn!(
                path = %self.pending_root.display(),
                issue = ?IssueKind::Infrastructure,
                "Failed to create pending root: {e}"
            );
            return None;
        }
        match self.capture.save(request, &self.pending_root).await {
            Ok(output) => output.saved_path(),
            Err(e) => {
                warn!(tag = %request.tag, issue = ?IssueKind::Infrastructure, "Capture fallback failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_marker() {
        assert!(is_baseline_missing(
            "Error: Baseline image not found, save the actual image manually"
        ));
        assert!(!is_baseline_missing("timeout waiting for element"));
    }

    #[test]
    fn extracts_path_from_following_line() {
        let msg = "Baseline image not found.\nThe image can be found here:\n  /tmp/actual/home.png  \nmore text";
        assert_eq!(
            extract_actual_path(msg),
            Some(PathBuf::from("/tmp/actual/home.png"))
        );
        assert_eq!(extract_actual_path("Baseline image not found."), None);
        assert_eq!(
            extract_actual_path("The image can be found here:\r\nC:\\out\\a.png"),
            Some(PathBuf::from("C:\\out\\a.png"))
        );
    }

    #[test]
    fn message_names_both_paths() {
        let m = MissingBaseline {
            tag: "home".into(),
            pending: Some(PathBuf::from("report/visual-baseline-pending/home.png")),
            destination: PathBuf::from("report/visual-baseline"),
        };
        let msg = m.message();
        assert!(msg.contains("report/visual-baseline-pending/home.png"));
        assert!(msg.contains("Move it into report/visual-baseline"));

        let manual = MissingBaseline { pending: None, ..m };
        assert!(manual.message().contains("manually"));
    }

    #[test]
    fn missing_baseline_counts_as_zero() {
        let r = Resolution::BaselineMissing(MissingBaseline {
            tag: "x".into(),
            pending: None,
            destination: PathBuf::new(),
        });
        assert_eq!(r.mismatch(), Some(0.0));
        assert_eq!(Resolution::Empty.mismatch(), None);
    }
}
