//! Non-visual evidence: raw screenshots taken when a test ends, and the
//! end-of-suite compression pass over everything written for the report.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::config::VisualConfig;
use crate::error::IssueKind;
use crate::report::{
    CompressOutcome, CompressionSettings, JsonLinesSink, ReportEntry, ReportSink, compress_file,
    naming,
};
use crate::service::ScreenshotService;
use crate::store::{self, ReportLayout};

pub struct EvidenceRecorder<S> {
    screenshots: S,
    layout: ReportLayout,
    compression: CompressionSettings,
    sink: Box<dyn ReportSink>,
    /// Also capture passing tests into `finalShots`.
    final_shots: bool,
}

impl<S: ScreenshotService + Sync> EvidenceRecorder<S> {
    pub fn new(screenshots: S, config: &VisualConfig, sink: Box<dyn ReportSink>) -> Self {
        Self {
            screenshots,
            layout: config.layout(),
            compression: config.compression,
            sink,
            final_shots: false,
        }
    }

    pub fn with_report_file(screenshots: S, config: &VisualConfig) -> Self {
        let sink = JsonLinesSink::new(config.layout().context_file());
        Self::new(screenshots, config, Box::new(sink))
    }

    pub fn with_final_shots(mut self, enabled: bool) -> Self {
        self.final_shots = enabled;
        self
    }

    /// Capture the screen for a finished test. Failures always get an error
    /// shot; passes only when final shots are enabled. Returns the saved path.
    pub async fn after_test(&self, title: &str, passed: bool) -> Option<PathBuf> {
        if passed && !self.final_shots {
            return None;
        }
        let (dir, entry_title) = if passed {
            (self.layout.final_shots_dir(), "Final screenshot")
        } else {
            (self.layout.error_shots_dir(), "Screenshot on failure")
        };
        let path = dir.join(shot_file_name(title, epoch_millis()));

        if let Err(e) = store::ensure_parent(&path) {
            warn!(test = title, issue = ?IssueKind::Infrastructure, "Failed to prepare screenshot folder: {e:#}");
            return None;
        }
        if let Err(e) = self.screenshots.save_screenshot(&path).await {
            warn!(test = title, issue = ?IssueKind::Infrastructure, "Failed to save screenshot: {e}");
            return None;
        }

        let settings = self.compression;
        let target = path.clone();
        match tokio::task::spawn_blocking(move || compress_file(&target, &settings)).await {
            Ok(Ok(outcome)) => debug!(path = %path.display(), ?outcome, "Screenshot saved"),
            Ok(Err(e)) => warn!(path = %path.display(), "Failed to compress screenshot: {e:#}"),
            Err(e) => warn!("Compression task panicked: {e}"),
        }

        let entry = ReportEntry::new(entry_title, path.display().to_string());
        if let Err(e) = self.sink.emit(&entry) {
            warn!(issue = ?IssueKind::Infrastructure, "Failed to write report entry: {e:#}");
        }
        Some(path)
    }

    /// Compress every image under the output folder. Returns how many files
    /// were replaced by a smaller encoding.
    pub async fn end_suite(&self) -> usize {
        if !self.compression.enabled() {
            return 0;
        }
        let dir = self.layout.output_dir();
        let settings = self.compression;
        let replaced = tokio::task::spawn_blocking(move || {
            store::list_images(&dir)
                .into_iter()
                .filter(|path| match compress_file(path, &settings) {
                    Ok(CompressOutcome::Replaced { before, after }) => {
                        debug!(path = %path.display(), before, after, "Compressed");
                        true
                    }
                    Ok(_) => false,
                    Err(e) => {
                        warn!(path = %path.display(), issue = ?IssueKind::Infrastructure, "Failed to compress: {e:#}");
                        false
                    }
                })
                .count()
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Compression task panicked: {e}");
            0
        });
        info!(replaced, "Compressed report output");
        replaced
    }
}

/// `{epochMillis}-{sanitizedTitle}.png`
pub fn shot_file_name(title: &str, millis: u128) -> String {
    format!("{millis}-{}.png", naming::sanitize(title))
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
