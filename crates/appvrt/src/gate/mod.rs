//! Tolerance gate: runs each comparison, classifies the result and keeps
//! enough evidence to explain every violation when the test ends.

pub mod context;
pub mod ledger;
pub mod tolerance;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub use self::context::TestContext;
pub use self::ledger::{MismatchLedger, MismatchRecord};
pub use self::tolerance::{DEFAULT_TOLERANCE, Tolerance};

use crate::compare::{self, Located};
use crate::config::VisualConfig;
use crate::error::{IssueKind, VisualError};
use crate::lifecycle::{BaselineManager, MissingBaseline, Resolution};
use crate::report::{
    AssetRole, CompressionSettings, JsonLinesSink, ReportAsset, ReportEntry, ReportSink, TestReport,
    naming, publish, relabel, relocate,
};
use crate::service::{CaptureService, ComparisonRequest, ComparisonResult, VisualService};
use crate::store::{self, ReportLayout};

/// What a single `check` concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Passed { mismatch: f64 },
    /// Recorded on the ledger; the test fails at `end_test`.
    Exceeded(MismatchRecord),
    /// Staged as pending; does not fail the test.
    BaselineMissing(MissingBaseline),
    /// The service gave no usable mismatch value.
    NoData,
}

impl CheckOutcome {
    /// Mismatch fraction handed back to the caller; zero for a missing baseline.
    pub fn mismatch(&self) -> f64 {
        match self {
            Self::Passed { mismatch } => *mismatch,
            Self::Exceeded(record) => record.mismatch,
            Self::BaselineMissing(_) | Self::NoData => 0.0,
        }
    }

    /// Issue raised by this outcome, if any.
    pub fn issue(&self) -> Option<IssueKind> {
        match self {
            Self::Passed { .. } => None,
            Self::Exceeded(_) => Some(IssueKind::ToleranceExceeded),
            Self::BaselineMissing(_) => Some(IssueKind::BaselineMissing),
            Self::NoData => Some(IssueKind::Incomparable),
        }
    }
}

pub struct VisualGate<V, C> {
    service: V,
    baselines: BaselineManager<C>,
    tolerance: Tolerance,
    pixel_threshold: f64,
    compression: CompressionSettings,
    layout: ReportLayout,
    sink: Box<dyn ReportSink>,
}

impl<V, C> VisualGate<V, C>
where
    V: VisualService + Sync,
    C: CaptureService + Sync,
{
    pub fn new(service: V, capture: C, config: &VisualConfig, sink: Box<dyn ReportSink>) -> Self {
        let layout = config.layout();
        let baselines = BaselineManager::new(
            capture,
            layout.pending_root().to_path_buf(),
            layout.default_baseline_root(),
        );
        Self {
            service,
            baselines,
            tolerance: config.tolerance,
            pixel_threshold: config.pixel_threshold,
            compression: config.compression,
            layout,
            sink,
        }
    }

    /// Gate reporting to `visual-report/context.jsonl` under the report root.
    pub fn with_report_file(service: V, capture: C, config: &VisualConfig) -> Self {
        let sink = JsonLinesSink::new(config.layout().context_file());
        Self::new(service, capture, config, Box::new(sink))
    }

    pub fn layout(&self) -> &ReportLayout {
        &self.layout
    }

    /// Run one comparison. Only a non-baseline service failure is an error
    /// here; violations are recorded and surface from `end_test`.
    pub async fn check(
        &self,
        ctx: &mut TestContext,
        request: &ComparisonRequest,
    ) -> Result<CheckOutcome, VisualError> {
        ctx.record_comparison();
        let sequence = ctx.next_sequence();

        let result = match self.baselines.resolve(&self.service, request).await? {
            Resolution::Resolved(result) => result,
            Resolution::Empty => {
                warn!(tag = %request.tag, issue = ?IssueKind::Incomparable, "Comparison returned no result");
                return Ok(CheckOutcome::NoData);
            }
            Resolution::BaselineMissing(missing) => {
                ctx.record_missing_baseline();
                ctx.push_entry(ReportEntry::new(
                    format!("Visual baseline missing: {}", request.tag),
                    missing.message(),
                ));
                return Ok(CheckOutcome::BaselineMissing(missing));
            }
        };

        let Some(mismatch) = result.mismatch else {
            warn!(
                tag = %request.tag,
                issue = ?IssueKind::Incomparable,
                "No mismatch data in comparison result"
            );
            return Ok(CheckOutcome::NoData);
        };

        if !self.tolerance.exceeded_by(mismatch) {
            debug!(
                tag = %request.tag,
                mismatch = mismatch * 100.0,
                "Within tolerance"
            );
            return Ok(CheckOutcome::Passed { mismatch });
        }

        let record = self
            .record_violation(ctx, request, &result, mismatch, sequence)
            .await;
        Ok(CheckOutcome::Exceeded(record))
    }

    /// Close the test: compress the report assets, flush buffered report
    /// entries and raise the aggregated failure if anything exceeded tolerance.
    pub async fn end_test(
        &self,
        ctx: &mut TestContext,
        expect_comparisons: bool,
    ) -> Result<TestReport, VisualError> {
        let assets = ctx.take_assets();
        let settings = self.compression;
        let compressed = tokio::task::spawn_blocking(move || {
            for asset in &assets {
                match publish(asset, &settings) {
                    Ok(outcome) => {
                        debug!(path = %asset.report_path.display(), ?outcome, "Compressed report asset")
                    }
                    Err(e) => warn!(
                        tag = %asset.tag,
                        issue = ?IssueKind::Infrastructure,
                        "Failed to compress report asset: {e:#}"
                    ),
                }
            }
        })
        .await;
        if let Err(e) = compressed {
            warn!(issue = ?IssueKind::Infrastructure, "Report asset task panicked: {e}");
        }

        for entry in ctx.take_entries() {
            if let Err(e) = self.sink.emit(&entry) {
                warn!(issue = ?IssueKind::Infrastructure, "Failed to write report entry: {e:#}");
            }
        }

        let report = TestReport::from_context(ctx, self.tolerance, expect_comparisons);
        for warning in report.warnings() {
            warn!(test = %report.label, "{warning}");
        }
        if report.failed() {
            info!(
                test = %report.label,
                mismatches = report.mismatches.len(),
                "Visual mismatches above tolerance"
            );
        }
        report.into_result()
    }

    async fn record_violation(
        &self,
        ctx: &mut TestContext,
        request: &ComparisonRequest,
        result: &ComparisonResult,
        mismatch: f64,
        sequence: u32,
    ) -> MismatchRecord {
        let tag = request.tag.as_str();
        let label = ctx.label().to_string();
        let report_path = |role: AssetRole, source: &Path| {
            self.layout.asset_dir(role).join(naming::asset_file_name(
                role,
                &label,
                tag,
                sequence,
                &naming::extension_of(source),
            ))
        };

        warn!(
            tag,
            mismatch = mismatch * 100.0,
            tolerance = self.tolerance.percent(),
            "Visual mismatch above tolerance"
        );
        ctx.push_entry(ReportEntry::new(
            format!("Visual mismatch: {tag}"),
            format!("{:.2}% > {}", mismatch * 100.0, self.tolerance),
        ));

        // (role, source, report path)
        let current = &result.folders.current;
        let mut assets = vec![(
            AssetRole::Current,
            current.clone(),
            report_path(AssetRole::Current, current.as_path()),
        )];
        if let Some(baseline) = result.folders.baseline.as_ref().filter(|p| p.is_file()) {
            assets.push((
                AssetRole::Baseline,
                baseline.clone(),
                report_path(AssetRole::Baseline, baseline.as_path()),
            ));
        }

        let highlighted = report_path(AssetRole::Diff, Path::new("diff.png"));
        match self.render_diff(result, &highlighted, tag).await {
            Ok(true) => assets.push((AssetRole::Diff, highlighted.clone(), highlighted)),
            Ok(false) => {}
            Err(e) => warn!(
                tag,
                issue = ?IssueKind::Infrastructure,
                "Failed to render highlighted diff: {e:#}"
            ),
        }
        if !assets.iter().any(|(role, ..)| *role == AssetRole::Diff) {
            // Fall back to the service's own diff image.
            if let Some(diff) = result.folders.diff.as_ref().filter(|p| p.is_file()) {
                assets.push((AssetRole::Diff, diff.clone(), report_path(AssetRole::Diff, diff.as_path())));
            }
        }

        let mut entries = Vec::with_capacity(assets.len());
        let assets: Vec<ReportAsset> = assets
            .into_iter()
            .map(|(role, source, target)| {
                entries.push(ReportEntry::new(
                    format!("Visual {}: {tag}", role.dir_name()),
                    source.display().to_string(),
                ));
                ReportAsset {
                    source_path: source,
                    report_path: target,
                    role,
                    tag: tag.to_string(),
                }
            })
            .collect();

        // The service reuses file names per tag, so copy before the next check.
        let relocated = tokio::task::spawn_blocking(move || {
            assets
                .into_iter()
                .filter(|asset| match relocate(asset) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(
                            tag = %asset.tag,
                            issue = ?IssueKind::Infrastructure,
                            "Failed to copy report asset: {e:#}"
                        );
                        false
                    }
                })
                .collect::<Vec<_>>()
        })
        .await
        .unwrap_or_else(|e| {
            warn!(tag, issue = ?IssueKind::Infrastructure, "Report asset task panicked: {e}");
            Vec::new()
        });

        for entry in relabel(entries, &relocated) {
            ctx.push_entry(entry);
        }
        let diff_path = relocated
            .iter()
            .find(|asset| asset.role == AssetRole::Diff)
            .map(|asset| asset.report_path.clone());
        for asset in relocated {
            ctx.push_asset(asset);
        }

        self.stage_candidate(current, tag);

        let record = MismatchRecord {
            tag: tag.to_string(),
            mismatch,
            diff_path,
        };
        ctx.record_mismatch(record.clone());
        record
    }

    /// Bound the difference and draw it onto the current capture at `dest`.
    /// `Ok(false)` when there is nothing comparable to draw.
    async fn render_diff(&self, result: &ComparisonResult, dest: &Path, tag: &str) -> Result<bool> {
        let Some(baseline) = result.folders.baseline.clone() else {
            warn!(
                tag,
                issue = ?IssueKind::Incomparable,
                "No baseline path in comparison result; skipping highlight"
            );
            return Ok(false);
        };
        let current = result.folders.current.clone();
        let dest = dest.to_path_buf();
        let threshold = self.pixel_threshold;

        let located = {
            let current = current.clone();
            tokio::task::spawn_blocking(move || {
                compare::locate_difference(&baseline, &current, threshold)
            })
            .await
            .context("Diff task panicked")
            .and_then(|r| r)?
        };

        let bbox = match located {
            Located::Region(bbox) => bbox,
            Located::NoDifference => {
                debug!(tag, "No pixel above threshold; nothing to highlight");
                return Ok(false);
            }
            Located::Incomparable(reason) => {
                warn!(tag, issue = ?IssueKind::Incomparable, "Images not comparable: {reason}");
                return Ok(false);
            }
        };

        tokio::task::spawn_blocking(move || -> Result<bool> {
            let bytes = crate::codec::read_bytes(&current)?;
            let png = compare::highlight(&bytes, &bbox)?;
            store::write_file(&dest, &png)?;
            Ok(true)
        })
        .await
        .context("Highlight task panicked")
        .and_then(|r| r)
    }

    /// Stage the current capture so an approver can promote it without a rerun.
    fn stage_candidate(&self, current: &Path, tag: &str) {
        let actual_base: Option<PathBuf> = self.service.folders().actual;
        match store::stage_pending(self.layout.pending_root(), current, actual_base.as_deref()) {
            Ok(path) => debug!(tag, path = %path.display(), "Staged pending baseline candidate"),
            Err(e) => warn!(
                tag,
                issue = ?IssueKind::Infrastructure,
                "Failed to stage pending baseline candidate: {e:#}"
            ),
        }
    }
}
