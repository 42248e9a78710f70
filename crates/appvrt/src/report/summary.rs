use crate::error::VisualError;
use crate::gate::{MismatchRecord, TestContext, Tolerance};

/// What one test produced, read from its context at test end.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub label: String,
    pub tolerance: Tolerance,
    pub mismatches: Vec<MismatchRecord>,
    pub missing_baselines: usize,
    pub comparisons: usize,
    pub expect_comparisons: bool,
}

impl TestReport {
    pub fn from_context(ctx: &TestContext, tolerance: Tolerance, expect_comparisons: bool) -> Self {
        Self {
            label: ctx.label().to_string(),
            tolerance,
            mismatches: ctx.ledger().records().to_vec(),
            missing_baselines: ctx.missing_baselines(),
            comparisons: ctx.comparisons(),
            expect_comparisons,
        }
    }

    /// Only tolerance violations fail a test.
    pub fn failed(&self) -> bool {
        !self.mismatches.is_empty()
    }

    pub fn missed_comparisons(&self) -> bool {
        self.expect_comparisons && self.comparisons == 0
    }

    /// Non-failing lines worth surfacing.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.missing_baselines > 0 {
            out.push(format!(
                "{} missing baseline(s); pending images await approval",
                self.missing_baselines
            ));
        }
        if self.missed_comparisons() {
            out.push("no visual comparison ran in this test".to_string());
        }
        out
    }

    /// One line per mismatch, then the warnings.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .mismatches
            .iter()
            .map(|r| {
                let diff = r
                    .diff_path
                    .as_ref()
                    .map_or_else(|| "unavailable".to_string(), |p| p.display().to_string());
                format!(
                    "- {}: {:.2}% > {:.2}% (diff: {diff})",
                    r.tag,
                    r.mismatch * 100.0,
                    self.tolerance.percent()
                )
            })
            .collect();
        lines.extend(self.warnings().into_iter().map(|w| format!("- {w}")));
        lines.join("\n")
    }

    /// The single aggregated failure, or the report itself when the test passes.
    pub fn into_result(self) -> Result<Self, VisualError> {
        if !self.failed() {
            return Ok(self);
        }
        Err(VisualError::ToleranceExceeded {
            count: self.mismatches.len(),
            report: self.render(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report(mismatches: Vec<MismatchRecord>, missing: usize, comparisons: usize) -> TestReport {
        TestReport {
            label: "t".into(),
            tolerance: Tolerance::new(0.01),
            mismatches,
            missing_baselines: missing,
            comparisons,
            expect_comparisons: true,
        }
    }

    #[test]
    fn renders_every_issue() {
        let r = report(
            vec![
                MismatchRecord {
                    tag: "home".into(),
                    mismatch: 0.05,
                    diff_path: Some(PathBuf::from("report/visual-report/diff/d.png")),
                },
                MismatchRecord {
                    tag: "menu".into(),
                    mismatch: 0.2,
                    diff_path: None,
                },
            ],
            1,
            3,
        );
        assert_eq!(
            r.render(),
            "- home: 5.00% > 1.00% (diff: report/visual-report/diff/d.png)\n\
             - menu: 20.00% > 1.00% (diff: unavailable)\n\
             - 1 missing baseline(s); pending images await approval"
        );
    }

    #[test]
    fn warnings_alone_do_not_fail() {
        let r = report(Vec::new(), 2, 0);
        assert!(!r.failed());
        assert_eq!(r.warnings().len(), 2);
        assert!(r.into_result().is_ok());
    }

    #[test]
    fn mismatches_fail_with_aggregated_message() {
        let r = report(
            vec![MismatchRecord {
                tag: "home".into(),
                mismatch: 0.05,
                diff_path: None,
            }],
            0,
            1,
        );
        let err = r.into_result().unwrap_err();
        let VisualError::ToleranceExceeded { count, report } = err else {
            panic!("unexpected error kind");
        };
        assert_eq!(count, 1);
        assert!(report.contains("home: 5.00%"));
    }
}
