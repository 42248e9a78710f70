use thiserror::Error;

/// Failure raised back to the test harness.
#[derive(Debug, Error)]
pub enum VisualError {
    /// Comparison service failed for a reason other than a missing baseline.
    #[error("visual comparison for \"{tag}\" failed: {message}")]
    Fatal { tag: String, message: String },

    /// One or more comparisons in the test exceeded the configured tolerance.
    #[error("{count} visual mismatch(es) above tolerance:\n{report}")]
    ToleranceExceeded { count: usize, report: String },

    #[error("invalid visual configuration: {0}")]
    Config(String),
}

impl VisualError {
    pub fn issue(&self) -> IssueKind {
        match self {
            Self::ToleranceExceeded { .. } => IssueKind::ToleranceExceeded,
            Self::Fatal { .. } | Self::Config(_) => IssueKind::Fatal,
        }
    }
}

/// Classification of everything that can go wrong around a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// Dimension mismatch or missing image; no usable comparison.
    Incomparable,
    /// No approved baseline; current capture staged as pending.
    BaselineMissing,
    /// Mismatch above tolerance; recorded and reported at test end.
    ToleranceExceeded,
    /// Codec or filesystem failure while producing evidence. Logged, never raised.
    Infrastructure,
    /// Any other comparison failure.
    Fatal,
}

impl IssueKind {
    /// Only these two kinds end a test in failure; the rest degrade to a warning.
    pub fn fails_test(self) -> bool {
        matches!(self, Self::ToleranceExceeded | Self::Fatal)
    }
}
