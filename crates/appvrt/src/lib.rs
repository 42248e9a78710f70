//! Visual regression core for mobile UI tests: compare named captures
//! against approved baselines, stage missing baselines for approval, and
//! leave highlighted diffs and compressed evidence behind for the report.

pub mod codec;
pub mod compare;
pub mod config;
pub mod error;
pub mod evidence;
pub mod gate;
pub mod lifecycle;
pub mod logging;
pub mod report;
pub mod service;
pub mod store;

pub use self::config::{Overrides, VisualConfig};
pub use self::error::{IssueKind, VisualError};
pub use self::evidence::EvidenceRecorder;
pub use self::gate::{CheckOutcome, TestContext, Tolerance, VisualGate};
pub use self::lifecycle::{BaselineManager, MissingBaseline, Resolution};
pub use self::report::{JsonLinesSink, MemorySink, ReportEntry, ReportSink, TestReport};
pub use self::service::{
    CaptureService, ComparisonKind, ComparisonRequest, ComparisonResult, ScreenshotService,
    ServiceError, VisualService,
};
