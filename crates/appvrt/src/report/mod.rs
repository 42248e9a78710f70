pub mod assets;
pub mod compress;
pub mod naming;
pub mod sink;
pub mod summary;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use self::assets::{publish, relocate};
pub use self::compress::{CompressOutcome, CompressionSettings, compress_file};
pub use self::sink::{JsonLinesSink, MemorySink, ReportEntry, ReportSink, relabel};
pub use self::summary::TestReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetRole {
    Baseline,
    Current,
    Diff,
}

impl AssetRole {
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Current => "current",
            Self::Diff => "diff",
        }
    }
}

/// An image copied into the report tree.
///
/// `report_path` is unique per (role, test label, tag, sequence) even when a
/// tag repeats within a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportAsset {
    pub source_path: PathBuf,
    pub report_path: PathBuf,
    pub role: AssetRole,
    pub tag: String,
}
