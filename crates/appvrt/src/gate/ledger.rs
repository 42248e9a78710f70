use std::path::PathBuf;

/// One comparison whose mismatch exceeded the tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct MismatchRecord {
    pub tag: String,
    /// Fraction in [0, 1].
    pub mismatch: f64,
    pub diff_path: Option<PathBuf>,
}

/// Violations accumulated over one test, in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct MismatchLedger {
    records: Vec<MismatchRecord>,
}

impl MismatchLedger {
    pub fn push(&mut self, record: MismatchRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[MismatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
