use super::ledger::{MismatchLedger, MismatchRecord};
use crate::report::{ReportAsset, ReportEntry, naming};

/// State owned by the test currently running. Created once, then
/// `reset_for_test` at the start of every test and read at its end.
#[derive(Debug, Clone, Default)]
pub struct TestContext {
    label: String,
    ledger: MismatchLedger,
    missing_baselines: usize,
    comparisons: usize,
    step: u32,
    sequence: u32,
    assets: Vec<ReportAsset>,
    entries: Vec<ReportEntry>,
}

impl TestContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Drop everything left over from the previous test.
    pub fn reset_for_test(&mut self, label: impl Into<String>) {
        *self = Self::new(label);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn ledger(&self) -> &MismatchLedger {
        &self.ledger
    }

    pub fn missing_baselines(&self) -> usize {
        self.missing_baselines
    }

    pub fn comparisons(&self) -> usize {
        self.comparisons
    }

    /// Unique tag for automatic step capture: `{label}__{tag}__s{NNN}`.
    pub fn step_tag(&mut self, tag: &str) -> String {
        self.step += 1;
        format!(
            "{}__{}__s{:03}",
            naming::sanitize(&self.label),
            naming::sanitize(tag),
            self.step
        )
    }

    /// Next report sequence number, starting at 1.
    pub fn next_sequence(&mut self) -> u32 {
        self.sequence += 1;
        self.sequence
    }

    pub(crate) fn record_comparison(&mut self) {
        self.comparisons += 1;
    }

    pub(crate) fn record_missing_baseline(&mut self) {
        self.missing_baselines += 1;
    }

    pub(crate) fn record_mismatch(&mut self, record: MismatchRecord) {
        self.ledger.push(record);
    }

    pub fn push_asset(&mut self, asset: ReportAsset) {
        self.assets.push(asset);
    }

    pub fn push_entry(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn take_assets(&mut self) -> Vec<ReportAsset> {
        std::mem::take(&mut self.assets)
    }

    pub fn take_entries(&mut self) -> Vec<ReportEntry> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_tags_are_unique_and_sanitized() {
        let mut ctx = TestContext::new("Login Flow");
        assert_eq!(ctx.step_tag("Home Screen"), "login_flow__home_screen__s001");
        assert_eq!(ctx.step_tag("Home Screen"), "login_flow__home_screen__s002");
    }

    #[test]
    fn reset_clears_everything() {
        let mut ctx = TestContext::new("first");
        ctx.step_tag("a");
        ctx.next_sequence();
        ctx.record_comparison();
        ctx.record_missing_baseline();
        ctx.record_mismatch(MismatchRecord {
            tag: "a".into(),
            mismatch: 0.5,
            diff_path: None,
        });
        ctx.push_entry(ReportEntry::new("t", "v"));

        ctx.reset_for_test("second");
        assert_eq!(ctx.label(), "second");
        assert!(ctx.ledger().is_empty());
        assert_eq!(ctx.missing_baselines(), 0);
        assert_eq!(ctx.comparisons(), 0);
        assert_eq!(ctx.next_sequence(), 1);
        assert_eq!(ctx.step_tag("a"), "second__a__s001");
        assert!(ctx.take_entries().is_empty());
    }
}
