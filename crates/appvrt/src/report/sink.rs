use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::ReportAsset;
use crate::store;

/// One `{ title, value }` item for the report generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub title: String,
    pub value: String,
}

impl ReportEntry {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
        }
    }
}

/// Append-only stream consumed by the report generator.
pub trait ReportSink: Send + Sync {
    fn emit(&self, entry: &ReportEntry) -> Result<()>;
}

/// Keeps entries in memory; useful for harnesses that render their own report.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<ReportEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl ReportSink for MemorySink {
    fn emit(&self, entry: &ReportEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("report sink lock poisoned"))?
            .push(entry.clone());
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for JsonLinesSink {
    fn emit(&self, entry: &ReportEntry) -> Result<()> {
        store::ensure_parent(&self.path)?;
        let mut line = serde_json::to_string(entry).context("Failed to serialize report entry")?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        Ok(())
    }
}

/// Point entries at relocated assets: an entry whose value is an asset's
/// source path gets the report path and a title naming role and tag.
///
/// Each asset claims at most one entry, in order, so a tag captured twice
/// from the same source file maps to both of its report copies.
pub fn relabel(entries: Vec<ReportEntry>, assets: &[ReportAsset]) -> Vec<ReportEntry> {
    let mut claimed = vec![false; assets.len()];
    entries
        .into_iter()
        .map(|entry| {
            let slot = (0..assets.len()).find(|&i| {
                let a = &assets[i];
                !claimed[i]
                    && a.source_path != a.report_path
                    && a.source_path.as_os_str() == entry.value.as_str()
            });
            match slot {
                Some(i) => {
                    claimed[i] = true;
                    let asset = &assets[i];
                    ReportEntry {
                        title: format!("Visual {}: {}", asset.role.dir_name(), asset.tag),
                        value: asset.report_path.display().to_string(),
                    }
                }
                None => entry,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::AssetRole;

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(&ReportEntry::new("a", "1")).unwrap();
        sink.emit(&ReportEntry::new("b", "2")).unwrap();
        let titles: Vec<String> = sink.entries().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, ["a", "b"]);
    }

    #[test]
    fn json_lines_sink_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("context.jsonl");
        let sink = JsonLinesSink::new(&path);
        sink.emit(&ReportEntry::new("first", "x")).unwrap();
        sink.emit(&ReportEntry::new("second", "y")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<ReportEntry> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed, vec![ReportEntry::new("first", "x"), ReportEntry::new("second", "y")]);
    }

    #[test]
    fn relabel_rewrites_only_relocated_entries() {
        let assets = vec![ReportAsset {
            source_path: PathBuf::from("/out/actual/home.png"),
            report_path: PathBuf::from("report/visual-report/current/current__t__home__c001.png"),
            role: AssetRole::Current,
            tag: "home".into(),
        }];
        let entries = vec![
            ReportEntry::new("Screenshot", "/out/actual/home.png"),
            ReportEntry::new("Visual mismatch: home", "5.00% > 1.00%"),
        ];
        let out = relabel(entries, &assets);
        assert_eq!(
            out[0],
            ReportEntry::new(
                "Visual current: home",
                "report/visual-report/current/current__t__home__c001.png"
            )
        );
        assert_eq!(out[1].title, "Visual mismatch: home");
    }

    #[test]
    fn relabel_gives_each_sequence_its_own_entry() {
        let asset = |seq: u32| ReportAsset {
            source_path: PathBuf::from("/out/actual/home.png"),
            report_path: PathBuf::from(format!("report/current/current__t__home__c00{seq}.png")),
            role: AssetRole::Current,
            tag: "home".into(),
        };
        let entries = vec![
            ReportEntry::new("Screenshot", "/out/actual/home.png"),
            ReportEntry::new("Screenshot", "/out/actual/home.png"),
        ];
        let values: Vec<String> = relabel(entries, &[asset(1), asset(2)])
            .into_iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(
            values,
            [
                "report/current/current__t__home__c001.png",
                "report/current/current__t__home__c002.png"
            ]
        );
    }

    #[test]
    fn relabel_ignores_assets_already_in_place() {
        let path = PathBuf::from("report/diff/diff__t__home__c001.png");
        let asset = ReportAsset {
            source_path: path.clone(),
            report_path: path.clone(),
            role: AssetRole::Diff,
            tag: "home".into(),
        };
        let entry = ReportEntry::new("Custom title", path.display().to_string());
        assert_eq!(relabel(vec![entry.clone()], &[asset]), vec![entry]);
    }
}
