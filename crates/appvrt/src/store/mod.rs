use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::report::AssetRole;

pub const DEFAULT_REPORT_DIR: &str = "report";
pub const PENDING_DIR: &str = "visual-baseline-pending";
pub const BASELINE_DIR: &str = "visual-baseline";
pub const VISUAL_REPORT_DIR: &str = "visual-report";
pub const OUTPUT_DIR: &str = "visual-output";
pub const ERROR_SHOTS_DIR: &str = "errorShots";
pub const FINAL_SHOTS_DIR: &str = "finalShots";
const CONTEXT_FILE: &str = "context.jsonl";

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Filesystem layout produced under the report root.
///
/// ```text
/// report/
///   visual-baseline-pending/**        staged candidates awaiting approval
///   visual-report/{baseline,current,diff}/**
///   visual-report/context.jsonl
///   visual-output/{errorShots,finalShots}/**
/// ```
#[derive(Debug, Clone)]
pub struct ReportLayout {
    root: PathBuf,
    pending: PathBuf,
}

impl ReportLayout {
    /// `pending` defaults to `<root>/visual-baseline-pending`.
    pub fn new(root: impl Into<PathBuf>, pending: Option<PathBuf>) -> Self {
        let root = root.into();
        let pending = pending.unwrap_or_else(|| root.join(PENDING_DIR));
        Self { root, pending }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pending_root(&self) -> &Path {
        &self.pending
    }

    /// Where approved baselines live when the service does not say.
    pub fn default_baseline_root(&self) -> PathBuf {
        self.root.join(BASELINE_DIR)
    }

    pub fn asset_dir(&self, role: AssetRole) -> PathBuf {
        self.root.join(VISUAL_REPORT_DIR).join(role.dir_name())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    pub fn error_shots_dir(&self) -> PathBuf {
        self.output_dir().join(ERROR_SHOTS_DIR)
    }

    pub fn final_shots_dir(&self) -> PathBuf {
        self.output_dir().join(FINAL_SHOTS_DIR)
    }

    pub fn context_file(&self) -> PathBuf {
        self.root.join(VISUAL_REPORT_DIR).join(CONTEXT_FILE)
    }
}

pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    ensure_parent(dest)?;
    std::fs::copy(src, dest)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
    Ok(())
}

/// Path of `path` relative to `base`, or just its file name when there is
/// no base or `path` lies outside it.
pub fn relative_within(base: Option<&Path>, path: &Path) -> PathBuf {
    let file_name = || {
        path.file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("capture.png"))
    };
    match base.and_then(|b| path.strip_prefix(b).ok()) {
        Some(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
        _ => file_name(),
    }
}

/// Copy a capture into the pending root, mirroring its path relative to
/// `actual_base`. Directory creation is idempotent; an existing pending file
/// for the same path is replaced.
pub fn stage_pending(pending_root: &Path, source: &Path, actual_base: Option<&Path>) -> Result<PathBuf> {
    let dest = pending_root.join(relative_within(actual_base, source));
    copy_file(source, &dest)?;
    Ok(dest)
}

/// Recursively collect image files under `dir`. Missing directories yield
/// an empty set.
pub fn list_images(dir: &Path) -> BTreeSet<PathBuf> {
    let mut out = BTreeSet::new();
    collect_images(dir, &mut out);
    out
}

fn collect_images(dir: &Path, out: &mut BTreeSet<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_images(&path, out);
        } else if path.extension().is_some_and(|e| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|ext| e.eq_ignore_ascii_case(ext))
        }) {
            out.insert(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = ReportLayout::new("report", None);
        assert_eq!(
            layout.pending_root(),
            Path::new("report/visual-baseline-pending")
        );
        assert_eq!(
            layout.asset_dir(AssetRole::Diff),
            Path::new("report/visual-report/diff")
        );
        assert_eq!(
            layout.error_shots_dir(),
            Path::new("report/visual-output/errorShots")
        );

        let custom = ReportLayout::new("report", Some(PathBuf::from("/tmp/pending")));
        assert_eq!(custom.pending_root(), Path::new("/tmp/pending"));
    }

    #[test]
    fn relative_within_mirrors_or_falls_back() {
        let base = Path::new("/out/actual");
        assert_eq!(
            relative_within(Some(base), Path::new("/out/actual/android/home.png")),
            PathBuf::from("android/home.png")
        );
        assert_eq!(
            relative_within(Some(base), Path::new("/elsewhere/home.png")),
            PathBuf::from("home.png")
        );
        assert_eq!(
            relative_within(None, Path::new("/out/actual/android/home.png")),
            PathBuf::from("home.png")
        );
    }

    #[test]
    fn stage_pending_creates_dirs_and_is_repeatable() {
        let tmp = tempfile::tempdir().unwrap();
        let actual_base = tmp.path().join("actual");
        let source = actual_base.join("android").join("home.png");
        write_file(&source, b"first").unwrap();

        let pending = tmp.path().join("pending");
        let staged = stage_pending(&pending, &source, Some(&actual_base)).unwrap();
        assert_eq!(staged, pending.join("android").join("home.png"));
        assert_eq!(std::fs::read(&staged).unwrap(), b"first");

        write_file(&source, b"second").unwrap();
        let again = stage_pending(&pending, &source, Some(&actual_base)).unwrap();
        assert_eq!(again, staged);
        assert_eq!(std::fs::read(&again).unwrap(), b"second");
    }

    #[test]
    fn list_images_recurses_and_filters() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(&tmp.path().join("a.png"), b"x").unwrap();
        write_file(&tmp.path().join("sub").join("b.JPG"), b"x").unwrap();
        write_file(&tmp.path().join("notes.txt"), b"x").unwrap();
        let found = list_images(tmp.path());
        assert_eq!(found.len(), 2);
        assert!(list_images(&tmp.path().join("missing")).is_empty());
    }
}
