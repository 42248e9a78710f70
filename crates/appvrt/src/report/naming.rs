use std::path::Path;

use super::AssetRole;

/// Upper bound for one sanitized name segment.
pub const MAX_SEGMENT_LEN: usize = 60;

/// Lower-case, replace anything that is not ASCII alphanumeric with `_`,
/// collapse runs of `_`, strip them from both ends and cap the length.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    // ASCII only from here on, so byte truncation is safe.
    let trimmed = out.trim_matches('_');
    let capped = &trimmed[..trimmed.len().min(MAX_SEGMENT_LEN)];
    let capped = capped.trim_end_matches('_');
    if capped.is_empty() {
        "untitled".to_string()
    } else {
        capped.to_string()
    }
}

/// `{role}__{label}__{tag}__c{NNN}.{ext}`
pub fn asset_file_name(role: AssetRole, test_label: &str, tag: &str, sequence: u32, ext: &str) -> String {
    format!(
        "{}__{}__{}__c{:03}.{}",
        role.dir_name(),
        sanitize(test_label),
        sanitize(tag),
        sequence,
        ext
    )
}

/// Lower-cased extension of `path`, `png` when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "png".to_string())
}
