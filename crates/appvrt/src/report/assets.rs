use anyhow::Result;

use super::ReportAsset;
use super::compress::{CompressOutcome, CompressionSettings, compress_file};
use crate::store;

/// Copy the asset's source into the report tree. Done as soon as the asset
/// is known: the service reuses file names per tag, so a later comparison
/// would overwrite the source.
///
/// Nothing is copied when the asset already sits at its report path (the
/// highlighted diff is rendered there directly).
pub fn relocate(asset: &ReportAsset) -> Result<()> {
    if asset.source_path != asset.report_path {
        store::copy_file(&asset.source_path, &asset.report_path)?;
    }
    Ok(())
}

/// Shrink a relocated asset in place.
pub fn publish(asset: &ReportAsset, settings: &CompressionSettings) -> Result<CompressOutcome> {
    compress_file(&asset.report_path, settings)
}
