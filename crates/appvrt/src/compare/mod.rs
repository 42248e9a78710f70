pub mod bbox;
pub mod highlight;
pub mod pixel;

use std::path::Path;

use anyhow::Result;

pub use self::bbox::{BoundingBox, bounding_box};
pub use self::highlight::{Marker, highlight, plan_marker};
pub use self::pixel::{DEFAULT_THRESHOLD, DiffError, PixelDiff};

/// Outcome of locating the visual difference between two image files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    Region(BoundingBox),
    /// Comparable, but no pixel exceeds the perceptual threshold.
    NoDifference,
    /// Missing file or mismatched dimensions; no usable comparison.
    Incomparable(String),
}

/// Decode both files, diff them and bound the differing region.
///
/// Runs synchronously; call via `spawn_blocking`. Decode failures are
/// returned as errors, everything the caller should merely skip is
/// `Located::Incomparable`.
pub fn locate_difference(baseline: &Path, current: &Path, threshold: f64) -> Result<Located> {
    for (role, path) in [("baseline", baseline), ("current", current)] {
        if !path.is_file() {
            return Ok(Located::Incomparable(format!(
                "{role} image missing: {}",
                path.display()
            )));
        }
    }

    let left = crate::codec::decode_rgba_file(baseline)?;
    let right = crate::codec::decode_rgba_file(current)?;

    match pixel::compare(&left, &right, threshold) {
        Ok(diff) => Ok(diff
            .mask_bounds()
            .map_or(Located::NoDifference, Located::Region)),
        Err(e) => Ok(Located::Incomparable(e.to_string())),
    }
}

impl PixelDiff {
    pub fn mask_bounds(&self) -> Option<BoundingBox> {
        if self.diff_pixels == 0 {
            return None;
        }
        bounding_box(&self.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write(dir: &Path, name: &str, img: &RgbaImage) -> std::path::PathBuf {
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn locates_changed_region() {
        let tmp = tempfile::tempdir().unwrap();
        let base = RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255]));
        let mut cur = base.clone();
        for y in 20..25 {
            for x in 5..30 {
                cur.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let b = write(tmp.path(), "b.png", &base);
        let c = write(tmp.path(), "c.png", &cur);
        let located = locate_difference(&b, &c, DEFAULT_THRESHOLD).unwrap();
        let Located::Region(bb) = located else {
            panic!("expected a region, got {located:?}");
        };
        assert_eq!((bb.min_x, bb.min_y, bb.max_x, bb.max_y), (5, 20, 29, 24));
    }

    #[test]
    fn identical_files_have_no_difference() {
        let tmp = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]));
        let b = write(tmp.path(), "b.png", &img);
        let c = write(tmp.path(), "c.png", &img);
        assert_eq!(
            locate_difference(&b, &c, DEFAULT_THRESHOLD).unwrap(),
            Located::NoDifference
        );
    }

    #[test]
    fn size_change_is_incomparable() {
        let tmp = tempfile::tempdir().unwrap();
        let b = write(tmp.path(), "b.png", &RgbaImage::new(8, 8));
        let c = write(tmp.path(), "c.png", &RgbaImage::new(8, 9));
        assert!(matches!(
            locate_difference(&b, &c, DEFAULT_THRESHOLD).unwrap(),
            Located::Incomparable(_)
        ));
    }

    #[test]
    fn missing_file_is_incomparable() {
        let tmp = tempfile::tempdir().unwrap();
        let c = write(tmp.path(), "c.png", &RgbaImage::new(8, 8));
        let located = locate_difference(&tmp.path().join("nope.png"), &c, 0.1).unwrap();
        assert!(matches!(located, Located::Incomparable(msg) if msg.contains("baseline")));
    }
}
