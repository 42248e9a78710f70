//! Thin adapter over the `image` crate: decode, encode, resize and draw
//! overlay shapes. No state.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

/// Accent colour used for every highlight overlay (#ff0000).
pub const ACCENT: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Axis-aligned rectangle in image pixel coordinates.
///
/// The origin may be negative while candidate placements are evaluated;
/// anything drawn is clipped to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn right(&self) -> i64 {
        self.x + i64::from(self.width)
    }

    pub fn bottom(&self) -> i64 {
        self.y + i64::from(self.height)
    }

    /// True when the whole rectangle lies inside a `w x h` canvas.
    pub fn fits_within(&self, w: u32, h: u32) -> bool {
        self.x >= 0 && self.y >= 0 && self.right() <= i64::from(w) && self.bottom() <= i64::from(h)
    }
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("Failed to decode image")
}

pub fn decode_rgba_file(path: &Path) -> Result<RgbaImage> {
    let bytes = read_bytes(path)?;
    let img = decode(&bytes).with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok(img.to_rgba8())
}

/// Sniff the container format from content, falling back to the extension.
pub fn detect_format(bytes: &[u8], path: &Path) -> Option<ImageFormat> {
    image::guess_format(bytes)
        .ok()
        .or_else(|| ImageFormat::from_path(path).ok())
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(buf)
}

/// Downscale by `scale`, keeping aspect ratio and never enlarging.
pub fn scale_down(img: &DynamicImage, scale: f64) -> DynamicImage {
    if !(scale > 0.0 && scale < 1.0) {
        return img.clone();
    }
    let w = ((f64::from(img.width()) * scale).round() as u32).max(1);
    let h = ((f64::from(img.height()) * scale).round() as u32).max(1);
    img.resize(w, h, FilterType::Lanczos3)
}

/// Composite an unfilled rectangle outline of `stroke` pixels onto `img`.
///
/// The stroke straddles the rectangle edge, half outside and half inside,
/// and is clipped to the canvas.
pub fn stroke_rect(img: &mut RgbaImage, rect: Rect, stroke: u32, color: Rgba<u8>) {
    let outer_pad = i64::from(stroke / 2);
    let inner_pad = i64::from(stroke) - outer_pad;

    let ox0 = rect.x - outer_pad;
    let oy0 = rect.y - outer_pad;
    let ox1 = rect.right() + outer_pad;
    let oy1 = rect.bottom() + outer_pad;

    let ix0 = rect.x + inner_pad;
    let iy0 = rect.y + inner_pad;
    let ix1 = rect.right() - inner_pad;
    let iy1 = rect.bottom() - inner_pad;

    let (w, h) = img.dimensions();
    let x_start = ox0.max(0);
    let y_start = oy0.max(0);
    let x_end = ox1.min(i64::from(w));
    let y_end = oy1.min(i64::from(h));

    for y in y_start..y_end {
        for x in x_start..x_end {
            let inside_inner = x >= ix0 && x < ix1 && y >= iy0 && y < iy1;
            if !inside_inner {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_within_checks_all_edges() {
        let r = Rect {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        assert!(r.fits_within(10, 10));
        assert!(!r.fits_within(9, 10));
        let shifted = Rect { x: -1, ..r };
        assert!(!shifted.fits_within(100, 100));
    }

    #[test]
    fn stroke_leaves_interior_untouched() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let rect = Rect {
            x: 5,
            y: 5,
            width: 10,
            height: 10,
        };
        stroke_rect(&mut img, rect, 2, ACCENT);
        // Edge pixels painted.
        assert_eq!(*img.get_pixel(5, 5), ACCENT);
        assert_eq!(*img.get_pixel(4, 10), ACCENT);
        // Interior and far exterior untouched.
        assert_eq!(*img.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn stroke_is_clipped_at_canvas_edge() {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        let rect = Rect {
            x: 0,
            y: 0,
            width: 8,
            height: 8,
        };
        stroke_rect(&mut img, rect, 4, ACCENT);
        assert_eq!(*img.get_pixel(0, 0), ACCENT);
        assert_eq!(*img.get_pixel(7, 7), ACCENT);
    }

    #[test]
    fn scale_down_never_enlarges() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(100, 50));
        let same = scale_down(&img, 1.5);
        assert_eq!((same.width(), same.height()), (100, 50));
        let half = scale_down(&img, 0.5);
        assert_eq!((half.width(), half.height()), (50, 25));
    }

    #[test]
    fn detect_format_prefers_content() {
        let png = encode_png(&RgbaImage::new(2, 2)).unwrap();
        assert_eq!(
            detect_format(&png, Path::new("shot.jpg")),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            detect_format(b"", Path::new("shot.jpg")),
            Some(ImageFormat::Jpeg)
        );
    }
}
