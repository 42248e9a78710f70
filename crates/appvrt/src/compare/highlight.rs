use anyhow::Result;
use tracing::debug;

use super::bbox::BoundingBox;
use crate::codec::{self, ACCENT, Rect};

/// Where and how the difference marker is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub rect: Rect,
    pub stroke: u32,
    /// The box was too small to outline; `rect` is a nearby indicator square.
    pub tiny: bool,
}

/// Half-up rounding (`-2.5` rounds to `-2`), so placements are stable for
/// negative candidates too.
fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// Compute the marker geometry for `bbox` on a `width x height` image.
pub fn plan_marker(bbox: &BoundingBox, width: u32, height: u32) -> Marker {
    let min_side = f64::from(width.min(height));
    let stroke = round_half_up(min_side * 0.002).max(2) as u32;
    let min_dim = round_half_up(min_side * 0.004).max(6) as u32;

    let raw_w = bbox.box_width();
    let raw_h = bbox.box_height();
    let tiny = raw_w < min_dim || raw_h < min_dim;

    let (w, h) = (i64::from(width), i64::from(height));

    if !tiny {
        let x = i64::from(bbox.min_x).min(w - i64::from(raw_w)).max(0);
        let y = i64::from(bbox.min_y).min(h - i64::from(raw_h)).max(0);
        return Marker {
            rect: Rect {
                x,
                y,
                width: raw_w,
                height: raw_h,
            },
            stroke,
            tiny,
        };
    }

    let size = round_half_up(min_side * 0.015).max(12);
    let gap = round_half_up(size as f64 * 0.2).max(4);
    let half = size as f64 / 2.0;
    let (cx, cy) = bbox.center();
    let (min_x, min_y) = (i64::from(bbox.min_x), i64::from(bbox.min_y));
    let (max_x, max_y) = (i64::from(bbox.max_x), i64::from(bbox.max_y));

    let square = |x: i64, y: i64| Rect {
        x,
        y,
        width: size as u32,
        height: size as u32,
    };

    // right, above, left, below
    let candidates = [
        square(max_x + gap, round_half_up(cy - half)),
        square(round_half_up(cx - half), min_y - gap - size),
        square(min_x - gap - size, round_half_up(cy - half)),
        square(round_half_up(cx - half), max_y + gap),
    ];

    let rect = candidates
        .into_iter()
        .find(|c| c.fits_within(width, height))
        .unwrap_or_else(|| {
            let x = round_half_up(cx - half).min(w - size).max(0);
            let y = round_half_up(cy - half).min(h - size).max(0);
            square(x, y)
        });

    Marker { rect, stroke, tiny }
}

/// Draw the difference marker onto a copy of the current capture and
/// re-encode it as PNG. Input whose dimensions can't be read, or that has
/// none, comes back unchanged.
pub fn highlight(current: &[u8], bbox: &BoundingBox) -> Result<Vec<u8>> {
    let mut img = match codec::decode(current) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            debug!("Leaving undecodable capture unmarked: {e:#}");
            return Ok(current.to_vec());
        }
    };
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Ok(current.to_vec());
    }

    let marker = plan_marker(bbox, w, h);
    codec::stroke_rect(&mut img, marker.rect, marker.stroke, ACCENT);
    codec::encode_png(&img)
}
