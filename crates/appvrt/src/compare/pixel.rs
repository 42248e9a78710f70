use image::{Rgba, RgbaImage};
use thiserror::Error;

/// Maximum possible delta in YIQ color space.
const MAX_YIQ_POSSIBLE_DELTA: f64 = 35215.0;

/// Perceptual threshold used when none is configured (0.0-1.0, smaller is stricter).
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Colour written into the mask for a differing pixel.
const MASK_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("dimension mismatch: {left_w}x{left_h} vs {right_w}x{right_h}")]
    DimensionMismatch {
        left_w: u32,
        left_h: u32,
        right_w: u32,
        right_h: u32,
    },

    #[error("image has no pixels")]
    Empty,
}

pub struct PixelDiff {
    /// Same dimensions as the inputs. Alpha > 0 marks a differing pixel,
    /// everything else is fully transparent.
    pub mask: RgbaImage,
    pub diff_pixels: u64,
    pub total_pixels: u64,
}

impl PixelDiff {
    /// 0.0 = identical, 1.0 = every pixel differs.
    pub fn fraction(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.diff_pixels as f64 / self.total_pixels as f64
        }
    }
}

/// Perceptual per-pixel comparison of two equal-size RGBA buffers.
///
/// Pixels whose YIQ delta exceeds `35215 * threshold^2` are marked in the
/// mask, unless they look like anti-aliasing in either image. Deterministic
/// for fixed inputs.
pub fn compare(
    baseline: &RgbaImage,
    current: &RgbaImage,
    threshold: f64,
) -> Result<PixelDiff, DiffError> {
    if baseline.dimensions() != current.dimensions() {
        return Err(DiffError::DimensionMismatch {
            left_w: baseline.width(),
            left_h: baseline.height(),
            right_w: current.width(),
            right_h: current.height(),
        });
    }
    let (w, h) = baseline.dimensions();
    if w == 0 || h == 0 {
        return Err(DiffError::Empty);
    }

    let total_pixels = u64::from(w) * u64::from(h);
    let mut mask = RgbaImage::new(w, h);

    // Byte-identical buffers cannot differ.
    if baseline.as_raw() == current.as_raw() {
        return Ok(PixelDiff {
            mask,
            diff_pixels: 0,
            total_pixels,
        });
    }

    let a = Buffer::new(baseline);
    let b = Buffer::new(current);
    let max_delta = MAX_YIQ_POSSIBLE_DELTA * threshold * threshold;
    let mut diff_pixels = 0u64;

    for y in 0..h {
        for x in 0..w {
            let delta = color_delta(&a, &b, a.offset(x, y), b.offset(x, y), false);
            if delta.abs() <= max_delta {
                continue;
            }
            if antialiased(&a, &b, x, y) || antialiased(&b, &a, x, y) {
                continue;
            }
            mask.put_pixel(x, y, MASK_COLOR);
            diff_pixels += 1;
        }
    }

    Ok(PixelDiff {
        mask,
        diff_pixels,
        total_pixels,
    })
}

struct Buffer<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> Buffer<'a> {
    fn new(img: &'a RgbaImage) -> Self {
        Self {
            data: img.as_raw(),
            width: img.width(),
            height: img.height(),
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    fn rgba(&self, k: usize) -> [u8; 4] {
        [
            self.data[k],
            self.data[k + 1],
            self.data[k + 2],
            self.data[k + 3],
        ]
    }

    /// 3x3 neighbourhood bounds clamped to the image.
    fn window(&self, x: u32, y: u32) -> (u32, u32, u32, u32) {
        (
            x.saturating_sub(1),
            y.saturating_sub(1),
            (x + 1).min(self.width - 1),
            (y + 1).min(self.height - 1),
        )
    }
}

fn blend(c: f64, a: f64) -> f64 {
    255.0 + (c - 255.0) * a
}

/// Composite a semi-transparent pixel over white.
fn opaque(px: [u8; 4]) -> (f64, f64, f64) {
    let [r, g, b, a] = px.map(f64::from);
    if a < 255.0 {
        let a = a / 255.0;
        (blend(r, a), blend(g, a), blend(b, a))
    } else {
        (r, g, b)
    }
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94
}

/// Signed perceptual delta between pixel `k` of `a` and pixel `m` of `b`.
/// Negative when the first pixel is brighter. With `y_only`, returns the
/// plain brightness difference.
fn color_delta(a: &Buffer, b: &Buffer, k: usize, m: usize, y_only: bool) -> f64 {
    let p1 = a.rgba(k);
    let p2 = b.rgba(m);
    if p1 == p2 {
        return 0.0;
    }
    let (r1, g1, b1) = opaque(p1);
    let (r2, g2, b2) = opaque(p2);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 { -delta } else { delta }
}

/// Whether the pixel at `(x, y)` of `img` looks like an anti-aliased edge:
/// it has both a darkest and a brightest neighbour, and one of those sits in
/// a flat region in both images.
fn antialiased(img: &Buffer, other: &Buffer, x: u32, y: u32) -> bool {
    let (x0, y0, x2, y2) = img.window(x, y);
    let pos = img.offset(x, y);
    let mut zeroes = u32::from(x == x0 || x == x2 || y == y0 || y == y2);
    let mut min = 0.0;
    let mut max = 0.0;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0, 0, 0, 0);

    for ny in y0..=y2 {
        for nx in x0..=x2 {
            if nx == x && ny == y {
                continue;
            }
            let delta = color_delta(img, img, pos, img.offset(nx, ny), true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_x = nx;
                min_y = ny;
            } else if delta > max {
                max = delta;
                max_x = nx;
                max_y = ny;
            }
        }
    }

    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_x, min_y) && has_many_siblings(other, min_x, min_y))
        || (has_many_siblings(img, max_x, max_y) && has_many_siblings(other, max_x, max_y))
}

/// More than two identical neighbours around `(x, y)`.
fn has_many_siblings(img: &Buffer, x: u32, y: u32) -> bool {
    let (x0, y0, x2, y2) = img.window(x, y);
    let pos = img.offset(x, y);
    let center = img.rgba(pos);
    let mut zeroes = u32::from(x == x0 || x == x2 || y == y0 || y == y2);

    for ny in y0..=y2 {
        for nx in x0..=x2 {
            if nx == x && ny == y {
                continue;
            }
            if img.rgba(img.offset(nx, ny)) == center {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}
