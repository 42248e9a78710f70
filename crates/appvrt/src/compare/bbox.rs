use image::RgbaImage;

/// Minimal rectangle enclosing every differing pixel, inclusive bounds.
/// `width`/`height` are those of the source image, not the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn box_width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn box_height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn center(&self) -> (f64, f64) {
        (
            f64::from(self.min_x + self.max_x) / 2.0,
            f64::from(self.min_y + self.max_y) / 2.0,
        )
    }
}

/// Scan a difference mask; a pixel counts when its alpha is non-zero.
/// Returns `None` when nothing differs.
pub fn bounding_box(mask: &RgbaImage) -> Option<BoundingBox> {
    let (width, height) = mask.dimensions();
    let mut min_x = i64::from(width);
    let mut min_y = i64::from(height);
    let mut max_x = -1i64;
    let mut max_y = -1i64;

    for (x, y, px) in mask.enumerate_pixels() {
        if px[3] > 0 {
            let (x, y) = (i64::from(x), i64::from(y));
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if max_x < 0 || max_y < 0 {
        return None;
    }

    Some(BoundingBox {
        min_x: min_x as u32,
        min_y: min_y as u32,
        max_x: max_x as u32,
        max_y: max_y as u32,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const MARK: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn empty_mask_has_no_box() {
        let mask = RgbaImage::new(40, 30);
        assert_eq!(bounding_box(&mask), None);
    }

    #[test]
    fn zero_sized_mask_has_no_box() {
        assert_eq!(bounding_box(&RgbaImage::new(0, 0)), None);
    }

    #[test]
    fn single_pixel_box_is_degenerate_point() {
        for (x0, y0) in [(0, 0), (39, 29), (17, 4)] {
            let mut mask = RgbaImage::new(40, 30);
            mask.put_pixel(x0, y0, MARK);
            let b = bounding_box(&mask).unwrap();
            assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (x0, y0, x0, y0));
            assert_eq!((b.box_width(), b.box_height()), (1, 1));
            assert_eq!((b.width, b.height), (40, 30));
        }
    }

    #[test]
    fn box_encloses_scattered_pixels() {
        let mut mask = RgbaImage::new(100, 100);
        mask.put_pixel(10, 60, MARK);
        mask.put_pixel(50, 10, MARK);
        mask.put_pixel(30, 30, MARK);
        let b = bounding_box(&mask).unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (10, 10, 50, 60));
        assert_eq!(b.box_width(), 41);
        assert_eq!(b.center(), (30.0, 35.0));
    }

    #[test]
    fn transparent_colour_does_not_count() {
        let mut mask = RgbaImage::new(10, 10);
        mask.put_pixel(5, 5, Rgba([255, 0, 0, 0]));
        assert_eq!(bounding_box(&mask), None);
    }
}
