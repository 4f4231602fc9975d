//! Geometry and raster primitives.

use serde::{Deserialize, Serialize};

pub use crate::viewport::Viewport;

/// Decoded raster image: a width x height grid of RGBA samples.
pub type PixelImage = image::RgbaImage;

/// Rectangle bounds for an element, in document (page) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Clips the box to an image of the given size and returns integer pixel
    /// bounds `(x, y, w, h)`, or `None` when nothing remains.
    pub fn clip_to(&self, img_width: u32, img_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.floor().max(0.0);
        let y0 = self.y.floor().max(0.0);
        let x1 = (self.x + self.width).ceil().min(img_width as f64);
        let y1 = (self.y + self.height).ceil().min(img_height as f64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_and_area() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(b.center(), (25.0, 40.0));
        assert_eq!(b.area(), 1200.0);
    }

    #[test]
    fn clip_to_trims_overhanging_boxes() {
        let b = BoundingBox::new(-5.0, 90.0, 20.0, 20.0);
        assert_eq!(b.clip_to(100, 100), Some((0, 90, 15, 10)));
    }

    #[test]
    fn clip_to_rejects_boxes_outside_image() {
        let b = BoundingBox::new(150.0, 10.0, 20.0, 20.0);
        assert_eq!(b.clip_to(100, 100), None);
        let empty = BoundingBox::new(10.0, 10.0, 0.0, 5.0);
        assert_eq!(empty.clip_to(100, 100), None);
    }
}
