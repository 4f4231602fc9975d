//! Result types for visual regression checks.

use serde::{Deserialize, Serialize};

use super::core::PixelImage;

/// Integer pixel rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn union(&self, other: &PixelRect) -> PixelRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        PixelRect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// How the coordinates of an [`IgnoreRegion`] are measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegionUnit {
    #[default]
    Pixels,
    /// Fractions (0..=1) of the image width and height
    Normalized,
}

/// Caller-supplied area excluded from a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IgnoreRegion {
    pub x: f32,
    pub y: f32,
    #[serde(alias = "w")]
    pub width: f32,
    #[serde(alias = "h")]
    pub height: f32,
    #[serde(default)]
    pub unit: RegionUnit,
}

impl IgnoreRegion {
    pub fn pixels(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x: x as f32,
            y: y as f32,
            width: width as f32,
            height: height as f32,
            unit: RegionUnit::Pixels,
        }
    }

    pub fn normalized(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            unit: RegionUnit::Normalized,
        }
    }

    pub fn is_normalized(&self) -> bool {
        self.unit == RegionUnit::Normalized
    }

    /// Resolves the region against an image of the given size, clipped to
    /// its bounds. Degenerate or fully outside regions yield `None`.
    pub fn to_pixel_rect(&self, img_w: u32, img_h: u32) -> Option<PixelRect> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let (rx, ry, rw, rh) = if self.is_normalized() {
            (
                self.x * img_w as f32,
                self.y * img_h as f32,
                self.width * img_w as f32,
                self.height * img_h as f32,
            )
        } else {
            (self.x, self.y, self.width, self.height)
        };

        let x0 = (rx.max(0.0).floor() as u32).min(img_w);
        let y0 = (ry.max(0.0).floor() as u32).min(img_h);
        let x1 = ((rx + rw).ceil().max(0.0) as u32).min(img_w);
        let y1 = ((ry + rh).ceil().max(0.0) as u32).min(img_h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// One contiguous area of change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferenceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Fraction of differing pixels inside the bounding box (0.0 - 1.0)
    pub difference_score: f64,
    /// Number of differing pixels inside the bounding box
    pub pixel_count: u64,
}

impl DifferenceRegion {
    pub fn rect(&self) -> PixelRect {
        PixelRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeClassification {
    Identical,
    MinorRendering,
    ContentChange,
}

impl ChangeClassification {
    /// Minor rendering jitter counts as a pass.
    pub fn is_passing(&self) -> bool {
        matches!(
            self,
            ChangeClassification::Identical | ChangeClassification::MinorRendering
        )
    }
}

/// Outcome of one visual check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub passed: bool,
    /// Percentage (0 - 100) of compared pixels that differ
    pub difference_percentage: f64,
    /// Mean SSIM over the full image (1.0 when no pixel differs)
    pub ssim_score: f64,
    pub pixels_different: u64,
    /// Pixels compared, excluding ignored areas
    pub total_pixels: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<DifferenceRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ChangeClassification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Rendered diff, kept in memory; callers persist it when wanted
    #[serde(skip)]
    pub diff_image: Option<PixelImage>,
}

impl ComparisonResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            difference_percentage: 0.0,
            ssim_score: 0.0,
            pixels_different: 0,
            total_pixels: 0,
            regions: Vec::new(),
            classification: None,
            error_message: Some(message.into()),
            diff_image: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_region_accepts_short_aliases() {
        let regions: Vec<IgnoreRegion> =
            serde_json::from_str(r#"[{"x":5,"y":6,"w":7,"h":8}]"#).expect("parse");
        assert_eq!(regions[0], IgnoreRegion::pixels(5, 6, 7, 8));
    }

    #[test]
    fn small_pixel_region_is_not_read_as_fractions() {
        let regions: Vec<IgnoreRegion> =
            serde_json::from_str(r#"[{"x":1,"y":0,"w":1,"h":1}]"#).expect("parse");
        assert!(!regions[0].is_normalized());
        assert_eq!(
            regions[0].to_pixel_rect(100, 100),
            Some(PixelRect {
                x: 1,
                y: 0,
                width: 1,
                height: 1
            })
        );
    }

    #[test]
    fn normalized_unit_is_read_from_json() {
        let regions: Vec<IgnoreRegion> = serde_json::from_str(
            r#"[{"x":0.5,"y":0.5,"width":0.5,"height":0.5,"unit":"normalized"}]"#,
        )
        .expect("parse");
        assert_eq!(regions[0], IgnoreRegion::normalized(0.5, 0.5, 0.5, 0.5));
    }

    #[test]
    fn normalized_region_scales_with_image() {
        let region = IgnoreRegion::normalized(0.5, 0.0, 0.5, 0.25);
        assert_eq!(
            region.to_pixel_rect(200, 100),
            Some(PixelRect {
                x: 100,
                y: 0,
                width: 100,
                height: 25
            })
        );
    }

    #[test]
    fn pixel_region_is_clipped() {
        let region = IgnoreRegion::pixels(90, 90, 50, 50);
        assert_eq!(
            region.to_pixel_rect(100, 100),
            Some(PixelRect {
                x: 90,
                y: 90,
                width: 10,
                height: 10
            })
        );
        assert_eq!(IgnoreRegion::pixels(200, 0, 5, 5).to_pixel_rect(100, 100), None);
    }

    #[test]
    fn rect_intersection_and_union() {
        let a = PixelRect {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        let b = PixelRect {
            x: 5,
            y: 5,
            width: 10,
            height: 10,
        };
        let c = PixelRect {
            x: 10,
            y: 0,
            width: 2,
            height: 2,
        };
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c), "touching edges do not overlap");
        assert_eq!(
            a.union(&b),
            PixelRect {
                x: 0,
                y: 0,
                width: 15,
                height: 15
            }
        );
    }

    #[test]
    fn diff_image_is_not_serialized() {
        let mut result = ComparisonResult::failed("boom");
        result.diff_image = Some(PixelImage::new(2, 2));
        let json = serde_json::to_value(&result).expect("serialize");
        assert!(json.get("diffImage").is_none());
        assert_eq!(json["errorMessage"], "boom");
        assert_eq!(json["passed"], false);
    }
}
