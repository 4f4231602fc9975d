//! Diff rendering: grayscale context with highlighted change regions.

use image::Rgba;

use super::regions::DiffMask;
use crate::similarity::luminance;
use crate::types::{DifferenceRegion, PixelImage};

/// Share of the overlay color mixed into unchanged pixels inside a region.
const REGION_TINT: f64 = 0.3;

/// Renders the baseline in grayscale; inside every region, differing pixels
/// take the overlay color and the rest are tinted toward it.
pub fn render_diff_image(
    baseline: &PixelImage,
    mask: &DiffMask,
    regions: &[DifferenceRegion],
    overlay: [u8; 4],
) -> PixelImage {
    let (w, h) = baseline.dimensions();
    let mut out = PixelImage::from_fn(w, h, |x, y| {
        let g = luminance(baseline.get_pixel(x, y)).round().clamp(0.0, 255.0) as u8;
        Rgba([g, g, g, 255])
    });

    for region in regions {
        let rect = region.rect();
        for y in rect.y..rect.bottom().min(h) {
            for x in rect.x..rect.right().min(w) {
                if mask.get(x, y) {
                    out.put_pixel(x, y, Rgba(overlay));
                } else {
                    let g = out.get_pixel(x, y)[0] as f64;
                    let mix = |c: u8| {
                        (g * (1.0 - REGION_TINT) + c as f64 * REGION_TINT)
                            .round()
                            .clamp(0.0, 255.0) as u8
                    };
                    out.put_pixel(x, y, Rgba([mix(overlay[0]), mix(overlay[1]), mix(overlay[2]), 255]));
                }
            }
        }
    }

    out
}
