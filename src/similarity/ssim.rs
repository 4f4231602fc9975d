//! Windowed structural similarity over luminance.
//!
//! Window statistics come from summed-area tables so every window position
//! (stride 1) costs O(1) regardless of window size.

use crate::types::PixelImage;

pub const DEFAULT_SSIM_WINDOW: u32 = 8;

const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Luminance of one RGBA sample: `0.299R + 0.587G + 0.114B`.
#[inline]
pub fn luminance(px: &image::Rgba<u8>) -> f64 {
    0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64
}

/// Row-major luminance plane of an image.
pub fn luminance_plane(img: &PixelImage) -> Vec<f64> {
    img.pixels().map(luminance).collect()
}

/// Mean SSIM between two same-sized images.
///
/// Returns 0.0 when the sizes differ; callers resize first when they want a
/// score across sizes.
pub fn ssim(a: &PixelImage, b: &PixelImage, window: u32) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 0.0;
    }
    let (w, h) = a.dimensions();
    ssim_planes(&luminance_plane(a), &luminance_plane(b), w, h, window)
}

/// Mean SSIM between two luminance planes of `width x height` samples.
///
/// The window is capped to the plane size, so tiny patches still get one
/// full-size window. An empty plane is trivially identical.
pub fn ssim_planes(x: &[f64], y: &[f64], width: u32, height: u32, window: u32) -> f64 {
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 || x.len() < w * h || y.len() < w * h {
        return 1.0;
    }

    let win_w = (window.max(1) as usize).min(w);
    let win_h = (window.max(1) as usize).min(h);
    let n = (win_w * win_h) as f64;

    let tables = SummedAreaTables::build(x, y, w, h);

    let mut total = 0.0f64;
    let mut count = 0usize;
    for wy in 0..=(h - win_h) {
        for wx in 0..=(w - win_w) {
            let s = tables.window(wx, wy, win_w, win_h);
            let mu_x = s.x / n;
            let mu_y = s.y / n;
            let var_x = (s.xx / n - mu_x * mu_x).max(0.0);
            let var_y = (s.yy / n - mu_y * mu_y).max(0.0);
            let cov = s.xy / n - mu_x * mu_y;

            let numerator = (2.0 * mu_x * mu_y + C1) * (2.0 * cov + C2);
            let denominator = (mu_x * mu_x + mu_y * mu_y + C1) * (var_x + var_y + C2);
            total += numerator / denominator;
            count += 1;
        }
    }

    (total / count as f64).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, Default)]
struct WindowSums {
    x: f64,
    y: f64,
    xx: f64,
    yy: f64,
    xy: f64,
}

struct SummedAreaTables {
    stride: usize,
    sums: Vec<WindowSums>,
}

impl SummedAreaTables {
    fn build(x: &[f64], y: &[f64], w: usize, h: usize) -> Self {
        let stride = w + 1;
        let mut sums = vec![WindowSums::default(); stride * (h + 1)];
        for row in 0..h {
            let mut acc = WindowSums::default();
            for col in 0..w {
                let i = row * w + col;
                let (a, b) = (x[i], y[i]);
                acc.x += a;
                acc.y += b;
                acc.xx += a * a;
                acc.yy += b * b;
                acc.xy += a * b;

                let above = sums[row * stride + col + 1];
                sums[(row + 1) * stride + col + 1] = WindowSums {
                    x: above.x + acc.x,
                    y: above.y + acc.y,
                    xx: above.xx + acc.xx,
                    yy: above.yy + acc.yy,
                    xy: above.xy + acc.xy,
                };
            }
        }
        Self { stride, sums }
    }

    fn window(&self, x0: usize, y0: usize, w: usize, h: usize) -> WindowSums {
        let at = |x: usize, y: usize| self.sums[y * self.stride + x];
        let (a, b, c, d) = (at(x0, y0), at(x0 + w, y0), at(x0, y0 + h), at(x0 + w, y0 + h));
        WindowSums {
            x: d.x - b.x - c.x + a.x,
            y: d.y - b.y - c.y + a.y,
            xx: d.xx - b.xx - c.xx + a.xx,
            yy: d.yy - b.yy - c.yy + a.yy,
            xy: d.xy - b.xy - c.xy + a.xy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checkerboard(size: u32, cell: u32, dark: u8, light: u8) -> PixelImage {
        PixelImage::from_fn(size, size, |x, y| {
            let v = if ((x / cell) + (y / cell)) % 2 == 0 {
                dark
            } else {
                light
            };
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn identical_images_score_one() {
        let img = checkerboard(32, 4, 10, 240);
        let score = ssim(&img, &img, DEFAULT_SSIM_WINDOW);
        assert!((score - 1.0).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn slightly_shifted_contrast_stays_high() {
        let a = checkerboard(40, 8, 20, 235);
        let b = checkerboard(40, 8, 24, 231);
        let score = ssim(&a, &b, DEFAULT_SSIM_WINDOW);
        assert!(score >= 0.92, "score was {score}");
    }

    #[test]
    fn structure_change_scores_low() {
        let a = checkerboard(40, 8, 0, 255);
        let b = PixelImage::from_pixel(40, 40, Rgba([128, 128, 128, 255]));
        let score = ssim(&a, &b, DEFAULT_SSIM_WINDOW);
        assert!(score < 0.5, "score was {score}");
    }

    #[test]
    fn inverted_pattern_scores_near_zero() {
        let a = checkerboard(40, 8, 0, 255);
        let b = checkerboard(40, 8, 255, 0);
        let score = ssim(&a, &b, DEFAULT_SSIM_WINDOW);
        assert!(score < 0.1, "score was {score}");
    }

    #[test]
    fn window_is_capped_for_tiny_images() {
        let a = PixelImage::from_pixel(3, 2, Rgba([50, 50, 50, 255]));
        let b = PixelImage::from_pixel(3, 2, Rgba([50, 50, 50, 255]));
        assert!((ssim(&a, &b, 8) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mismatched_sizes_score_zero() {
        let a = PixelImage::new(4, 4);
        let b = PixelImage::new(5, 4);
        assert_eq!(ssim(&a, &b, 8), 0.0);
    }

    #[test]
    fn empty_plane_is_identical() {
        assert_eq!(ssim_planes(&[], &[], 0, 0, 8), 1.0);
    }

    #[test]
    fn luminance_uses_rec601_weights() {
        let px = Rgba([255, 0, 0, 255]);
        assert!((luminance(&px) - 76.245).abs() < 1e-9);
        let white = Rgba([255, 255, 255, 0]);
        assert!((luminance(&white) - 255.0).abs() < 1e-9);
    }
}
