//! Visual regression comparison between a baseline and a fresh render.
//!
//! The engine never fails for "images differ" outcomes: mismatched sizes and
//! undecodable inputs come back as a failed [`ComparisonResult`] with an
//! `error_message`, everything else as a classified result.

pub mod diff_image;
pub mod regions;


use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, VsmeError};
use crate::image_loader::load_rgba;
use crate::similarity::{luminance, ssim_planes, DEFAULT_SSIM_WINDOW};
use crate::types::{ChangeClassification, ComparisonResult, IgnoreRegion, PixelImage};

pub use diff_image::render_diff_image;
pub use regions::{extract_regions, DiffMask};

/// Magenta, opaque.
pub const DEFAULT_OVERLAY_COLOR: [u8; 4] = [255, 0, 255, 255];

const MAX_CHANNEL_DISTANCE: f64 = 2.0 * 255.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Normalized color distance (0 - 1) above which a pixel counts as different
    pub tolerance: f64,
    /// Connected components smaller than this are discarded as noise
    pub min_region_pixels: u64,
    pub minor_ssim_threshold: f64,
    /// Percentage (0 - 100)
    pub minor_max_difference_percent: f64,
    pub ssim_window: u32,
    pub overlay_color: [u8; 4],
    /// Render the diff image even when the comparison passes
    pub always_render_diff: bool,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            min_region_pixels: 10,
            minor_ssim_threshold: 0.95,
            minor_max_difference_percent: 5.0,
            ssim_window: DEFAULT_SSIM_WINDOW,
            overlay_color: DEFAULT_OVERLAY_COLOR,
            always_render_diff: false,
        }
    }
}

impl ComparisonConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(VsmeError::config(format!(
                "comparison tolerance {} is outside [0,1]",
                self.tolerance
            )));
        }
        if !(0.0..=1.0).contains(&self.minor_ssim_threshold) {
            return Err(VsmeError::config(format!(
                "minor_ssim_threshold {} is outside [0,1]",
                self.minor_ssim_threshold
            )));
        }
        if !(0.0..=100.0).contains(&self.minor_max_difference_percent) {
            return Err(VsmeError::config(format!(
                "minor_max_difference_percent {} is outside [0,100]",
                self.minor_max_difference_percent
            )));
        }
        if self.ssim_window == 0 {
            return Err(VsmeError::config("ssim_window must be positive"));
        }
        Ok(())
    }
}

/// Euclidean RGBA distance normalized to [0,1].
#[inline]
pub fn pixel_distance(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> f64 {
    let sum: f64 = (0..4)
        .map(|c| {
            let d = a[c] as f64 - b[c] as f64;
            d * d
        })
        .sum();
    sum.sqrt() / MAX_CHANNEL_DISTANCE
}

#[derive(Debug, Clone, Default)]
pub struct ComparisonEngine {
    config: ComparisonConfig,
}

impl ComparisonEngine {
    pub fn new(config: ComparisonConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Compares with the configured tolerance.
    pub fn compare(
        &self,
        baseline: &PixelImage,
        actual: &PixelImage,
        ignore_regions: &[IgnoreRegion],
    ) -> ComparisonResult {
        self.compare_with_tolerance(baseline, actual, self.config.tolerance, ignore_regions)
    }

    pub fn compare_with_tolerance(
        &self,
        baseline: &PixelImage,
        actual: &PixelImage,
        tolerance: f64,
        ignore_regions: &[IgnoreRegion],
    ) -> ComparisonResult {
        if baseline.dimensions() != actual.dimensions() {
            let (bw, bh) = baseline.dimensions();
            let (aw, ah) = actual.dimensions();
            warn!(bw, bh, aw, ah, "comparison inputs differ in size");
            return ComparisonResult::failed(format!(
                "Dimension mismatch: baseline {bw}x{bh}, actual {aw}x{ah}"
            ));
        }

        let (w, h) = baseline.dimensions();
        let ignored = ignore_mask(w, h, ignore_regions);
        let mut mask = DiffMask::new(w, h);
        let mut total = 0u64;
        let mut different = 0u64;

        for (x, y, base_px) in baseline.enumerate_pixels() {
            if ignored.get(x, y) {
                continue;
            }
            total += 1;
            if pixel_distance(base_px, actual.get_pixel(x, y)) > tolerance {
                mask.set(x, y);
                different += 1;
            }
        }

        if total == 0 && w > 0 && h > 0 {
            warn!(regions = ignore_regions.len(), "ignore regions cover the whole image");
            return ComparisonResult::failed(format!(
                "Ignore regions cover the whole {w}x{h} image; nothing was compared"
            ));
        }

        let difference_percentage = if total == 0 {
            0.0
        } else {
            different as f64 / total as f64 * 100.0
        };

        let ssim_score = if different == 0 {
            1.0
        } else {
            masked_ssim(baseline, actual, &ignored, self.config.ssim_window)
        };

        let regions = extract_regions(&mask, self.config.min_region_pixels);

        let classification = if regions.is_empty() {
            ChangeClassification::Identical
        } else if ssim_score > self.config.minor_ssim_threshold
            && difference_percentage < self.config.minor_max_difference_percent
        {
            ChangeClassification::MinorRendering
        } else {
            ChangeClassification::ContentChange
        };
        let passed = classification.is_passing();

        debug!(
            different,
            total,
            ssim = ssim_score,
            regions = regions.len(),
            ?classification,
            "comparison classified"
        );

        let diff_image = (!passed || self.config.always_render_diff)
            .then(|| render_diff_image(baseline, &mask, &regions, self.config.overlay_color));

        ComparisonResult {
            passed,
            difference_percentage,
            ssim_score,
            pixels_different: different,
            total_pixels: total,
            regions,
            classification: Some(classification),
            error_message: None,
            diff_image,
        }
    }

    /// Loads and compares two image files; unreadable inputs become a failed
    /// result rather than an error.
    pub fn compare_files(
        &self,
        baseline: &Path,
        actual: &Path,
        ignore_regions: &[IgnoreRegion],
    ) -> ComparisonResult {
        let load = |path: &Path, label: &str| {
            load_rgba(&path.to_string_lossy())
                .map_err(|e| format!("Failed to read {label} image {}: {e}", path.display()))
        };
        let baseline = match load(baseline, "baseline") {
            Ok(img) => img,
            Err(message) => return ComparisonResult::failed(message),
        };
        let actual = match load(actual, "actual") {
            Ok(img) => img,
            Err(message) => return ComparisonResult::failed(message),
        };
        self.compare(&baseline, &actual, ignore_regions)
    }
}

/// Compares two images with default settings and the given tolerance.
pub fn compare_images(
    baseline: &PixelImage,
    actual: &PixelImage,
    tolerance: f64,
    ignore_regions: &[IgnoreRegion],
) -> ComparisonResult {
    ComparisonEngine::default().compare_with_tolerance(baseline, actual, tolerance, ignore_regions)
}

/// Reads a JSON array of ignore regions (`{x,y,width,height}`, `w`/`h`
/// aliases allowed).
pub fn load_ignore_regions(path: &Path) -> Result<Vec<IgnoreRegion>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| VsmeError::config(format!("Failed to read ignore-regions: {e}")))?;
    let regions: Vec<IgnoreRegion> = serde_json::from_str(&data).map_err(|e| {
        VsmeError::config(format!(
            "Invalid ignore-regions JSON (expected array of {{x,y,width,height,unit?}}; w/h aliases allowed): {e}"
        ))
    })?;
    if regions.is_empty() {
        return Err(VsmeError::config("ignore-regions file contained no regions"));
    }
    Ok(regions)
}

fn ignore_mask(w: u32, h: u32, regions: &[IgnoreRegion]) -> DiffMask {
    let mut mask = DiffMask::new(w, h);
    for rect in regions.iter().filter_map(|r| r.to_pixel_rect(w, h)) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                mask.set(x, y);
            }
        }
    }
    mask
}

/// SSIM with ignored pixels made identical in both planes.
fn masked_ssim(baseline: &PixelImage, actual: &PixelImage, ignored: &DiffMask, window: u32) -> f64 {
    let (w, h) = baseline.dimensions();
    let base_plane: Vec<f64> = baseline.pixels().map(luminance).collect();
    let actual_plane: Vec<f64> = actual
        .enumerate_pixels()
        .zip(&base_plane)
        .map(|((x, y, px), base)| if ignored.get(x, y) { *base } else { luminance(px) })
        .collect();
    ssim_planes(&base_plane, &actual_plane, w, h, window)
}
