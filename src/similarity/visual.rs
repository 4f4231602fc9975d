//! Visual similarity between a reference patch and a candidate patch.
//!
//! The perceptual hash is the cheap first pass. Full SSIM only runs when the
//! hash score lands in the ambiguous band, after resizing the candidate to
//! the reference size.

use serde::{Deserialize, Serialize};

use super::phash::{PerceptualHash, DEFAULT_HASH_SIZE};
use super::ssim::{ssim, DEFAULT_SSIM_WINDOW};
use crate::image_loader::resize_to_match;
use crate::types::PixelImage;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub hash_size: u32,
    /// Hash scores below this are trusted as a clear mismatch
    pub ambiguous_low: f64,
    /// Hash scores at or above this are trusted as a clear match
    pub ambiguous_high: f64,
    /// Weight of SSIM against the hash score in the ambiguous band
    pub ssim_weight: f64,
    pub ssim_window: u32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            hash_size: DEFAULT_HASH_SIZE,
            ambiguous_low: 0.5,
            ambiguous_high: 0.9,
            ssim_weight: 0.7,
            ssim_window: DEFAULT_SSIM_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualScore {
    pub score: f64,
    pub hash_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssim: Option<f64>,
}

/// Scores candidates against one reference patch; the reference hash is
/// computed once and shared read-only across scoring tasks.
#[derive(Debug, Clone)]
pub struct VisualMatcher {
    config: VisualConfig,
    reference: PixelImage,
    reference_hash: PerceptualHash,
}

impl VisualMatcher {
    pub fn new(reference: PixelImage, config: VisualConfig) -> Self {
        let reference_hash = PerceptualHash::compute(&reference, config.hash_size);
        Self {
            config,
            reference,
            reference_hash,
        }
    }

    pub fn reference(&self) -> &PixelImage {
        &self.reference
    }

    /// Hash evidence: bit agreement scaled by brightness agreement, so two
    /// flat patches of different colors do not look identical.
    pub fn hash_score(&self, candidate_hash: &PerceptualHash) -> f64 {
        let bits = self.reference_hash.similarity(candidate_hash);
        let brightness = 1.0
            - (self.reference_hash.mean_luminance() - candidate_hash.mean_luminance()).abs()
                / 255.0;
        (bits * brightness).clamp(0.0, 1.0)
    }

    pub fn score(&self, candidate: &PixelImage) -> VisualScore {
        if candidate.width() == 0 || candidate.height() == 0 {
            return VisualScore {
                score: 0.0,
                hash_score: 0.0,
                ssim: None,
            };
        }

        let candidate_hash = PerceptualHash::compute(candidate, self.config.hash_size);
        let hash_score = self.hash_score(&candidate_hash);

        if hash_score < self.config.ambiguous_low || hash_score >= self.config.ambiguous_high {
            return VisualScore {
                score: hash_score,
                hash_score,
                ssim: None,
            };
        }

        let (w, h) = self.reference.dimensions();
        let resized;
        let candidate = if candidate.dimensions() == (w, h) {
            candidate
        } else {
            resized = resize_to_match(candidate, w, h);
            &resized
        };
        let structural = ssim(&self.reference, candidate, self.config.ssim_window);
        let weight = self.config.ssim_weight.clamp(0.0, 1.0);
        VisualScore {
            score: (weight * structural + (1.0 - weight) * hash_score).clamp(0.0, 1.0),
            hash_score,
            ssim: Some(structural),
        }
    }
}

/// One-off visual similarity between two patches.
pub fn visual_similarity(
    reference: &PixelImage,
    candidate: &PixelImage,
    config: VisualConfig,
) -> VisualScore {
    VisualMatcher::new(reference.clone(), config).score(candidate)
}
