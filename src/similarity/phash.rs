//! Average-style perceptual hash.
//!
//! The patch is downsampled to a `size x size` grayscale grid and every cell
//! is thresholded against the grid mean, giving one bit per cell.

use image::imageops::{self, FilterType};

use super::ssim::luminance;
use crate::types::PixelImage;

pub const DEFAULT_HASH_SIZE: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct PerceptualHash {
    bits: Vec<u64>,
    len: u32,
    /// Mean luminance of the downsampled grid (0 - 255)
    mean: f64,
}

impl PerceptualHash {
    pub fn compute(img: &PixelImage, size: u32) -> Self {
        let size = size.max(1);
        let len = size * size;
        let mut bits = vec![0u64; (len as usize).div_ceil(64)];
        if img.width() == 0 || img.height() == 0 {
            return Self {
                bits,
                len,
                mean: 0.0,
            };
        }

        let grid = imageops::resize(img, size, size, FilterType::Triangle);
        let samples: Vec<f64> = grid.pixels().map(luminance).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;

        for (i, sample) in samples.iter().enumerate() {
            if *sample > mean {
                bits[i / 64] |= 1u64 << (i % 64);
            }
        }
        Self { bits, len, mean }
    }

    pub fn bit_len(&self) -> u32 {
        self.len
    }

    pub fn mean_luminance(&self) -> f64 {
        self.mean
    }

    /// Number of differing bits. Hashes of different sizes differ everywhere.
    pub fn hamming_distance(&self, other: &PerceptualHash) -> u32 {
        if self.len != other.len {
            return self.len.max(other.len);
        }
        self.bits
            .iter()
            .zip(&other.bits)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// `1 - hamming / bits`.
    pub fn similarity(&self, other: &PerceptualHash) -> f64 {
        let bits = self.len.max(other.len).max(1) as f64;
        (1.0 - self.hamming_distance(other) as f64 / bits).clamp(0.0, 1.0)
    }
}
