//! Positional similarity between a last-known box and a current box.
//!
//! Boxes are in document coordinates, so scrolling does not move them. The
//! center distance is normalized by the viewport diagonal.

use serde::{Deserialize, Serialize};

use crate::types::BoundingBox;
use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionalConfig {
    /// Normalized distance at and beyond which the score is 0
    pub tolerance_radius: f64,
}

impl Default for PositionalConfig {
    fn default() -> Self {
        Self {
            tolerance_radius: 0.25,
        }
    }
}

/// Gaussian decay of the normalized center distance, cut to 0 outside the
/// tolerance radius.
pub fn positional_similarity(
    last_known: &BoundingBox,
    current: &BoundingBox,
    viewport: Viewport,
    config: &PositionalConfig,
) -> f64 {
    let diagonal = viewport.diagonal();
    if diagonal <= 0.0 || config.tolerance_radius <= 0.0 {
        return 0.0;
    }

    let (ax, ay) = last_known.center();
    let (bx, by) = current.center();
    let r = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt() / diagonal;
    if !r.is_finite() || r >= config.tolerance_radius {
        return 0.0;
    }
    let sigma = config.tolerance_radius / 2.0;
    (-(r / sigma).powi(2)).exp().clamp(0.0, 1.0)
}
