//! Similarity primitives shared by visual checks and locator healing.
//!
//! Every function returns a score in [0,1]; `Option` results use `None` for
//! "not applicable", which the confidence model treats as absent evidence.

pub mod attributes;
pub mod phash;
pub mod position;
pub mod ssim;
pub mod text;
pub mod visual;

pub use attributes::{
    attribute_signature, attribute_similarity, fuzzy_attribute_similarity,
    has_comparable_attributes, is_generated_id,
    locator_attribute_keys, STABLE_ATTRIBUTES,
};
pub use phash::{PerceptualHash, DEFAULT_HASH_SIZE};
pub use position::{positional_similarity, PositionalConfig};
pub use ssim::{luminance, luminance_plane, ssim, ssim_planes, DEFAULT_SSIM_WINDOW};
pub use text::{best_text_similarity, levenshtein, normalize_text, text_similarity};
pub use visual::{visual_similarity, VisualConfig, VisualMatcher, VisualScore};
