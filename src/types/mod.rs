//! Core data types shared by comparison and healing.
//!
//! - [`core`] - geometry and the decoded pixel grid
//! - [`comparison`] - visual check results and difference regions
//! - [`page`] - live page elements and stored element descriptions
//! - [`healing`] - similarity evidence, candidates and healing outcomes

pub mod comparison;
pub mod core;
pub mod healing;
pub mod page;

pub use self::comparison::{
    ChangeClassification, ComparisonResult, DifferenceRegion, IgnoreRegion, PixelRect, RegionUnit,
};
pub use self::core::{BoundingBox, PixelImage};
pub use self::healing::{
    AttemptStatus, HealingEvent, HealingOutcome, OutcomeReason, SelectorCandidate,
    SimilarityScores, StrategyAttempt, StrategyKind,
};
pub use self::page::{ElementDescription, PageElement};
