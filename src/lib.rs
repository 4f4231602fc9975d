//! Visual Similarity & Matching Engine (VSME) Library
//!
//! Two jobs share one set of similarity primitives:
//!
//! - visual regression checks: compare a screenshot against an approved
//!   baseline, extract the regions that changed and classify the change as
//!   identical, minor rendering noise or a content change;
//! - locator self-healing: when a stored element locator stops resolving,
//!   search the live page for the element it used to match and propose a
//!   stable replacement with a calibrated confidence.
//!
//! # Module Overview
//!
//! - [`comparison`] - Pixel diff, ignore regions, difference regions, diff image
//! - [`similarity`] - SSIM, perceptual hash, text, positional and attribute scores
//! - [`confidence`] - Weighted aggregation, presets and ambiguity penalties
//! - [`healing`] - Multi-strategy healing orchestrator
//! - [`browser`] - Browser-driver boundary and the offline snapshot driver
//! - [`llm`] - Language-model boundary and an OpenAI-compatible client
//! - [`history`] - Healing history stores
//! - [`baseline`] - Append-only baseline version log
//! - [`config`] - Configuration file support
//! - [`types`] - Core data types and structures
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use vsme_lib::{ConfidenceModel, ElementDescription, HealingContext, HealingOrchestrator};
//! use vsme_lib::SnapshotDriver;
//!
//! # async fn example() -> vsme_lib::Result<()> {
//! let driver = SnapshotDriver::from_file("page.json".as_ref())?;
//! let orchestrator = HealingOrchestrator::new(Arc::new(driver), ConfidenceModel::default());
//!
//! let description = ElementDescription {
//!     tag: Some("button".into()),
//!     text: Some("Submit".into()),
//!     ..Default::default()
//! };
//! let ctx = HealingContext::new("#submit-btn", description);
//! let outcome = orchestrator.heal(&ctx, &CancellationToken::new()).await?;
//! println!("{:?} -> {:?}", outcome.reason, outcome.locator());
//! # Ok(())
//! # }
//! ```

pub mod baseline;
pub mod browser;
pub mod comparison;
pub mod confidence;
pub mod config;
pub mod error;
pub mod healing;
pub mod history;
pub mod image_loader;
pub mod llm;
pub mod output;
pub mod progress;
pub mod similarity;
pub mod types;
pub mod viewport;

pub use baseline::{BaselineEntry, BaselineId, BaselineLog};
pub use browser::{locator_matches, BrowserDriver, PageSnapshot, SnapshotDriver};
pub use comparison::{compare_images, load_ignore_regions, ComparisonConfig, ComparisonEngine};
pub use confidence::{ConfidenceConfig, ConfidenceModel, ConfidencePreset, ConfidenceWeights};
pub use config::Config;
pub use error::{ErrorCategory, ErrorPayload, Result, ServiceError, ServiceKind, VsmeError};
pub use healing::{HealingConfig, HealingContext, HealingOrchestrator, RetryPolicy};
pub use history::{HistoryRecord, HistoryStore, InMemoryHistory, JsonlHistoryStore};
pub use image_loader::{load_image, load_rgba, save_png};
pub use llm::{LanguageModel, LlmConfig, OpenAiLanguageModel, ProposedLocator};
pub use output::{
    BaselineOutput, CompareOutput, ErrorOutput, HealOutput, VsmeOutput, VSME_OUTPUT_VERSION,
};
pub use progress::ProgressCallback;
pub use similarity::{PositionalConfig, VisualConfig};
pub use types::{
    BoundingBox, ComparisonResult, DifferenceRegion, ElementDescription, HealingEvent,
    HealingOutcome, IgnoreRegion, OutcomeReason, PageElement, PixelImage, RegionUnit,
    SelectorCandidate, SimilarityScores, StrategyKind,
};
pub use viewport::Viewport;
