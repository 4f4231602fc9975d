//! Self-healing of broken element locators.
//!
//! Given a locator that no longer resolves to one visible element and a
//! description of what it used to match, the [`HealingOrchestrator`] runs
//! the strategies in policy order, scores every candidate through the
//! [`ConfidenceModel`](crate::confidence::ConfidenceModel), verifies the
//! winner against the live page and returns a [`HealingOutcome`].
//!
//! # Module Structure
//!
//! - [`orchestrator`] - Strategy loop, budgets, cancellation, verification
//! - [`strategies`] - Candidate selection per strategy
//! - [`scoring`] - Data-parallel candidate scoring
//! - [`locator`] - Stable replacement locator synthesis
//! - [`retry`] - Bounded retry for external calls
//!
//! [`HealingOutcome`]: crate::types::HealingOutcome

pub mod locator;
pub mod orchestrator;
pub mod retry;
pub mod scoring;
mod strategies;


use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{Result, VsmeError};
use crate::types::{ElementDescription, StrategyKind};

pub use locator::{stable_locators, synthesize_locator};
pub use orchestrator::{bias_order, HealingOrchestrator};
pub use retry::{with_retry, RetryError, RetryPolicy};
pub use scoring::{score_element, score_parallel, PatchSource, ScoringInputs, Signals};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingConfig {
    /// Minimum confidence for a verified candidate to count as healed
    pub acceptance_threshold: f64,
    /// Confidence at which an unambiguous candidate ends the search early
    pub shortcut_threshold: f64,
    #[serde(with = "humantime_serde")]
    pub overall_budget: Duration,
    #[serde(with = "humantime_serde")]
    pub strategy_budget: Duration,
    /// Pooled candidates verified after the strategies run out
    pub max_verifications: usize,
    /// Candidates kept per strategy
    pub top_n: usize,
    pub strategies: Vec<StrategyKind>,
    /// Return early when the original locator still resolves uniquely
    pub check_original: bool,
    pub history_bias_positions: usize,
    pub history_limit: usize,
    #[serde(with = "humantime_serde")]
    pub history_timeout: Duration,
    /// Interactive elements sent to the language model
    pub max_catalog: usize,
    pub retry: RetryPolicy,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.75,
            shortcut_threshold: 0.9,
            overall_budget: Duration::from_secs(60),
            strategy_budget: Duration::from_secs(20),
            max_verifications: 5,
            top_n: 5,
            strategies: StrategyKind::DEFAULT_ORDER.to_vec(),
            check_original: true,
            history_bias_positions: 2,
            history_limit: 20,
            history_timeout: Duration::from_millis(500),
            max_catalog: 150,
            retry: RetryPolicy::default(),
        }
    }
}

impl HealingConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("acceptance_threshold", self.acceptance_threshold),
            ("shortcut_threshold", self.shortcut_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(VsmeError::config(format!(
                    "healing {name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.shortcut_threshold < self.acceptance_threshold {
            return Err(VsmeError::config(
                "healing shortcut_threshold must not be below acceptance_threshold",
            ));
        }
        if self.overall_budget.is_zero() || self.strategy_budget.is_zero() {
            return Err(VsmeError::config("healing budget/timeout must be positive"));
        }
        if self.top_n == 0 {
            return Err(VsmeError::config("healing top_n must be at least 1"));
        }
        if self.strategies.is_empty() {
            return Err(VsmeError::config("healing needs at least one strategy"));
        }
        let mut unique = HashSet::new();
        if let Some(dup) = self.strategies.iter().find(|s| !unique.insert(**s)) {
            return Err(VsmeError::config(format!(
                "strategy {dup} is listed more than once"
            )));
        }
        self.retry.validate()
    }
}

/// Input of one healing run. Read-only once built.
#[derive(Debug, Clone)]
pub struct HealingContext {
    pub original_locator: String,
    pub description: ElementDescription,
    pub config: HealingConfig,
}

impl HealingContext {
    pub fn new(original_locator: impl Into<String>, description: ElementDescription) -> Self {
        Self {
            original_locator: original_locator.into(),
            description,
            config: HealingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: HealingConfig) -> Self {
        self.config = config;
        self
    }
}
