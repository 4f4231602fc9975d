//! Strategy loop of a healing run.
//!
//! Strategies run one after another in policy order. Scoring inside a
//! strategy is parallel; the candidate pool is only touched between
//! strategies. Every suspension point races the cancellation token and the
//! remaining budget.

use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::locator::synthesize_locator;
use super::retry::{with_retry, RetryError};
use super::scoring::ScoringInputs;
use super::strategies::{produce, PageState, ScoredElement, StrategyEnv, StrategyYield};
use super::{HealingConfig, HealingContext};
use crate::browser::BrowserDriver;
use crate::confidence::ConfidenceModel;
use crate::error::Result;
use crate::history::{HistoryRecord, HistoryStore};
use crate::image_loader::load_rgba;
use crate::llm::LanguageModel;
use crate::progress::{emit, ProgressCallback};
use crate::similarity::{
    attribute_signature, locator_attribute_keys, PositionalConfig, VisualConfig, VisualMatcher,
};
use crate::types::{
    AttemptStatus, HealingEvent, HealingOutcome, OutcomeReason, PageElement, PixelImage,
    SelectorCandidate, StrategyAttempt, StrategyKind,
};

/// Awaits `fut` unless the token fires or `limit` passes first.
async fn guarded<T>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = tokio::time::timeout(limit, fut) => result.ok(),
    }
}

fn by_confidence(a: &SelectorCandidate, b: &SelectorCandidate) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
}

/// Moves strategies that recently healed this locator up by at most
/// `max_shift` places. The generative strategy is never promoted.
pub fn bias_order(
    order: &[StrategyKind],
    records: &[HistoryRecord],
    max_shift: usize,
) -> Vec<StrategyKind> {
    let mut wins: HashMap<StrategyKind, usize> = HashMap::new();
    for strategy in records
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.strategy)
        .filter(|s| *s != StrategyKind::Generative)
    {
        *wins.entry(strategy).or_default() += 1;
    }

    let mut winners: Vec<(StrategyKind, usize, usize)> = order
        .iter()
        .enumerate()
        .filter_map(|(pos, s)| wins.get(s).map(|w| (*s, *w, pos)))
        .collect();
    // Strongest winner moves last so it ends up in front.
    winners.sort_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)));

    let mut biased = order.to_vec();
    for (strategy, _, _) in winners {
        if let Some(pos) = biased.iter().position(|s| *s == strategy) {
            let item = biased.remove(pos);
            biased.insert(pos.saturating_sub(max_shift), item);
        }
    }
    biased
}

/// Mutable bookkeeping of one run.
struct Run {
    started: Instant,
    deadline: Instant,
    attempts: Vec<StrategyAttempt>,
    best_confidence: f64,
}

impl Run {
    fn expired(&self, cancel: &CancellationToken) -> bool {
        cancel.is_cancelled() || Instant::now() >= self.deadline
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn finish(
        self,
        reason: OutcomeReason,
        candidate: Option<SelectorCandidate>,
        verified: bool,
    ) -> HealingOutcome {
        let success = matches!(
            reason,
            OutcomeReason::Healed | OutcomeReason::OriginalLocatorValid
        );
        let confidence = match (&candidate, reason) {
            (Some(c), _) => c.confidence,
            (None, OutcomeReason::OriginalLocatorValid) => 1.0,
            (None, _) => self.best_confidence,
        };
        HealingOutcome {
            success,
            strategy_used: candidate.as_ref().map(|c| c.strategy),
            candidate,
            confidence,
            verified,
            reason,
            attempts: self.attempts,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

/// Runs healing searches. Holds no per-run state, so one orchestrator can
/// serve concurrent runs for different locators.
pub struct HealingOrchestrator {
    driver: Arc<dyn BrowserDriver>,
    llm: Option<Arc<dyn LanguageModel>>,
    history: Option<Arc<dyn HistoryStore>>,
    model: ConfidenceModel,
    visual: VisualConfig,
    positional: PositionalConfig,
    progress: Option<ProgressCallback>,
}

impl HealingOrchestrator {
    pub fn new(driver: Arc<dyn BrowserDriver>, model: ConfidenceModel) -> Self {
        Self {
            driver,
            llm: None,
            history: None,
            model,
            visual: VisualConfig::default(),
            positional: PositionalConfig::default(),
            progress: None,
        }
    }

    pub fn with_language_model(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_visual_config(mut self, visual: VisualConfig) -> Self {
        self.visual = visual;
        self
    }

    pub fn with_positional_config(mut self, positional: PositionalConfig) -> Self {
        self.positional = positional;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn model(&self) -> &ConfidenceModel {
        &self.model
    }

    /// Heals `ctx.original_locator`. Errors only on invalid configuration;
    /// every search result, including failure, is a [`HealingOutcome`].
    pub async fn heal(
        &self,
        ctx: &HealingContext,
        cancel: &CancellationToken,
    ) -> Result<HealingOutcome> {
        ctx.config.validate()?;
        let started = Instant::now();
        let run = Run {
            started,
            deadline: started + ctx.config.overall_budget,
            attempts: Vec::new(),
            best_confidence: 0.0,
        };

        let outcome = self.search(ctx, cancel, run).await;
        info!(
            locator = %ctx.original_locator,
            reason = %outcome.reason,
            healed = ?outcome.locator(),
            confidence = outcome.confidence,
            elapsed_ms = outcome.elapsed_ms,
            "healing finished"
        );
        self.record(ctx, &outcome).await;
        Ok(outcome)
    }

    async fn search(
        &self,
        ctx: &HealingContext,
        cancel: &CancellationToken,
        mut run: Run,
    ) -> HealingOutcome {
        let cfg = &ctx.config;
        if run.expired(cancel) {
            return run.finish(OutcomeReason::CancelledOrTimedOut, None, false);
        }

        if cfg.check_original {
            match self.count_visible(&ctx.original_locator, cfg, cancel, &run).await {
                None => return run.finish(OutcomeReason::CancelledOrTimedOut, None, false),
                Some(Ok(1)) => {
                    debug!(locator = %ctx.original_locator, "original locator still resolves");
                    return run.finish(OutcomeReason::OriginalLocatorValid, None, true);
                }
                Some(Ok(count)) => {
                    debug!(locator = %ctx.original_locator, count, "original locator is broken")
                }
                Some(Err(e)) => warn!(error = %e, "could not check original locator"),
            }
        }

        let order = self.strategy_order(ctx, cancel).await;
        let mut page = match self.load_page(cfg, cancel, &run).await {
            Some(page) => page,
            None => return run.finish(OutcomeReason::CancelledOrTimedOut, None, false),
        };

        let inputs = Arc::new(ScoringInputs {
            description: ctx.description.clone(),
            excluded: locator_attribute_keys(&ctx.original_locator),
            viewport: self.driver.viewport(),
            positional: self.positional,
            visual: self
                .reference_patch(ctx)
                .map(|patch| Arc::new(VisualMatcher::new(patch, self.visual))),
        });
        let env = StrategyEnv {
            driver: self.driver.as_ref(),
            llm: self.llm.as_deref(),
            retry: &cfg.retry,
            cancel,
            progress: self.progress.as_ref(),
            inputs,
            original_locator: &ctx.original_locator,
            max_catalog: cfg.max_catalog,
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut rejected: HashSet<String> = HashSet::new();
        let mut pool: Vec<SelectorCandidate> = Vec::new();

        for kind in order {
            if run.expired(cancel) {
                return run.finish(OutcomeReason::CancelledOrTimedOut, None, false);
            }
            emit(self.progress.as_ref(), HealingEvent::StrategyStarted(kind));
            let strategy_started = Instant::now();
            let limit = cfg.strategy_budget.min(run.remaining());

            let produced = guarded(cancel, limit, produce(kind, &env, &mut page)).await;
            let mut candidates = Vec::new();
            let status = match produced {
                None if run.expired(cancel) => {
                    self.log_attempt(&mut run, kind, AttemptStatus::TimedOut, &[], strategy_started);
                    return run.finish(OutcomeReason::CancelledOrTimedOut, None, false);
                }
                None => {
                    warn!(strategy = %kind, budget_ms = limit.as_millis() as u64, "strategy timed out");
                    AttemptStatus::TimedOut
                }
                Some(Err(RetryError::Cancelled)) => {
                    self.log_attempt(&mut run, kind, AttemptStatus::TimedOut, &[], strategy_started);
                    return run.finish(OutcomeReason::CancelledOrTimedOut, None, false);
                }
                Some(Err(RetryError::Failed(e))) => {
                    warn!(strategy = %kind, error = %e, "strategy lost its external service");
                    AttemptStatus::ServiceFailed
                }
                Some(Ok(StrategyYield::Skipped(why))) => {
                    debug!(strategy = %kind, reason = why, "strategy skipped");
                    AttemptStatus::Skipped
                }
                Some(Ok(StrategyYield::Scored(scored))) => {
                    candidates = self.rank(kind, scored, &page.elements, &seen, cfg.top_n);
                    AttemptStatus::NoCandidates
                }
            };
            seen.extend(candidates.iter().map(|c| c.signature.clone()));

            let status = match candidates.first() {
                None => status,
                Some(best) if best.confidence >= cfg.shortcut_threshold && !best.ambiguous => {
                    match self.verify(&best.locator, cfg, cancel, &run).await {
                        None => {
                            self.log_attempt(&mut run, kind, AttemptStatus::TimedOut, &candidates, strategy_started);
                            return run.finish(OutcomeReason::CancelledOrTimedOut, None, false);
                        }
                        Some(true) if self.model.is_reliable(best.confidence, cfg.acceptance_threshold, true) => {
                            info!(strategy = %kind, locator = %best.locator, confidence = best.confidence, "shortcut match verified");
                            let winner = best.clone();
                            self.log_attempt(&mut run, kind, AttemptStatus::Succeeded, &candidates, strategy_started);
                            return run.finish(OutcomeReason::Healed, Some(winner), true);
                        }
                        Some(_) => {
                            rejected.insert(best.locator.clone());
                            AttemptStatus::VerificationFailed
                        }
                    }
                }
                Some(best) if best.confidence >= cfg.acceptance_threshold => AttemptStatus::Retained,
                Some(_) => AttemptStatus::LowConfidence,
            };

            self.log_attempt(&mut run, kind, status, &candidates, strategy_started);
            merge_pool(
                &mut pool,
                candidates
                    .into_iter()
                    .filter(|c| c.confidence >= cfg.acceptance_threshold)
                    .filter(|c| !rejected.contains(&c.locator)),
            );
        }

        for candidate in pool.into_iter().take(cfg.max_verifications) {
            if run.expired(cancel) {
                return run.finish(OutcomeReason::CancelledOrTimedOut, None, false);
            }
            match self.verify(&candidate.locator, cfg, cancel, &run).await {
                None => return run.finish(OutcomeReason::CancelledOrTimedOut, None, false),
                Some(true) => {
                    info!(strategy = %candidate.strategy, locator = %candidate.locator, confidence = candidate.confidence, "pooled candidate verified");
                    return run.finish(OutcomeReason::Healed, Some(candidate), true);
                }
                Some(false) => {}
            }
        }

        run.finish(OutcomeReason::AllStrategiesExhausted, None, false)
    }

    /// Builds, penalizes and ranks one strategy's candidates.
    fn rank(
        &self,
        kind: StrategyKind,
        scored: Vec<ScoredElement>,
        elements: &[PageElement],
        seen: &HashSet<String>,
        top_n: usize,
    ) -> Vec<SelectorCandidate> {
        let mut candidates: Vec<SelectorCandidate> = scored
            .into_iter()
            .filter(|s| !s.scores.is_empty())
            .filter_map(|s| {
                let element = elements.get(s.index)?;
                Some(SelectorCandidate {
                    locator: s
                        .locator
                        .unwrap_or_else(|| synthesize_locator(element, elements)),
                    strategy: kind,
                    confidence: self.model.aggregate(&s.scores),
                    scores: s.scores,
                    ambiguous: false,
                    duplicate: false,
                    signature: attribute_signature(element),
                    reasoning: s.reasoning,
                })
            })
            .collect();

        self.model.apply_penalties(&mut candidates, seen);
        candidates.sort_by(by_confidence);
        candidates.truncate(top_n);
        candidates
    }

    fn log_attempt(
        &self,
        run: &mut Run,
        strategy: StrategyKind,
        status: AttemptStatus,
        candidates: &[SelectorCandidate],
        started: Instant,
    ) {
        let best_confidence = candidates.first().map(|c| c.confidence);
        if let Some(best) = best_confidence {
            run.best_confidence = run.best_confidence.max(best);
        }
        let attempt = StrategyAttempt {
            strategy,
            status,
            candidates: candidates.len(),
            best_confidence,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        debug!(
            strategy = %strategy,
            status = ?status,
            candidates = attempt.candidates,
            best = ?best_confidence,
            "strategy finished"
        );
        emit(
            self.progress.as_ref(),
            HealingEvent::StrategyFinished(attempt.clone()),
        );
        run.attempts.push(attempt);
    }

    async fn count_visible(
        &self,
        locator: &str,
        cfg: &HealingConfig,
        cancel: &CancellationToken,
        run: &Run,
    ) -> Option<std::result::Result<usize, crate::error::ServiceError>> {
        let call = with_retry(&cfg.retry, cancel, "count_visible", || {
            self.driver.count_visible(locator)
        });
        match guarded(cancel, run.remaining(), call).await {
            None | Some(Err(RetryError::Cancelled)) => None,
            Some(Err(RetryError::Failed(e))) => Some(Err(e)),
            Some(Ok(count)) => Some(Ok(count)),
        }
    }

    /// `Some(true)` when `locator` resolves to exactly one visible element;
    /// `None` when the run was interrupted.
    async fn verify(
        &self,
        locator: &str,
        cfg: &HealingConfig,
        cancel: &CancellationToken,
        run: &Run,
    ) -> Option<bool> {
        let verified = match self.count_visible(locator, cfg, cancel, run).await? {
            Ok(count) => count == 1,
            Err(e) => {
                warn!(locator, error = %e, "verification call failed");
                false
            }
        };
        debug!(locator, verified, "verification");
        emit(
            self.progress.as_ref(),
            HealingEvent::Verification {
                locator: locator.to_string(),
                verified,
            },
        );
        Some(verified)
    }

    async fn load_page(
        &self,
        cfg: &HealingConfig,
        cancel: &CancellationToken,
        run: &Run,
    ) -> Option<PageState> {
        let call = with_retry(&cfg.retry, cancel, "page_elements", || {
            self.driver.page_elements()
        });
        let elements = match guarded(cancel, run.remaining(), call).await {
            None | Some(Err(RetryError::Cancelled)) => return None,
            Some(Err(RetryError::Failed(e))) => {
                warn!(error = %e, "could not list page elements");
                Vec::new()
            }
            Some(Ok(elements)) => elements,
        };
        debug!(elements = elements.len(), "page elements loaded");
        Some(PageState {
            elements: Arc::new(elements),
            screenshot: None,
        })
    }

    fn reference_patch(&self, ctx: &HealingContext) -> Option<PixelImage> {
        let description = &ctx.description;
        if let Some(patch) = &description.reference_patch {
            return Some(patch.clone());
        }
        let path = description.reference_patch_path.as_ref()?;
        match load_rgba(&path.to_string_lossy()) {
            Ok(patch) => Some(patch),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "reference patch unreadable");
                None
            }
        }
    }

    /// Configured order, biased by recent history when a store is present.
    /// A slow or failing store leaves the order unchanged.
    async fn strategy_order(
        &self,
        ctx: &HealingContext,
        cancel: &CancellationToken,
    ) -> Vec<StrategyKind> {
        let cfg = &ctx.config;
        let base = cfg.strategies.clone();
        let Some(history) = &self.history else {
            return base;
        };
        if cfg.history_bias_positions == 0 {
            return base;
        }
        let read = history.recent_successes(&ctx.original_locator, cfg.history_limit);
        match guarded(cancel, cfg.history_timeout, read).await {
            Some(Ok(records)) => {
                let biased = bias_order(&base, &records, cfg.history_bias_positions);
                if biased != base {
                    debug!(order = ?biased, "strategy order biased by history");
                }
                biased
            }
            Some(Err(e)) => {
                warn!(error = %e, "history unavailable, using default order");
                base
            }
            None => {
                warn!("history read timed out, using default order");
                base
            }
        }
    }

    async fn record(&self, ctx: &HealingContext, outcome: &HealingOutcome) {
        if !matches!(
            outcome.reason,
            OutcomeReason::Healed | OutcomeReason::AllStrategiesExhausted
        ) {
            return;
        }
        let Some(history) = &self.history else {
            return;
        };
        let record = HistoryRecord {
            timestamp: Utc::now(),
            original_locator: ctx.original_locator.clone(),
            healed_locator: outcome.locator().map(str::to_string),
            strategy: outcome.strategy_used,
            confidence: outcome.confidence,
            success: outcome.success,
        };
        match tokio::time::timeout(ctx.config.history_timeout, history.append(record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "could not append healing history"),
            Err(_) => warn!("history append timed out"),
        }
    }
}

/// Adds accepted candidates to the pool, keeping the best entry per locator.
fn merge_pool(pool: &mut Vec<SelectorCandidate>, accepted: impl Iterator<Item = SelectorCandidate>) {
    for candidate in accepted {
        match pool.iter_mut().find(|c| c.locator == candidate.locator) {
            Some(existing) if existing.confidence >= candidate.confidence => {}
            Some(existing) => *existing = candidate,
            None => pool.push(candidate),
        }
    }
    pool.sort_by(by_confidence);
}
