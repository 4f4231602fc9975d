//! The healing strategies.
//!
//! Strategies form a closed set keyed by [`StrategyKind`]. Each one selects
//! the page elements worth considering, names the signals to score them on,
//! and filters the scored elements it is willing to propose.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::retry::{with_retry, RetryError, RetryPolicy};
use super::scoring::{score_parallel, PatchSource, ScoringInputs, Signals};
use crate::browser::{locator_matches, BrowserDriver};
use crate::error::{ServiceError, ServiceKind};
use crate::image_loader::decode_rgba;
use crate::llm::{CatalogEntry, LanguageModel, LocatorRequest, ProposedLocator};
use crate::progress::{emit, ProgressCallback};
use crate::similarity::{has_comparable_attributes, normalize_text};
use crate::types::{HealingEvent, PageElement, PixelImage, SimilarityScores, StrategyKind};

/// Fuzzy attribute agreement below this is not a stable-attribute match.
const FUZZY_ATTRIBUTE_FLOOR: f64 = 0.5;

/// Page data fetched once per healing run.
pub(crate) struct PageState {
    pub elements: Arc<Vec<PageElement>>,
    /// Decoded full-page screenshot, once a strategy has needed it
    pub screenshot: Option<Arc<PixelImage>>,
}

/// Everything a strategy may read.
pub(crate) struct StrategyEnv<'a> {
    pub driver: &'a dyn BrowserDriver,
    pub llm: Option<&'a dyn LanguageModel>,
    pub retry: &'a RetryPolicy,
    pub cancel: &'a CancellationToken,
    pub progress: Option<&'a ProgressCallback>,
    pub inputs: Arc<ScoringInputs>,
    pub original_locator: &'a str,
    pub max_catalog: usize,
}

/// One element a strategy proposes, with its evidence.
#[derive(Debug, Clone)]
pub(crate) struct ScoredElement {
    pub index: usize,
    pub scores: SimilarityScores,
    /// Locator to use instead of a synthesized one
    pub locator: Option<String>,
    pub reasoning: Option<String>,
}

#[derive(Debug)]
pub(crate) enum StrategyYield {
    Skipped(&'static str),
    Scored(Vec<ScoredElement>),
}

pub(crate) async fn produce(
    kind: StrategyKind,
    env: &StrategyEnv<'_>,
    page: &mut PageState,
) -> Result<StrategyYield, RetryError> {
    match kind {
        StrategyKind::ExactText => Ok(exact_text(env, page).await),
        StrategyKind::AriaRole => Ok(aria_role(env, page).await),
        StrategyKind::StableAttribute => Ok(stable_attribute(env, page).await),
        StrategyKind::Visual => visual(env, page).await,
        StrategyKind::Positional => Ok(positional(env, page).await),
        StrategyKind::Generative => generative(env, page).await,
    }
}

fn visible_indices(page: &PageState, keep: impl Fn(&PageElement) -> bool) -> Vec<usize> {
    page.elements
        .iter()
        .enumerate()
        .filter(|(_, el)| el.visible && keep(el))
        .map(|(i, _)| i)
        .collect()
}

async fn score(
    kind: StrategyKind,
    env: &StrategyEnv<'_>,
    page: &PageState,
    indices: Vec<usize>,
    signals: Signals,
    patches: PatchSource,
) -> Vec<ScoredElement> {
    emit(
        env.progress,
        HealingEvent::ScoringStarted {
            strategy: kind,
            elements: indices.len(),
        },
    );
    score_parallel(
        Arc::clone(&env.inputs),
        Arc::clone(&page.elements),
        indices,
        signals,
        patches,
    )
    .await
    .into_iter()
    .map(|(index, scores)| ScoredElement {
        index,
        scores,
        locator: None,
        reasoning: None,
    })
    .collect()
}

async fn exact_text(env: &StrategyEnv<'_>, page: &PageState) -> StrategyYield {
    let expected: BTreeSet<String> = env
        .inputs
        .description
        .expected_texts()
        .into_iter()
        .map(normalize_text)
        .collect();
    if expected.is_empty() {
        return StrategyYield::Skipped("no text or accessible name recorded");
    }

    let indices = visible_indices(page, |el| {
        [el.text.as_deref(), el.name()]
            .into_iter()
            .flatten()
            .any(|t| expected.contains(&normalize_text(t)))
    });
    let signals = Signals {
        textual: true,
        attribute: true,
        ..Default::default()
    };
    let scored = score(
        StrategyKind::ExactText,
        env,
        page,
        indices,
        signals,
        PatchSource::None,
    )
    .await;
    StrategyYield::Scored(scored)
}

async fn aria_role(env: &StrategyEnv<'_>, page: &PageState) -> StrategyYield {
    let Some(role) = env.inputs.description.effective_role() else {
        return StrategyYield::Skipped("no role recorded");
    };
    let indices = visible_indices(page, |el| {
        el.effective_role().as_deref() == Some(role.as_str())
    });
    let signals = Signals {
        textual: true,
        attribute: true,
        ..Default::default()
    };
    let scored = score(
        StrategyKind::AriaRole,
        env,
        page,
        indices,
        signals,
        PatchSource::None,
    )
    .await;
    StrategyYield::Scored(scored)
}

async fn stable_attribute(env: &StrategyEnv<'_>, page: &PageState) -> StrategyYield {
    if !has_comparable_attributes(&env.inputs.description, &env.inputs.excluded) {
        return StrategyYield::Skipped("no stable attributes left to compare");
    }
    let indices = visible_indices(page, |_| true);
    let signals = Signals {
        textual: true,
        fuzzy_attribute: true,
        ..Default::default()
    };
    let scored = score(
        StrategyKind::StableAttribute,
        env,
        page,
        indices,
        signals,
        PatchSource::None,
    )
    .await
    .into_iter()
    .filter(|s| s.scores.attribute.is_some_and(|a| a >= FUZZY_ATTRIBUTE_FLOOR))
    .collect();
    StrategyYield::Scored(scored)
}

/// Full-page screenshot, decoded once and cached on the page state.
async fn full_page(
    env: &StrategyEnv<'_>,
    page: &mut PageState,
) -> Result<Arc<PixelImage>, RetryError> {
    if let Some(shot) = &page.screenshot {
        return Ok(Arc::clone(shot));
    }
    let bytes = with_retry(env.retry, env.cancel, "full_page_screenshot", || {
        env.driver.full_page_screenshot()
    })
    .await?;
    let decoded = decode_rgba(&bytes).map_err(|e| {
        RetryError::Failed(ServiceError::permanent(
            ServiceKind::BrowserDriver,
            format!("undecodable screenshot: {e}"),
        ))
    })?;
    let shot = Arc::new(decoded);
    page.screenshot = Some(Arc::clone(&shot));
    Ok(shot)
}

async fn element_patches(
    env: &StrategyEnv<'_>,
    page: &PageState,
    indices: &[usize],
) -> Result<HashMap<String, PixelImage>, RetryError> {
    let mut patches = HashMap::new();
    for &i in indices {
        let Some(element) = page.elements.get(i) else {
            continue;
        };
        let shot = with_retry(env.retry, env.cancel, "element_screenshot", || {
            env.driver.element_screenshot(&element.locator)
        })
        .await;
        match shot {
            Ok(bytes) => match decode_rgba(&bytes) {
                Ok(img) => {
                    patches.insert(element.locator.clone(), img);
                }
                Err(e) => debug!(locator = %element.locator, error = %e, "undecodable element screenshot"),
            },
            Err(RetryError::Cancelled) => return Err(RetryError::Cancelled),
            Err(RetryError::Failed(e)) => {
                debug!(locator = %element.locator, error = %e, "element screenshot failed")
            }
        }
    }
    Ok(patches)
}

async fn visual(
    env: &StrategyEnv<'_>,
    page: &mut PageState,
) -> Result<StrategyYield, RetryError> {
    if env.inputs.visual.is_none() {
        return Ok(StrategyYield::Skipped("no reference patch"));
    }
    let indices = visible_indices(page, |el| el.bounding_box.is_some());
    if indices.is_empty() {
        return Ok(StrategyYield::Scored(Vec::new()));
    }

    let patches = match full_page(env, page).await {
        Ok(shot) => PatchSource::FullPage(shot),
        Err(RetryError::Cancelled) => return Err(RetryError::Cancelled),
        Err(RetryError::Failed(e)) => {
            warn!(error = %e, "full-page screenshot unavailable, capturing elements one by one");
            let patches = element_patches(env, page, &indices).await?;
            if patches.is_empty() {
                return Err(RetryError::Failed(e));
            }
            PatchSource::Elements(Arc::new(patches))
        }
    };

    let signals = Signals {
        visual: true,
        positional: true,
        ..Default::default()
    };
    let scored = score(StrategyKind::Visual, env, page, indices, signals, patches)
        .await
        .into_iter()
        .filter(|s| s.scores.visual.is_some())
        .collect();
    Ok(StrategyYield::Scored(scored))
}

async fn positional(env: &StrategyEnv<'_>, page: &PageState) -> StrategyYield {
    if env.inputs.description.bounding_box.is_none() {
        return StrategyYield::Skipped("no last-known bounding box");
    }
    let indices = visible_indices(page, |el| el.bounding_box.is_some());
    let signals = Signals {
        positional: true,
        attribute: true,
        ..Default::default()
    };
    let scored = score(
        StrategyKind::Positional,
        env,
        page,
        indices,
        signals,
        PatchSource::None,
    )
    .await
    .into_iter()
    .filter(|s| s.scores.positional.is_some_and(|p| p > 0.0))
    .collect();
    StrategyYield::Scored(scored)
}

async fn generative(
    env: &StrategyEnv<'_>,
    page: &mut PageState,
) -> Result<StrategyYield, RetryError> {
    let Some(llm) = env.llm else {
        return Ok(StrategyYield::Skipped("no language model configured"));
    };
    let catalog: Vec<CatalogEntry> = page
        .elements
        .iter()
        .filter(|el| el.visible && el.interactive)
        .take(env.max_catalog)
        .map(CatalogEntry::from_element)
        .collect();
    if catalog.is_empty() {
        return Ok(StrategyYield::Skipped("no interactive elements on the page"));
    }

    let request = LocatorRequest {
        original_locator: env.original_locator.to_string(),
        description: env.inputs.description.clone(),
        catalog,
    };
    let proposals = with_retry(env.retry, env.cancel, llm.name(), || {
        llm.propose_locators(&request)
    })
    .await?;
    debug!(proposals = proposals.len(), "language model proposals received");

    // Each proposal must name exactly one visible element to be scored.
    let mut resolved: Vec<(usize, ProposedLocator)> = Vec::new();
    for proposal in proposals {
        let Some(index) = resolve_proposal(env, page, &proposal.locator).await? else {
            continue;
        };
        if !resolved.iter().any(|(i, _)| *i == index) {
            resolved.push((index, proposal));
        }
    }
    if resolved.is_empty() {
        return Ok(StrategyYield::Scored(Vec::new()));
    }

    let patches = page
        .screenshot
        .as_ref()
        .map(|shot| PatchSource::FullPage(Arc::clone(shot)))
        .unwrap_or_default();
    let indices: Vec<usize> = resolved.iter().map(|(i, _)| *i).collect();
    let scored = score(
        StrategyKind::Generative,
        env,
        page,
        indices,
        Signals::ALL,
        patches,
    )
    .await;

    let mut by_index: HashMap<usize, ProposedLocator> = resolved.into_iter().collect();
    Ok(StrategyYield::Scored(
        scored
            .into_iter()
            .filter_map(|mut s| {
                let proposal = by_index.remove(&s.index)?;
                s.scores.generative = proposal.confidence;
                s.locator = Some(proposal.locator);
                s.reasoning = proposal.reasoning;
                Some(s)
            })
            .collect(),
    ))
}

/// Maps a proposed locator to one captured element.
///
/// Selectors outside the local matcher's subset (combinators, pseudo
/// classes, text engines) are resolved by the driver and then tied to a
/// captured element through its bounding box.
async fn resolve_proposal(
    env: &StrategyEnv<'_>,
    page: &PageState,
    locator: &str,
) -> Result<Option<usize>, RetryError> {
    let local = visible_indices(page, |el| locator_matches(locator, el));
    if let [index] = local.as_slice() {
        return Ok(Some(*index));
    }

    let count = with_retry(env.retry, env.cancel, "count_visible", || {
        env.driver.count_visible(locator)
    })
    .await;
    match count {
        Ok(1) => {}
        Ok(n) => {
            debug!(locator, matches = n, "dropping proposal that does not resolve to one element");
            return Ok(None);
        }
        Err(RetryError::Cancelled) => return Err(RetryError::Cancelled),
        Err(RetryError::Failed(e)) => {
            debug!(locator, error = %e, "could not resolve proposal");
            return Ok(None);
        }
    }

    let bbox = with_retry(env.retry, env.cancel, "bounding_box", || {
        env.driver.bounding_box(locator)
    })
    .await;
    let bbox = match bbox {
        Ok(Some(bbox)) => bbox,
        Ok(None) => return Ok(None),
        Err(RetryError::Cancelled) => return Err(RetryError::Cancelled),
        Err(RetryError::Failed(e)) => {
            debug!(locator, error = %e, "no bounding box for proposal");
            return Ok(None);
        }
    };
    let by_box = visible_indices(page, |el| el.bounding_box == Some(bbox));
    match by_box.as_slice() {
        [index] => Ok(Some(*index)),
        other => {
            debug!(locator, matches = other.len(), "proposal box does not identify one element");
            Ok(None)
        }
    }
}
