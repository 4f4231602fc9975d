//! Data-parallel candidate scoring.
//!
//! Every element's scores depend only on the shared read-only inputs and the
//! element itself, so the element list is split into chunks scored on the
//! blocking pool and reduced afterwards. Nothing is mutated while chunks run.

use futures::future::join_all;
use image::imageops;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::similarity::{
    attribute_similarity, best_text_similarity, fuzzy_attribute_similarity,
    positional_similarity, PositionalConfig, VisualMatcher,
};
use crate::types::{ElementDescription, PageElement, PixelImage, SimilarityScores};
use crate::viewport::Viewport;

/// Signals a strategy collects for each candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub visual: bool,
    pub textual: bool,
    pub positional: bool,
    /// Exact stable-attribute agreement (role, tag, explicit attributes)
    pub attribute: bool,
    /// Edit-distance agreement over explicit attributes only
    pub fuzzy_attribute: bool,
}

impl Signals {
    pub const ALL: Signals = Signals {
        visual: true,
        textual: true,
        positional: true,
        attribute: true,
        fuzzy_attribute: false,
    };
}

/// Where visual scoring gets candidate patches from.
#[derive(Debug, Clone, Default)]
pub enum PatchSource {
    #[default]
    None,
    /// Full-page screenshot cropped by each element's bounding box
    FullPage(Arc<PixelImage>),
    /// Per-element screenshots keyed by element locator
    Elements(Arc<HashMap<String, PixelImage>>),
}

/// Read-only inputs shared by all scoring tasks of one run.
#[derive(Debug, Clone)]
pub struct ScoringInputs {
    pub description: ElementDescription,
    /// Attribute keys used by the broken locator
    pub excluded: BTreeSet<String>,
    pub viewport: Viewport,
    pub positional: PositionalConfig,
    pub visual: Option<Arc<VisualMatcher>>,
}

fn element_patch(element: &PageElement, patches: &PatchSource) -> Option<PixelImage> {
    match patches {
        PatchSource::None => None,
        PatchSource::FullPage(shot) => {
            let (x, y, w, h) = element
                .bounding_box
                .and_then(|b| b.clip_to(shot.width(), shot.height()))?;
            Some(imageops::crop_imm(shot.as_ref(), x, y, w, h).to_image())
        }
        PatchSource::Elements(map) => map.get(&element.locator).cloned(),
    }
}

/// Scores one element on the requested signals. Signals without evidence on
/// either side stay `None`.
pub fn score_element(
    inputs: &ScoringInputs,
    element: &PageElement,
    signals: Signals,
    patches: &PatchSource,
) -> SimilarityScores {
    let description = &inputs.description;
    let mut scores = SimilarityScores::default();

    if signals.textual {
        let observed: Vec<&str> = [element.text.as_deref(), element.name()]
            .into_iter()
            .flatten()
            .collect();
        scores.textual = best_text_similarity(&description.expected_texts(), &observed);
    }
    if signals.attribute {
        scores.attribute = attribute_similarity(description, element, &inputs.excluded);
    } else if signals.fuzzy_attribute {
        scores.attribute = fuzzy_attribute_similarity(description, element, &inputs.excluded);
    }
    if signals.positional {
        if let (Some(last), Some(current)) = (description.bounding_box, element.bounding_box) {
            scores.positional = Some(positional_similarity(
                &last,
                &current,
                inputs.viewport,
                &inputs.positional,
            ));
        }
    }
    if signals.visual {
        if let Some(matcher) = &inputs.visual {
            if let Some(patch) = element_patch(element, patches) {
                scores.visual = Some(matcher.score(&patch).score);
            }
        }
    }
    scores
}

/// Scores `indices` of `elements` across the blocking pool. Results come back
/// in input order.
pub async fn score_parallel(
    inputs: Arc<ScoringInputs>,
    elements: Arc<Vec<PageElement>>,
    indices: Vec<usize>,
    signals: Signals,
    patches: PatchSource,
) -> Vec<(usize, SimilarityScores)> {
    if indices.is_empty() {
        return Vec::new();
    }
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let chunk_size = indices.len().div_ceil(workers).max(1);

    let tasks = indices.chunks(chunk_size).map(|chunk| {
        let inputs = Arc::clone(&inputs);
        let elements = Arc::clone(&elements);
        let patches = patches.clone();
        let chunk = chunk.to_vec();
        tokio::task::spawn_blocking(move || {
            chunk
                .into_iter()
                .filter_map(|i| {
                    elements
                        .get(i)
                        .map(|el| (i, score_element(&inputs, el, signals, &patches)))
                })
                .collect::<Vec<_>>()
        })
    });

    join_all(tasks)
        .await
        .into_iter()
        .filter_map(|joined| match joined {
            Ok(scored) => Some(scored),
            Err(e) => {
                warn!(error = %e, "scoring task failed");
                None
            }
        })
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::VisualConfig;
    use crate::types::BoundingBox;
    use image::Rgba;
    use std::collections::BTreeMap;

    fn inputs(description: ElementDescription) -> ScoringInputs {
        ScoringInputs {
            description,
            excluded: BTreeSet::new(),
            viewport: Viewport {
                width: 1000,
                height: 1000,
            },
            positional: PositionalConfig::default(),
            visual: None,
        }
    }

    fn labelled(locator: &str, text: &str) -> PageElement {
        PageElement {
            locator: locator.to_string(),
            tag: "button".to_string(),
            text: Some(text.to_string()),
            bounding_box: Some(BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
            ..Default::default()
        }
    }

    #[test]
    fn only_requested_signals_are_scored() {
        let desc = ElementDescription {
            text: Some("Save".into()),
            tag: Some("button".into()),
            bounding_box: Some(BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
            ..Default::default()
        };
        let inputs = inputs(desc);
        let el = labelled("#save", "Save");

        let textual = Signals {
            textual: true,
            ..Default::default()
        };
        let scores = score_element(&inputs, &el, textual, &PatchSource::None);
        assert_eq!(scores.textual, Some(1.0));
        assert!(scores.attribute.is_none());
        assert!(scores.positional.is_none());

        let scores = score_element(&inputs, &el, Signals::ALL, &PatchSource::None);
        assert_eq!(scores.attribute, Some(1.0));
        assert_eq!(scores.positional, Some(1.0));
        assert!(scores.visual.is_none());
    }

    #[test]
    fn visual_signal_crops_full_page() {
        let reference = PixelImage::from_fn(16, 16, |x, _| {
            if x < 8 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let mut shot = PixelImage::from_pixel(64, 32, Rgba([128, 128, 128, 255]));
        imageops::replace(&mut shot, &reference, 32, 8);

        let mut inputs = inputs(ElementDescription::default());
        inputs.visual = Some(Arc::new(VisualMatcher::new(reference, VisualConfig::default())));
        let mut el = labelled("#pic", "");
        el.bounding_box = Some(BoundingBox::new(32.0, 8.0, 16.0, 16.0));

        let visual = Signals {
            visual: true,
            ..Default::default()
        };
        let scores = score_element(
            &inputs,
            &el,
            visual,
            &PatchSource::FullPage(Arc::new(shot)),
        );
        assert!(scores.visual.unwrap() > 0.95);
    }

    #[tokio::test]
    async fn parallel_scoring_covers_every_index() {
        let desc = ElementDescription {
            text: Some("Item 3".into()),
            ..Default::default()
        };
        let elements: Vec<PageElement> = (0..40)
            .map(|i| labelled(&format!("#i{i}"), &format!("Item {i}")))
            .collect();
        let indices: Vec<usize> = (0..40).collect();
        let textual = Signals {
            textual: true,
            ..Default::default()
        };

        let scored = score_parallel(
            Arc::new(inputs(desc)),
            Arc::new(elements),
            indices,
            textual,
            PatchSource::None,
        )
        .await;

        assert_eq!(scored.len(), 40);
        let order: Vec<usize> = scored.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, (0..40).collect::<Vec<_>>());
        assert_eq!(scored[3].1.textual, Some(1.0));
    }

    #[test]
    fn attributes_map_is_used_for_fuzzy_scores() {
        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_string(), "email".to_string());
        let desc = ElementDescription {
            attributes: attributes.clone(),
            ..Default::default()
        };
        let mut el = labelled("#e", "");
        el.attributes.insert("name".into(), "emial".into());
        let fuzzy = Signals {
            fuzzy_attribute: true,
            ..Default::default()
        };
        let score = score_element(&inputs(desc), &el, fuzzy, &PatchSource::None)
            .attribute
            .unwrap();
        assert!(score > 0.5 && score < 1.0);
    }
}
