//! Confidence aggregation over per-metric similarity evidence.
//!
//! A weighted mean over the metrics that apply, followed by penalties for
//! non-distinctive matches (ambiguity) and for re-counted elements
//! (duplicates). Results are always clamped to [0,1].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, VsmeError};
use crate::types::{SelectorCandidate, SimilarityScores};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub visual: f64,
    pub textual: f64,
    pub positional: f64,
    pub attribute: f64,
    /// Weight of the language model's own stated confidence
    pub generative: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        ConfidencePreset::Balanced.weights()
    }
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f64 {
        self.visual + self.textual + self.positional + self.attribute + self.generative
    }

    pub fn validate(&self) -> Result<()> {
        let all = [
            ("visual", self.visual),
            ("textual", self.textual),
            ("positional", self.positional),
            ("attribute", self.attribute),
            ("generative", self.generative),
        ];
        for (name, w) in all {
            if !w.is_finite() || w < 0.0 {
                return Err(VsmeError::invalid_weights(format!(
                    "{name} weight must be a finite non-negative number, got {w}"
                )));
            }
        }
        if self.sum() <= 0.0 {
            return Err(VsmeError::invalid_weights("all weights are zero"));
        }
        Ok(())
    }
}

/// Named weight profiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidencePreset {
    #[default]
    Balanced,
    /// Favors ARIA and text signals over pixels
    Accessibility,
    VisualFirst,
}

impl ConfidencePreset {
    pub fn weights(&self) -> ConfidenceWeights {
        match self {
            ConfidencePreset::Balanced => ConfidenceWeights {
                visual: 0.30,
                textual: 0.30,
                positional: 0.15,
                attribute: 0.25,
                generative: 0.15,
            },
            ConfidencePreset::Accessibility => ConfidenceWeights {
                visual: 0.10,
                textual: 0.40,
                positional: 0.10,
                attribute: 0.40,
                generative: 0.15,
            },
            ConfidencePreset::VisualFirst => ConfidenceWeights {
                visual: 0.50,
                textual: 0.20,
                positional: 0.15,
                attribute: 0.15,
                generative: 0.15,
            },
        }
    }
}

impl FromStr for ConfidencePreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "balanced" | "default" => Ok(ConfidencePreset::Balanced),
            "accessibility" | "a11y" | "aria" => Ok(ConfidencePreset::Accessibility),
            "visual" | "visual_first" => Ok(ConfidencePreset::VisualFirst),
            other => Err(format!(
                "unknown confidence preset '{other}' (expected balanced, accessibility or visual)"
            )),
        }
    }
}

impl fmt::Display for ConfidencePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfidencePreset::Balanced => "balanced",
            ConfidencePreset::Accessibility => "accessibility",
            ConfidencePreset::VisualFirst => "visual",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub preset: ConfidencePreset,
    /// Explicit weights override the preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<ConfidenceWeights>,
    pub ambiguity_margin: f64,
    pub ambiguity_penalty: f64,
    pub duplicate_penalty: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            preset: ConfidencePreset::Balanced,
            weights: None,
            ambiguity_margin: 0.05,
            ambiguity_penalty: 0.15,
            duplicate_penalty: 0.2,
        }
    }
}

impl ConfidenceConfig {
    pub fn effective_weights(&self) -> ConfidenceWeights {
        self.weights.unwrap_or_else(|| self.preset.weights())
    }

    pub fn validate(&self) -> Result<()> {
        self.effective_weights().validate()?;
        for (name, v) in [
            ("ambiguity_margin", self.ambiguity_margin),
            ("ambiguity_penalty", self.ambiguity_penalty),
            ("duplicate_penalty", self.duplicate_penalty),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(VsmeError::config(format!("{name} {v} is outside [0,1]")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfidenceModel {
    weights: ConfidenceWeights,
    config: ConfidenceConfig,
}

impl ConfidenceModel {
    pub fn new(config: ConfidenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            weights: config.effective_weights(),
            config,
        })
    }

    pub fn from_preset(preset: ConfidencePreset) -> Self {
        let config = ConfidenceConfig {
            preset,
            ..ConfidenceConfig::default()
        };
        Self {
            weights: preset.weights(),
            config,
        }
    }

    pub fn weights(&self) -> &ConfidenceWeights {
        &self.weights
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    /// Weighted mean over the metrics present, weights renormalized over
    /// them. No applicable metric means no evidence: 0.
    pub fn aggregate(&self, scores: &SimilarityScores) -> f64 {
        let w = &self.weights;
        let pairs = [
            (scores.visual, w.visual),
            (scores.textual, w.textual),
            (scores.positional, w.positional),
            (scores.attribute, w.attribute),
            (scores.generative, w.generative),
        ];

        let mut weighted_sum = 0.0f64;
        let mut total_weight = 0.0f64;
        for (score, weight) in pairs {
            if let Some(s) = score {
                debug_assert!((0.0..=1.0).contains(&s), "similarity score {s} out of range");
                weighted_sum += weight * s.clamp(0.0, 1.0);
                total_weight += weight;
            }
        }

        if total_weight > 0.0 {
            (weighted_sum / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Applies the ambiguity and duplicate penalties to one strategy's
    /// candidates. `seen` holds signatures found by earlier strategies.
    pub fn apply_penalties(&self, candidates: &mut [SelectorCandidate], seen: &HashSet<String>) {
        let best = candidates
            .iter()
            .map(|c| c.confidence)
            .fold(f64::NEG_INFINITY, f64::max);
        let close = candidates
            .iter()
            .filter(|c| c.confidence >= best - self.config.ambiguity_margin)
            .count();

        for candidate in candidates.iter_mut() {
            let mut confidence = candidate.confidence;
            if close > 1 && candidate.confidence >= best - self.config.ambiguity_margin {
                candidate.ambiguous = true;
                confidence -= self.config.ambiguity_penalty;
            }
            if seen.contains(&candidate.signature) {
                candidate.duplicate = true;
                confidence -= self.config.duplicate_penalty;
            }
            candidate.confidence = confidence.clamp(0.0, 1.0);
        }
    }

    /// Confidence alone never authorizes an action: the candidate must also
    /// have been verified against the live page.
    pub fn is_reliable(&self, confidence: f64, threshold: f64, verified: bool) -> bool {
        verified && confidence >= threshold
    }
}

impl Default for ConfidenceModel {
    fn default() -> Self {
        Self::from_preset(ConfidencePreset::Balanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyKind;

    fn candidate(locator: &str, confidence: f64, signature: &str) -> SelectorCandidate {
        SelectorCandidate {
            locator: locator.to_string(),
            strategy: StrategyKind::ExactText,
            scores: SimilarityScores::default(),
            confidence,
            ambiguous: false,
            duplicate: false,
            signature: signature.to_string(),
            reasoning: None,
        }
    }

    fn all(v: f64) -> SimilarityScores {
        SimilarityScores {
            visual: Some(v),
            textual: Some(v),
            positional: Some(v),
            attribute: Some(v),
            generative: Some(v),
        }
    }

    #[test]
    fn aggregate_is_clamped_for_extreme_inputs() {
        for preset in [
            ConfidencePreset::Balanced,
            ConfidencePreset::Accessibility,
            ConfidencePreset::VisualFirst,
        ] {
            let model = ConfidenceModel::from_preset(preset);
            assert_eq!(model.aggregate(&all(0.0)), 0.0);
            let one = model.aggregate(&all(1.0));
            assert!((one - 1.0).abs() < 1e-12 && one <= 1.0, "{one}");
        }
    }

    #[test]
    fn absent_metrics_do_not_penalize() {
        let model = ConfidenceModel::default();
        let scores = SimilarityScores {
            textual: Some(1.0),
            attribute: Some(1.0),
            ..Default::default()
        };
        assert!((model.aggregate(&scores) - 1.0).abs() < 1e-12);
        assert_eq!(model.aggregate(&SimilarityScores::default()), 0.0);
    }

    #[test]
    fn weights_are_renormalized_over_present_metrics() {
        let model = ConfidenceModel::default();
        let scores = SimilarityScores {
            textual: Some(1.0),
            positional: Some(0.0),
            ..Default::default()
        };
        // 0.30 / (0.30 + 0.15)
        assert!((model.aggregate(&scores) - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn accessibility_preset_favors_text_over_pixels() {
        let scores = SimilarityScores {
            visual: Some(0.2),
            textual: Some(0.9),
            ..Default::default()
        };
        let balanced = ConfidenceModel::from_preset(ConfidencePreset::Balanced).aggregate(&scores);
        let a11y = ConfidenceModel::from_preset(ConfidencePreset::Accessibility).aggregate(&scores);
        assert!(a11y > balanced, "{a11y} <= {balanced}");
    }

    #[test]
    fn ambiguity_penalty_hits_every_close_candidate() {
        let model = ConfidenceModel::default();
        let mut candidates = vec![
            candidate("#a", 0.92, "a"),
            candidate("#b", 0.90, "b"),
            candidate("#c", 0.50, "c"),
        ];
        model.apply_penalties(&mut candidates, &HashSet::new());
        assert!(candidates[0].ambiguous && candidates[1].ambiguous);
        assert!(!candidates[2].ambiguous);
        assert!((candidates[0].confidence - 0.77).abs() < 1e-9);
        assert!((candidates[2].confidence - 0.50).abs() < 1e-9);
    }

    #[test]
    fn single_distinct_candidate_is_not_ambiguous() {
        let model = ConfidenceModel::default();
        let mut candidates = vec![candidate("#a", 0.95, "a"), candidate("#b", 0.6, "b")];
        model.apply_penalties(&mut candidates, &HashSet::new());
        assert!(!candidates[0].ambiguous);
        assert_eq!(candidates[0].confidence, 0.95);
    }

    #[test]
    fn duplicate_penalty_and_clamping() {
        let model = ConfidenceModel::default();
        let seen: HashSet<String> = ["a".to_string()].into_iter().collect();
        let mut candidates = vec![candidate("#a", 0.1, "a")];
        model.apply_penalties(&mut candidates, &seen);
        assert!(candidates[0].duplicate);
        assert_eq!(candidates[0].confidence, 0.0);
    }

    #[test]
    fn reliability_requires_verification() {
        let model = ConfidenceModel::default();
        assert!(!model.is_reliable(0.99, 0.75, false));
        assert!(model.is_reliable(0.75, 0.75, true));
        assert!(!model.is_reliable(0.74, 0.75, true));
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let zero = ConfidenceConfig {
            weights: Some(ConfidenceWeights {
                visual: 0.0,
                textual: 0.0,
                positional: 0.0,
                attribute: 0.0,
                generative: 0.0,
            }),
            ..ConfidenceConfig::default()
        };
        assert!(matches!(
            ConfidenceModel::new(zero),
            Err(VsmeError::InvalidWeights(_))
        ));

        let negative = ConfidenceConfig {
            weights: Some(ConfidenceWeights {
                textual: -1.0,
                ..ConfidenceWeights::default()
            }),
            ..ConfidenceConfig::default()
        };
        assert!(ConfidenceModel::new(negative).is_err());

        let nan = ConfidenceConfig {
            weights: Some(ConfidenceWeights {
                visual: f64::NAN,
                ..ConfidenceWeights::default()
            }),
            ..ConfidenceConfig::default()
        };
        assert!(ConfidenceModel::new(nan).is_err());
    }

    #[test]
    fn preset_parses_aliases() {
        assert_eq!("a11y".parse::<ConfidencePreset>(), Ok(ConfidencePreset::Accessibility));
        assert_eq!("visual-first".parse::<ConfidencePreset>(), Ok(ConfidencePreset::VisualFirst));
        assert!("weird".parse::<ConfidencePreset>().is_err());
    }
}
