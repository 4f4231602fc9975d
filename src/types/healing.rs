//! Evidence, candidate and outcome types for locator healing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Healing strategies, cheapest and most deterministic first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ExactText,
    AriaRole,
    StableAttribute,
    Visual,
    Positional,
    Generative,
}

impl StrategyKind {
    pub const DEFAULT_ORDER: [StrategyKind; 6] = [
        StrategyKind::ExactText,
        StrategyKind::AriaRole,
        StrategyKind::StableAttribute,
        StrategyKind::Visual,
        StrategyKind::Positional,
        StrategyKind::Generative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::ExactText => "exact_text",
            StrategyKind::AriaRole => "aria_role",
            StrategyKind::StableAttribute => "stable_attribute",
            StrategyKind::Visual => "visual",
            StrategyKind::Positional => "positional",
            StrategyKind::Generative => "generative",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "exact_text" | "text" => Ok(StrategyKind::ExactText),
            "aria_role" | "aria" | "role" => Ok(StrategyKind::AriaRole),
            "stable_attribute" | "attribute" | "attributes" => Ok(StrategyKind::StableAttribute),
            "visual" => Ok(StrategyKind::Visual),
            "positional" | "position" => Ok(StrategyKind::Positional),
            "generative" | "llm" => Ok(StrategyKind::Generative),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Per-metric evidence for one candidate. Each score is in [0,1]; `None`
/// means the metric does not apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityScores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textual: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positional: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<f64>,
    /// Confidence stated by the language model, treated as one more signal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generative: Option<f64>,
}

impl SimilarityScores {
    pub fn is_empty(&self) -> bool {
        self.visual.is_none()
            && self.textual.is_none()
            && self.positional.is_none()
            && self.attribute.is_none()
            && self.generative.is_none()
    }
}

/// A proposed replacement locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorCandidate {
    pub locator: String,
    pub strategy: StrategyKind,
    pub scores: SimilarityScores,
    pub confidence: f64,
    #[serde(default)]
    pub ambiguous: bool,
    #[serde(default)]
    pub duplicate: bool,
    /// Stable attribute signature used to detect re-counted elements
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Terminal reason of a healing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeReason {
    Healed,
    OriginalLocatorValid,
    AllStrategiesExhausted,
    CancelledOrTimedOut,
}

impl fmt::Display for OutcomeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutcomeReason::Healed => "Healed",
            OutcomeReason::OriginalLocatorValid => "OriginalLocatorValid",
            OutcomeReason::AllStrategiesExhausted => "AllStrategiesExhausted",
            OutcomeReason::CancelledOrTimedOut => "CancelledOrTimedOut",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Strategy could not run with the available evidence
    Skipped,
    NoCandidates,
    /// Candidates found but none reached the acceptance threshold
    LowConfidence,
    /// Best candidate kept for final verification
    Retained,
    /// Shortcut candidate failed verification
    VerificationFailed,
    Succeeded,
    /// External service failed after retries
    ServiceFailed,
    TimedOut,
}

/// One row of the per-strategy attempt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAttempt {
    pub strategy: StrategyKind,
    pub status: AttemptStatus,
    pub candidates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_confidence: Option<f64>,
    pub elapsed_ms: u64,
}

/// Terminal value of one healing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<SelectorCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_used: Option<StrategyKind>,
    pub confidence: f64,
    pub verified: bool,
    pub reason: OutcomeReason,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<StrategyAttempt>,
    pub elapsed_ms: u64,
}

impl HealingOutcome {
    pub fn locator(&self) -> Option<&str> {
        self.candidate.as_ref().map(|c| c.locator.as_str())
    }
}

/// Progress notifications emitted while healing.
#[derive(Debug, Clone, PartialEq)]
pub enum HealingEvent {
    StrategyStarted(StrategyKind),
    ScoringStarted {
        strategy: StrategyKind,
        elements: usize,
    },
    StrategyFinished(StrategyAttempt),
    Verification {
        locator: String,
        verified: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_kind_parses_aliases() {
        assert_eq!("llm".parse::<StrategyKind>(), Ok(StrategyKind::Generative));
        assert_eq!(
            "Stable-Attribute".parse::<StrategyKind>(),
            Ok(StrategyKind::StableAttribute)
        );
        assert!("teleport".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn outcome_reason_serializes_as_name() {
        let json = serde_json::to_string(&OutcomeReason::AllStrategiesExhausted).unwrap();
        assert_eq!(json, "\"AllStrategiesExhausted\"");
        assert_eq!(
            OutcomeReason::CancelledOrTimedOut.to_string(),
            "CancelledOrTimedOut"
        );
    }

    #[test]
    fn absent_scores_are_omitted() {
        let scores = SimilarityScores {
            textual: Some(1.0),
            ..Default::default()
        };
        let json = serde_json::to_value(scores).unwrap();
        assert_eq!(json, serde_json::json!({"textual": 1.0}));
        assert!(SimilarityScores::default().is_empty());
    }
}
