use crate::baseline::BaselineEntry;
use crate::error::ErrorPayload;
use crate::types::{ComparisonResult, HealingOutcome};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Schema version for output payloads.
pub const VSME_OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum VsmeOutput {
    Compare(CompareOutput),
    Heal(HealOutput),
    Baseline(BaselineOutput),
    Error(ErrorOutput),
}

impl VsmeOutput {
    /// Process exit code: 0 on pass/healed, 1 on fail/not healed, 2 on error.
    pub fn exit_code(&self) -> u8 {
        match self {
            VsmeOutput::Compare(c) if c.result.passed => 0,
            VsmeOutput::Compare(_) => 1,
            VsmeOutput::Heal(h) if h.outcome.success => 0,
            VsmeOutput::Heal(_) => 1,
            VsmeOutput::Baseline(_) => 0,
            VsmeOutput::Error(_) => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareOutput {
    pub version: String,
    pub baseline: PathBuf,
    pub actual: PathBuf,
    pub tolerance: f64,
    #[serde(flatten)]
    pub result: ComparisonResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_image: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealOutput {
    pub version: String,
    pub original_locator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healed_locator: Option<String>,
    pub outcome: HealingOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineOutput {
    pub version: String,
    pub name: String,
    /// Newest first
    pub entries: Vec<BaselineEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    pub error: ErrorPayload,
}

impl ErrorOutput {
    pub fn new(error: ErrorPayload) -> Self {
        Self {
            version: VSME_OUTPUT_VERSION.to_string(),
            error,
        }
    }
}
