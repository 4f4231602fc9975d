//! Language-model boundary for the generative healing strategy.
//!
//! The model receives the element description plus a catalog of current
//! interactive elements and answers with proposed locators. Its output is
//! untrusted evidence: proposals are sanitized here and scored like any
//! other candidate by the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Result, ServiceError, ServiceKind, VsmeError};
use crate::types::{BoundingBox, ElementDescription, PageElement};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Proposals kept from one response.
pub const MAX_PROPOSALS: usize = 5;

/// Catalog attributes worth showing the model.
const CATALOG_ATTRIBUTES: &[&str] = &[
    "id",
    "name",
    "type",
    "role",
    "aria-label",
    "placeholder",
    "title",
    "data-testid",
    "data-test",
    "data-qa",
    "href",
    "class",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub locator: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessible_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl CatalogEntry {
    pub fn from_element(element: &PageElement) -> Self {
        Self {
            locator: element.locator.clone(),
            tag: element.tag.clone(),
            text: element
                .text
                .as_deref()
                .map(|t| t.chars().take(80).collect()),
            accessible_name: element.accessible_name.clone(),
            role: element.effective_role(),
            attributes: element
                .attributes
                .iter()
                .filter(|(k, _)| CATALOG_ATTRIBUTES.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            bounding_box: element.bounding_box,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorRequest {
    pub original_locator: String,
    pub description: ElementDescription,
    pub catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedLocator {
    pub locator: String,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn propose_locators(
        &self,
        request: &LocatorRequest,
    ) -> std::result::Result<Vec<ProposedLocator>, ServiceError>;

    /// Provider name for logs (e.g., "openai-compatible").
    fn name(&self) -> &str;
}

/// `[llm]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: None,
            api_key: None,
            timeout: Duration::from_secs(30),
            max_tokens: 600,
        }
    }
}

/// Fully resolved client settings.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl LlmClientConfig {
    /// Resolves config values with environment fallbacks. Fails when no API
    /// key is available from either source.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("VSME_LLM_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| VsmeError::config("language model API key is missing"))?;

        let endpoint = config
            .endpoint
            .clone()
            .or_else(|| std::env::var("VSME_LLM_ENDPOINT").ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = Url::parse(&endpoint)?;

        let model = config
            .model
            .clone()
            .or_else(|| std::env::var("VSME_LLM_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            endpoint,
            api_key,
            model,
            timeout: config.timeout,
            max_tokens: config.max_tokens,
        })
    }
}

/// Client for OpenAI-compatible chat-completion endpoints.
pub struct OpenAiLanguageModel {
    config: LlmClientConfig,
    client: reqwest::Client,
}

impl OpenAiLanguageModel {
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(LlmClientConfig::from_config(config)?)
    }
}

fn build_prompt(request: &LocatorRequest) -> std::result::Result<String, ServiceError> {
    let description = serde_json::to_string_pretty(&request.description)
        .map_err(|e| ServiceError::permanent(ServiceKind::LanguageModel, e.to_string()))?;
    let catalog = serde_json::to_string(&request.catalog)
        .map_err(|e| ServiceError::permanent(ServiceKind::LanguageModel, e.to_string()))?;

    Ok(format!(
        r#"A UI test locator stopped matching. Find the element it used to match.

BROKEN LOCATOR: {original}

ELEMENT DESCRIPTION (as last seen):
{description}

CURRENT INTERACTIVE ELEMENTS (JSON array; each entry has a working "locator"):
{catalog}

Pick at most {max} elements from the catalog that are most likely the described element.
Prefer stable locators (data-testid, non-generated id, aria-label, name) and only use
locators that resolve to exactly one element. Say so with low confidence when unsure.

Respond in JSON:
{{
  "candidates": [
    {{ "locator": "css locator", "reasoning": "short reason", "confidence": 0.0 to 1.0 }}
  ]
}}"#,
        original = request.original_locator,
        max = MAX_PROPOSALS,
    ))
}

/// Parses and sanitizes a model answer. Accepts `{"candidates": [...]}` or a
/// bare array; drops empty locators and clamps confidences into [0,1].
pub fn parse_proposals(content: &str) -> std::result::Result<Vec<ProposedLocator>, String> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Answer {
        Wrapped { candidates: Vec<ProposedLocator> },
        Bare(Vec<ProposedLocator>),
    }

    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let answer: Answer =
        serde_json::from_str(trimmed).map_err(|e| format!("invalid proposal JSON: {e}"))?;
    let proposals = match answer {
        Answer::Wrapped { candidates } => candidates,
        Answer::Bare(list) => list,
    };

    Ok(proposals
        .into_iter()
        .filter(|p| !p.locator.trim().is_empty())
        .map(|p| ProposedLocator {
            locator: p.locator.trim().to_string(),
            reasoning: p.reasoning,
            confidence: p
                .confidence
                .filter(|c| c.is_finite())
                .map(|c| c.clamp(0.0, 1.0)),
        })
        .take(MAX_PROPOSALS)
        .collect())
}

fn classify_reqwest(err: reqwest::Error) -> ServiceError {
    let transient = err.is_timeout() || err.is_connect() || err.is_request();
    ServiceError {
        service: ServiceKind::LanguageModel,
        message: format!("request failed: {err}"),
        transient,
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAiLanguageModel {
    async fn propose_locators(
        &self,
        request: &LocatorRequest,
    ) -> std::result::Result<Vec<ProposedLocator>, ServiceError> {
        let prompt = build_prompt(request)?;
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": 0,
            "response_format": { "type": "json_object" }
        });

        let response = self
            .client
            .post(self.config.endpoint.clone())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("API returned {status}: {body}");
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                ServiceError::transient(ServiceKind::LanguageModel, message)
            } else {
                ServiceError::permanent(ServiceKind::LanguageModel, message)
            });
        }

        let resp: ChatResponse = response.json().await.map_err(|e| {
            ServiceError::permanent(
                ServiceKind::LanguageModel,
                format!("failed to parse API response: {e}"),
            )
        })?;
        let content = resp
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| {
                ServiceError::permanent(ServiceKind::LanguageModel, "empty API response")
            })?;

        let proposals = parse_proposals(content)
            .map_err(|e| ServiceError::permanent(ServiceKind::LanguageModel, e))?;
        debug!(
            model = %self.config.model,
            proposals = proposals.len(),
            "language model answered"
        );
        Ok(proposals)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
