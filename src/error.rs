use crate::image_loader::ImageLoadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum VsmeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid confidence weights: {0}")]
    InvalidWeights(String),

    #[error(transparent)]
    ExternalService(#[from] ServiceError),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl VsmeError {
    pub fn config(message: impl Into<String>) -> Self {
        VsmeError::Config(message.into())
    }

    pub fn invalid_weights(message: impl Into<String>) -> Self {
        VsmeError::InvalidWeights(message.into())
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            VsmeError::Io(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check file paths/permissions.",
            ),
            VsmeError::Network(e) => ErrorPayload::new(
                ErrorCategory::Network,
                e.to_string(),
                "Check connectivity/proxy and the language-model endpoint, then retry.",
            ),
            VsmeError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify the endpoint URL (e.g., https://api.openai.com/v1/chat/completions).",
            ),
            VsmeError::Image(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Verify image path/format and readability.",
            ),
            VsmeError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check JSON inputs (page snapshot, element description, ignore regions).",
            ),
            VsmeError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("api key") || lower.contains("api_key") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Set VSME_LLM_API_KEY (or OPENAI_API_KEY) or [llm].api_key before enabling the generative strategy.",
                    )
                } else if lower.contains("threshold") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Thresholds are fractions in [0,1]; acceptance must not exceed the shortcut threshold.",
                    )
                } else if lower.contains("budget") || lower.contains("timeout") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Budgets must be non-zero durations (e.g., \"30s\", \"500ms\").",
                    )
                } else if lower.contains("file not found") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Verify the file exists; use an absolute path or run from the working directory.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags/paths and the config file values.",
                    )
                }
            }
            VsmeError::InvalidWeights(msg) => ErrorPayload::new(
                ErrorCategory::Scoring,
                msg.to_string(),
                "Weights must be finite, non-negative and not all zero; or pick a preset (balanced, accessibility, visual).",
            ),
            VsmeError::ExternalService(e) => ErrorPayload::new(
                ErrorCategory::Service,
                e.to_string(),
                if e.transient {
                    "Transient failure in an external service; retry later."
                } else {
                    "External service rejected the request; check its configuration."
                },
            ),
            VsmeError::Unknown(msg) => ErrorPayload::new(
                ErrorCategory::Unknown,
                msg.to_string(),
                "Re-run with --verbose; file an issue if persistent.",
            ),
        }
    }
}

impl From<ImageLoadError> for VsmeError {
    fn from(err: ImageLoadError) -> Self {
        match err {
            ImageLoadError::Decode(e) => VsmeError::Image(e),
            ImageLoadError::NotFound(path) => VsmeError::Config(format!("File not found: {}", path)),
            ImageLoadError::Save(msg) => VsmeError::Io(std::io::Error::other(format!(
                "Failed to save image: {}",
                msg
            ))),
        }
    }
}

pub type Result<T> = std::result::Result<T, VsmeError>;

/// Which external collaborator produced a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    BrowserDriver,
    LanguageModel,
    HistoryStore,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceKind::BrowserDriver => "browser driver",
            ServiceKind::LanguageModel => "language model",
            ServiceKind::HistoryStore => "history store",
        })
    }
}

/// Failure reported by an external boundary.
///
/// `transient` failures are retried a bounded number of times at the call
/// site; permanent ones are not.
#[derive(Debug, Clone, Error)]
#[error("{service} error: {message}")]
pub struct ServiceError {
    pub service: ServiceKind,
    pub message: String,
    pub transient: bool,
}

impl ServiceError {
    pub fn transient(service: ServiceKind, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
            transient: true,
        }
    }

    pub fn permanent(service: ServiceKind, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
            transient: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Network,
    Image,
    Service,
    Scoring,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_payload_includes_api_key_remediation() {
        let err = VsmeError::config("language model API key is missing");
        let payload = err.to_payload();
        assert_eq!(payload.category, ErrorCategory::Config);
        let remediation = payload.remediation.unwrap_or_default();
        assert!(
            remediation.contains("VSME_LLM_API_KEY"),
            "expected remediation to mention the env var, got: {remediation}"
        );
    }

    #[test]
    fn config_payload_uses_default_remediation_for_other_messages() {
        let err = VsmeError::config("Some other config issue");
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(
            remediation.contains("Check flags/paths"),
            "expected default remediation for generic config errors"
        );
    }

    #[test]
    fn config_payload_includes_threshold_hint() {
        let err = VsmeError::config("acceptance threshold 1.4 is outside [0,1]");
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(remediation.contains("[0,1]"), "got: {remediation}");
    }

    #[test]
    fn invalid_weights_map_to_scoring_category() {
        let err = VsmeError::invalid_weights("all weights are zero");
        let payload = err.to_payload();
        assert_eq!(payload.category, ErrorCategory::Scoring);
        assert!(payload
            .remediation
            .unwrap_or_default()
            .contains("preset"));
    }

    #[test]
    fn service_error_payload_distinguishes_transient_failures() {
        let transient: VsmeError =
            ServiceError::transient(ServiceKind::BrowserDriver, "socket reset").into();
        let permanent: VsmeError =
            ServiceError::permanent(ServiceKind::LanguageModel, "401 unauthorized").into();

        let t = transient.to_payload();
        let p = permanent.to_payload();
        assert_eq!(t.category, ErrorCategory::Service);
        assert!(t.message.contains("browser driver error: socket reset"));
        assert!(t.remediation.unwrap_or_default().contains("retry"));
        assert!(p.remediation.unwrap_or_default().contains("configuration"));
    }

    #[test]
    fn image_load_not_found_becomes_config_error() {
        let err: VsmeError = ImageLoadError::NotFound("missing.png".into()).into();
        assert!(matches!(err, VsmeError::Config(ref m) if m.contains("missing.png")));
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(remediation.contains("absolute path"));
    }
}
