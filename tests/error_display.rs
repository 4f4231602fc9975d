use vsme_lib::error::{ErrorCategory, ServiceError, ServiceKind};
use vsme_lib::VsmeError;

#[test]
fn config_error_display_includes_message() {
    let err = VsmeError::Config("missing element description".to_string());

    assert_eq!(
        format!("{}", err),
        "Configuration error: missing element description"
    );
}

#[test]
fn io_error_display_wraps_source() {
    let io_err = std::io::Error::other("disk full");
    let err: VsmeError = io_err.into();
    let rendered = format!("{}", err);

    assert!(rendered.starts_with("IO error: "));
    assert!(rendered.contains("disk full"));
}

#[test]
fn service_error_is_transparent() {
    let err: VsmeError =
        ServiceError::transient(ServiceKind::LanguageModel, "HTTP 503: overloaded").into();

    assert_eq!(
        format!("{}", err),
        "language model error: HTTP 503: overloaded"
    );
}

#[test]
fn invalid_weights_display_and_category() {
    let err = VsmeError::invalid_weights("all weights are zero");

    assert_eq!(
        format!("{}", err),
        "Invalid confidence weights: all weights are zero"
    );
    assert_eq!(err.to_payload().category, ErrorCategory::Scoring);
}

#[test]
fn url_parse_error_maps_to_config_payload() {
    let parse_err = url::Url::parse("not a url").unwrap_err();
    let err: VsmeError = parse_err.into();

    assert!(format!("{}", err).starts_with("Invalid URL: "));
    let payload = err.to_payload();
    assert_eq!(payload.category, ErrorCategory::Config);
    assert!(payload.remediation.unwrap_or_default().contains("endpoint"));
}
