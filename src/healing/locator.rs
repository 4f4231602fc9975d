//! Replacement locator synthesis.
//!
//! A healed locator should survive the next refactor, so the most stable
//! handle an element offers is preferred over the driver's positional
//! locator. A stable form is only used when it resolves to exactly one
//! visible element of the current page.

use crate::browser::locator_matches;
use crate::similarity::is_generated_id;
use crate::types::PageElement;

const TEST_ID_ATTRIBUTES: &[&str] = &["data-testid", "data-test", "data-qa"];

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn is_plain_ident(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Stable locator forms for `element`, best first.
pub fn stable_locators(element: &PageElement) -> Vec<String> {
    let mut forms = Vec::new();
    let tag = element.tag.to_ascii_lowercase();

    for key in TEST_ID_ATTRIBUTES {
        if let Some(value) = element.attr(key).filter(|v| !v.trim().is_empty()) {
            forms.push(format!("[{key}={}]", quote(value)));
        }
    }
    if let Some(id) = element.attr("id") {
        if !is_generated_id(id) && !id.contains('"') {
            if is_plain_ident(id) {
                forms.push(format!("#{id}"));
            } else {
                forms.push(format!("[id={}]", quote(id)));
            }
        }
    }
    if let Some(label) = element.attr("aria-label").filter(|v| !v.trim().is_empty()) {
        forms.push(format!("{tag}[aria-label={}]", quote(label)));
    }
    if let Some(name) = element.attr("name").filter(|v| !v.trim().is_empty()) {
        forms.push(format!("{tag}[name={}]", quote(name)));
    }
    forms
}

fn is_unique(locator: &str, elements: &[PageElement]) -> bool {
    elements
        .iter()
        .filter(|el| el.visible && locator_matches(locator, el))
        .count()
        == 1
}

/// Best locator for `element` within the current page.
pub fn synthesize_locator(element: &PageElement, elements: &[PageElement]) -> String {
    stable_locators(element)
        .into_iter()
        .find(|form| is_unique(form, elements))
        .unwrap_or_else(|| element.locator.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn el(locator: &str, tag: &str, attrs: &[(&str, &str)]) -> PageElement {
        PageElement {
            locator: locator.to_string(),
            tag: tag.to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            ..Default::default()
        }
    }

    #[test]
    fn prefers_test_id_then_id() {
        let button = el(
            "button:nth-of-type(1)",
            "button",
            &[("data-testid", "pay"), ("id", "pay-now")],
        );
        let forms = stable_locators(&button);
        assert_eq!(forms[0], r#"[data-testid="pay"]"#);
        assert_eq!(forms[1], "#pay-now");
        assert_eq!(
            synthesize_locator(&button, std::slice::from_ref(&button)),
            r#"[data-testid="pay"]"#
        );
    }

    #[test]
    fn skips_generated_ids() {
        let button = el(
            "button:nth-of-type(1)",
            "button",
            &[("id", ":r1f:"), ("aria-label", "Submit Order")],
        );
        assert_eq!(
            synthesize_locator(&button, std::slice::from_ref(&button)),
            r#"button[aria-label="Submit Order"]"#
        );
    }

    #[test]
    fn falls_back_to_driver_locator_when_not_unique() {
        let a = el("form > button:nth-of-type(1)", "button", &[("name", "go")]);
        let b = el("form > button:nth-of-type(2)", "button", &[("name", "go")]);
        let page = vec![a.clone(), b];
        assert_eq!(synthesize_locator(&a, &page), "form > button:nth-of-type(1)");
    }
}
