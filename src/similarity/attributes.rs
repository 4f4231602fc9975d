//! Stable-attribute matching between a stored description and a live element.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use super::text::{normalize_text, text_similarity};
use crate::types::{ElementDescription, PageElement};

/// Attributes that normally survive re-renders and refactors.
pub const STABLE_ATTRIBUTES: &[&str] = &[
    "role",
    "type",
    "name",
    "aria-label",
    "placeholder",
    "title",
    "data-testid",
    "data-test",
    "data-qa",
    "href",
    "alt",
    "id",
];

static GENERATED_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        ^:r[0-9a-z]*:$                                  # react useId
        | ^(ember|ext-gen|gwt-uid|yui_|j_id|mui-|radix-|headlessui-|react-select-|rc-|ng-)
        | ^(css|sc|jss|emotion)-[0-9a-z]+
        | \d{3,}                                        # long counters
        | [0-9a-f]{8,}                                  # hex hashes
        | ^[0-9a-f]{8}-[0-9a-f]{4}-                     # uuids
        ",
    )
    .expect("generated-id pattern is valid")
});

static LOCATOR_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*([A-Za-z_:][-A-Za-z0-9_:.]*)").expect("locator attribute pattern is valid")
});

/// Heuristic for framework-generated, per-render ids.
pub fn is_generated_id(id: &str) -> bool {
    let id = id.trim();
    id.is_empty() || GENERATED_ID.is_match(id)
}

/// Attribute keys a locator itself depends on. When that locator broke, these
/// keys are the ones most likely to have changed, so they are not evidence.
pub fn locator_attribute_keys(locator: &str) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = LOCATOR_ATTR
        .captures_iter(locator)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect();
    if has_id_selector(locator) {
        keys.insert("id".to_string());
    }
    if let Some(rest) = locator.trim().strip_prefix("data-testid=") {
        if !rest.is_empty() {
            keys.insert("data-testid".to_string());
        }
    }
    keys
}

/// True when `#` starts an id selector, not a character inside an
/// attribute condition or a quoted value.
fn has_id_selector(locator: &str) -> bool {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for c in locator.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '#') if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// One attribute pair considered for scoring.
struct AttributePair<'a> {
    key: &'a str,
    expected: String,
    actual: Option<String>,
}

fn candidate_value(element: &PageElement, key: &str) -> Option<String> {
    match key {
        "aria-label" => element
            .attr("aria-label")
            .or(element.accessible_name.as_deref())
            .map(str::to_string),
        _ => element.attr(key).map(str::to_string),
    }
}

fn explicit_pairs<'a>(
    description: &'a ElementDescription,
    element: &PageElement,
    excluded: &BTreeSet<String>,
) -> Vec<AttributePair<'a>> {
    description
        .attributes
        .iter()
        .filter(|(key, _)| key.as_str() != "role")
        .filter(|(key, _)| STABLE_ATTRIBUTES.contains(&key.as_str()))
        .filter(|(key, _)| !excluded.contains(key.as_str()))
        .filter(|(key, value)| !(key.as_str() == "id" && is_generated_id(value)))
        .map(|(key, value)| AttributePair {
            key: key.as_str(),
            expected: value.trim().to_string(),
            actual: candidate_value(element, key).map(|v| v.trim().to_string()),
        })
        .collect()
}

/// True when the description carries explicit stable attributes that are not
/// excluded, i.e. fuzzy attribute matching has something to work with.
pub fn has_comparable_attributes(
    description: &ElementDescription,
    excluded: &BTreeSet<String>,
) -> bool {
    !explicit_pairs(description, &PageElement::default(), excluded).is_empty()
}

fn values_equal(key: &str, expected: &str, actual: &str) -> bool {
    match key {
        "aria-label" | "title" | "placeholder" | "alt" => {
            normalize_text(expected) == normalize_text(actual)
        }
        "type" => expected.eq_ignore_ascii_case(actual),
        _ => expected == actual,
    }
}

/// Fraction of stable attributes (plus role and tag) that match exactly.
///
/// `None` when the description carries nothing comparable.
pub fn attribute_similarity(
    description: &ElementDescription,
    element: &PageElement,
    excluded: &BTreeSet<String>,
) -> Option<f64> {
    let mut considered = 0usize;
    let mut matched = 0usize;

    if !excluded.contains("role") {
        if let Some(role) = description.effective_role() {
            considered += 1;
            if element.effective_role().as_deref() == Some(role.as_str()) {
                matched += 1;
            }
        }
    }
    if !excluded.contains("tag") {
        if let Some(tag) = description.tag.as_deref() {
            considered += 1;
            if element.tag.eq_ignore_ascii_case(tag.trim()) {
                matched += 1;
            }
        }
    }
    for pair in explicit_pairs(description, element, excluded) {
        considered += 1;
        if pair
            .actual
            .as_deref()
            .is_some_and(|actual| values_equal(pair.key, &pair.expected, actual))
        {
            matched += 1;
        }
    }

    if considered == 0 {
        None
    } else {
        Some(matched as f64 / considered as f64)
    }
}

/// Mean edit-distance similarity over the explicit stable attributes only.
/// Missing attributes count as 0.
pub fn fuzzy_attribute_similarity(
    description: &ElementDescription,
    element: &PageElement,
    excluded: &BTreeSet<String>,
) -> Option<f64> {
    let pairs = explicit_pairs(description, element, excluded);
    if pairs.is_empty() {
        return None;
    }
    let total: f64 = pairs
        .iter()
        .map(|pair| match pair.actual.as_deref() {
            Some(actual) if values_equal(pair.key, &pair.expected, actual) => 1.0,
            Some(actual) => text_similarity(&pair.expected, actual),
            None => 0.0,
        })
        .sum();
    Some((total / pairs.len() as f64).clamp(0.0, 1.0))
}

/// Identity of an element built from its stable traits, used to spot the same
/// element surfacing again from a later strategy.
pub fn attribute_signature(element: &PageElement) -> String {
    let mut parts = vec![element.tag.to_ascii_lowercase()];
    if let Some(role) = element.effective_role() {
        parts.push(format!("role={role}"));
    }
    for key in STABLE_ATTRIBUTES {
        if *key == "role" {
            continue;
        }
        if let Some(value) = element.attr(key) {
            if *key == "id" && is_generated_id(value) {
                continue;
            }
            parts.push(format!("{key}={}", value.trim()));
        }
    }
    if let Some(text) = element.text.as_deref().map(normalize_text) {
        if !text.is_empty() {
            parts.push(format!("text={text}"));
        }
    }
    parts.join("|")
}
