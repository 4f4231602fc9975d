//! Minimal CSS selector matching against captured page elements.
//!
//! Supports selector groups (`a, b`) of compound selectors built from
//! `tag`, `#id`, `.class`, `[attr]` and `[attr="value"]`. Combinators are
//! not supported; a selector using them never matches.

use crate::types::PageElement;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeCondition {
    pub name: String,
    pub value: Option<String>,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' || !c.is_ascii()
}

fn take_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

/// Parses one compound selector; `None` on syntax the matcher does not
/// understand.
pub fn parse_compound(selector: &str) -> Option<CompoundSelector> {
    let chars: Vec<char> = selector.trim().chars().collect();
    if chars.is_empty() {
        return None;
    }
    let mut sel = CompoundSelector::default();
    let mut pos = 0usize;

    if chars[0] == '*' {
        pos = 1;
    } else if is_ident_char(chars[0]) {
        sel.tag = Some(take_ident(&chars, &mut pos).to_ascii_lowercase());
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                let id = take_ident(&chars, &mut pos);
                if id.is_empty() {
                    return None;
                }
                sel.id = Some(id);
            }
            '.' => {
                pos += 1;
                let class = take_ident(&chars, &mut pos);
                if class.is_empty() {
                    return None;
                }
                sel.classes.push(class);
            }
            '[' => {
                pos += 1;
                let close = chars[pos..].iter().position(|c| *c == ']')? + pos;
                let inner: String = chars[pos..close].iter().collect();
                pos = close + 1;
                sel.attributes.push(parse_attribute(&inner)?);
            }
            _ => return None,
        }
    }
    Some(sel)
}

fn parse_attribute(inner: &str) -> Option<AttributeCondition> {
    match inner.split_once('=') {
        None => {
            let name = inner.trim();
            (!name.is_empty()).then(|| AttributeCondition {
                name: name.to_ascii_lowercase(),
                value: None,
            })
        }
        Some((name, value)) => {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some(AttributeCondition {
                name: name.to_ascii_lowercase(),
                value: Some(value.to_string()),
            })
        }
    }
}

impl CompoundSelector {
    pub fn matches(&self, element: &PageElement) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes: Vec<&str> = element
                .attr("class")
                .map(|c| c.split_whitespace().collect())
                .unwrap_or_default();
            if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }
        self.attributes.iter().all(|cond| {
            let actual = match cond.name.as_str() {
                "aria-label" => element.attr("aria-label").or(element.accessible_name.as_deref()),
                "role" => element.attr("role").or(element.role.as_deref()),
                name => element.attr(name),
            };
            match (&cond.value, actual) {
                (None, Some(_)) => true,
                (Some(expected), Some(actual)) => expected == actual,
                (_, None) => false,
            }
        })
    }
}

/// True when `locator` resolves to `element`: either the driver's own
/// locator string for it, or a selector group one of whose members matches.
pub fn locator_matches(locator: &str, element: &PageElement) -> bool {
    let locator = locator.trim();
    if locator.is_empty() {
        return false;
    }
    if element.locator == locator {
        return true;
    }
    split_group(locator)
        .into_iter()
        .filter_map(parse_compound)
        .any(|sel| sel.matches(element))
}

/// Splits a selector group on commas outside attribute brackets and quotes.
fn split_group(locator: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (i, c) in locator.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(&locator[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&locator[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn element(tag: &str, attrs: &[(&str, &str)]) -> PageElement {
        PageElement {
            locator: format!("{tag}:nth-of-type(1)"),
            tag: tag.to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_compound_selector() {
        let sel = parse_compound(r#"button#go.primary.big[data-qa="submit"][disabled]"#)
            .expect("parse");
        assert_eq!(sel.tag.as_deref(), Some("button"));
        assert_eq!(sel.id.as_deref(), Some("go"));
        assert_eq!(sel.classes, vec!["primary", "big"]);
        assert_eq!(sel.attributes.len(), 2);
        assert_eq!(sel.attributes[0].value.as_deref(), Some("submit"));
        assert_eq!(sel.attributes[1].value, None);
    }

    #[test]
    fn rejects_combinators() {
        assert!(parse_compound("form > button").is_none());
        assert!(parse_compound("div button").is_none());
    }

    #[test]
    fn matches_id_class_tag_and_attributes() {
        let el = element(
            "button",
            &[("id", "go"), ("class", "btn primary"), ("type", "submit")],
        );
        assert!(locator_matches("#go", &el));
        assert!(locator_matches(".primary", &el));
        assert!(locator_matches("BUTTON", &el));
        assert!(locator_matches("button[type='submit']", &el));
        assert!(locator_matches("button[type=submit].btn", &el));
        assert!(!locator_matches("#submit-btn", &el));
        assert!(!locator_matches("a.primary", &el));
        assert!(!locator_matches("[name]", &el));
    }

    #[test]
    fn aria_label_falls_back_to_accessible_name() {
        let mut el = element("button", &[]);
        el.accessible_name = Some("Submit Order".into());
        assert!(locator_matches(r#"button[aria-label="Submit Order"]"#, &el));
    }

    #[test]
    fn selector_groups_and_exact_locators() {
        let el = element("a", &[("href", "/a,b")]);
        assert!(locator_matches("#nope, a[href=\"/a,b\"]", &el));
        assert!(locator_matches("a:nth-of-type(1)", &el));
        assert!(!locator_matches("", &el));
    }
}
