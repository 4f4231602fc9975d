//! Page element model used by locator healing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::core::{BoundingBox, PixelImage};

/// One element currently present on the live page, as reported by the
/// browser driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageElement {
    /// Locator the driver guarantees resolves to this element
    pub locator: String,
    /// Lowercase tag name (e.g., "button", "a")
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessible_name: Option<String>,
    /// Explicit ARIA role, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub interactive: bool,
}

fn default_true() -> bool {
    true
}

impl PageElement {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Explicit role, else the implicit ARIA role of the tag.
    pub fn effective_role(&self) -> Option<String> {
        self.role
            .as_deref()
            .or_else(|| self.attr("role"))
            .map(|r| r.to_ascii_lowercase())
            .or_else(|| implicit_role(&self.tag, self.attr("type")).map(str::to_string))
    }

    /// Accessible name, falling back to `aria-label`.
    pub fn name(&self) -> Option<&str> {
        self.accessible_name
            .as_deref()
            .or_else(|| self.attr("aria-label"))
    }
}

/// What the broken locator used to match: the evidence healing searches for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessible_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Last-known bounding box, document coordinates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    /// Path of a stored reference screenshot patch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_patch_path: Option<PathBuf>,
    #[serde(skip)]
    pub reference_patch: Option<PixelImage>,
}

impl ElementDescription {
    /// Role recorded for the element, else the implicit role of its tag.
    pub fn effective_role(&self) -> Option<String> {
        self.role
            .as_deref()
            .or_else(|| self.attributes.get("role").map(String::as_str))
            .map(|r| r.to_ascii_lowercase())
            .or_else(|| {
                self.tag.as_deref().and_then(|tag| {
                    implicit_role(tag, self.attributes.get("type").map(String::as_str))
                        .map(str::to_string)
                })
            })
    }

    pub fn name(&self) -> Option<&str> {
        self.accessible_name
            .as_deref()
            .or_else(|| self.attributes.get("aria-label").map(String::as_str))
    }

    /// Texts the element could be recognized by.
    pub fn expected_texts(&self) -> Vec<&str> {
        [self.text.as_deref(), self.name()]
            .into_iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .collect()
    }
}

/// Implicit ARIA role for common HTML elements.
pub fn implicit_role(tag: &str, input_type: Option<&str>) -> Option<&'static str> {
    let role = match tag.to_ascii_lowercase().as_str() {
        "button" => "button",
        "a" => "link",
        "select" => "combobox",
        "textarea" => "textbox",
        "nav" => "navigation",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "img" => "img",
        "ul" | "ol" => "list",
        "li" => "listitem",
        "form" => "form",
        "table" => "table",
        "dialog" => "dialog",
        "input" => match input_type.map(|t| t.to_ascii_lowercase()).as_deref() {
            Some("button") | Some("submit") | Some("reset") | Some("image") => "button",
            Some("checkbox") => "checkbox",
            Some("radio") => "radio",
            Some("range") => "slider",
            Some("search") => "searchbox",
            _ => "textbox",
        },
        _ => return None,
    };
    Some(role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_role_prefers_explicit_role() {
        let el = PageElement {
            tag: "div".into(),
            role: Some("Button".into()),
            ..Default::default()
        };
        assert_eq!(el.effective_role().as_deref(), Some("button"));
    }

    #[test]
    fn effective_role_falls_back_to_tag() {
        let mut attributes = BTreeMap::new();
        attributes.insert("type".to_string(), "submit".to_string());
        let el = PageElement {
            tag: "input".into(),
            attributes,
            ..Default::default()
        };
        assert_eq!(el.effective_role().as_deref(), Some("button"));
        let span = PageElement {
            tag: "span".into(),
            ..Default::default()
        };
        assert_eq!(span.effective_role(), None);
    }

    #[test]
    fn page_element_defaults_to_visible() {
        let el: PageElement =
            serde_json::from_str(r##"{"locator":"#a","tag":"a"}"##).expect("parse");
        assert!(el.visible);
        assert!(!el.interactive);
    }

    #[test]
    fn expected_texts_skip_blank_values() {
        let desc = ElementDescription {
            text: Some("  ".into()),
            accessible_name: Some("Submit Order".into()),
            ..Default::default()
        };
        assert_eq!(desc.expected_texts(), vec!["Submit Order"]);
    }
}
