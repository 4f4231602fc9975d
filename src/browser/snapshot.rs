//! Driver backed by a captured page snapshot instead of a live browser.
//!
//! Snapshot JSON:
//!
//! ```json
//! {
//!   "url": "https://shop.example/checkout",
//!   "viewport": { "width": 1280, "height": 800 },
//!   "screenshot": "checkout.png",
//!   "elements": [
//!     { "locator": "button:nth-of-type(1)", "tag": "button", "text": "Submit",
//!       "attributes": { "aria-label": "Submit Order" },
//!       "boundingBox": { "x": 10, "y": 20, "width": 80, "height": 24 },
//!       "interactive": true }
//!   ]
//! }
//! ```
//!
//! A relative `screenshot` path resolves against the snapshot file's directory.

use async_trait::async_trait;
use image::imageops;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::selector::locator_matches;
use super::BrowserDriver;
use crate::error::{Result, ServiceError, ServiceKind, VsmeError};
use crate::image_loader::{encode_png, load_rgba};
use crate::types::{BoundingBox, PageElement, PixelImage};
use crate::viewport::Viewport;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
    #[serde(default)]
    pub elements: Vec<PageElement>,
}

#[derive(Debug, Clone)]
pub struct SnapshotDriver {
    snapshot: PageSnapshot,
    screenshot: Option<PixelImage>,
}

impl SnapshotDriver {
    pub fn new(snapshot: PageSnapshot, screenshot: Option<PixelImage>) -> Self {
        Self {
            snapshot,
            screenshot,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VsmeError::config(format!(
                "File not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let snapshot: PageSnapshot = serde_json::from_str(&data)?;

        let screenshot = match &snapshot.screenshot {
            Some(shot) => {
                let resolved = if shot.is_absolute() {
                    shot.clone()
                } else {
                    path.parent().unwrap_or_else(|| Path::new(".")).join(shot)
                };
                Some(load_rgba(&resolved.to_string_lossy())?)
            }
            None => None,
        };
        debug!(
            elements = snapshot.elements.len(),
            has_screenshot = screenshot.is_some(),
            "loaded page snapshot"
        );
        Ok(Self::new(snapshot, screenshot))
    }

    pub fn snapshot(&self) -> &PageSnapshot {
        &self.snapshot
    }

    fn first_match(&self, locator: &str) -> Option<&PageElement> {
        self.snapshot
            .elements
            .iter()
            .find(|el| locator_matches(locator, el))
    }

    fn screenshot(&self) -> std::result::Result<&PixelImage, ServiceError> {
        self.screenshot.as_ref().ok_or_else(|| {
            ServiceError::permanent(ServiceKind::BrowserDriver, "snapshot has no screenshot")
        })
    }
}

fn encode(img: &PixelImage) -> std::result::Result<Vec<u8>, ServiceError> {
    encode_png(img).map_err(|e| ServiceError::permanent(ServiceKind::BrowserDriver, e.to_string()))
}

#[async_trait]
impl BrowserDriver for SnapshotDriver {
    async fn page_elements(&self) -> std::result::Result<Vec<PageElement>, ServiceError> {
        Ok(self.snapshot.elements.clone())
    }

    async fn full_page_screenshot(&self) -> std::result::Result<Vec<u8>, ServiceError> {
        encode(self.screenshot()?)
    }

    async fn element_screenshot(&self, locator: &str) -> std::result::Result<Vec<u8>, ServiceError> {
        let shot = self.screenshot()?;
        let element = self.first_match(locator).ok_or_else(|| {
            ServiceError::permanent(
                ServiceKind::BrowserDriver,
                format!("no element matches {locator}"),
            )
        })?;
        let (x, y, w, h) = element
            .bounding_box
            .and_then(|b| b.clip_to(shot.width(), shot.height()))
            .ok_or_else(|| {
                ServiceError::permanent(
                    ServiceKind::BrowserDriver,
                    format!("{locator} has no on-screen bounding box"),
                )
            })?;
        encode(&imageops::crop_imm(shot, x, y, w, h).to_image())
    }

    async fn bounding_box(
        &self,
        locator: &str,
    ) -> std::result::Result<Option<BoundingBox>, ServiceError> {
        Ok(self.first_match(locator).and_then(|el| el.bounding_box))
    }

    async fn count_visible(&self, locator: &str) -> std::result::Result<usize, ServiceError> {
        Ok(self
            .snapshot
            .elements
            .iter()
            .filter(|el| el.visible && locator_matches(locator, el))
            .count())
    }

    fn viewport(&self) -> Viewport {
        self.snapshot.viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_loader::decode_rgba;
    use image::Rgba;
    use std::collections::BTreeMap;

    fn button(locator: &str, id: &str, visible: bool) -> PageElement {
        let mut attributes = BTreeMap::new();
        attributes.insert("id".to_string(), id.to_string());
        PageElement {
            locator: locator.to_string(),
            tag: "button".to_string(),
            attributes,
            bounding_box: Some(BoundingBox::new(2.0, 2.0, 4.0, 3.0)),
            visible,
            interactive: true,
            ..Default::default()
        }
    }

    fn driver() -> SnapshotDriver {
        let snapshot = PageSnapshot {
            elements: vec![
                button("button:nth-of-type(1)", "a", true),
                button("button:nth-of-type(2)", "b", false),
            ],
            ..Default::default()
        };
        let shot = PixelImage::from_pixel(10, 10, Rgba([0, 0, 255, 255]));
        SnapshotDriver::new(snapshot, Some(shot))
    }

    #[tokio::test]
    async fn count_visible_skips_hidden_elements() {
        let d = driver();
        assert_eq!(d.count_visible("button").await.unwrap(), 1);
        assert_eq!(d.count_visible("#b").await.unwrap(), 0);
        assert_eq!(d.count_visible("#a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn element_screenshot_crops_bounding_box() {
        let d = driver();
        let bytes = d.element_screenshot("#a").await.unwrap();
        let img = decode_rgba(&bytes).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
        assert!(d.element_screenshot("#zzz").await.is_err());
    }

    #[tokio::test]
    async fn missing_screenshot_is_a_permanent_error() {
        let d = SnapshotDriver::new(PageSnapshot::default(), None);
        let err = d.full_page_screenshot().await.unwrap_err();
        assert!(!err.transient);
    }

    #[test]
    fn from_file_resolves_relative_screenshot() {
        let dir = tempfile::TempDir::new().unwrap();
        PixelImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]))
            .save(dir.path().join("page.png"))
            .unwrap();
        let json = r##"{
            "viewport": {"width": 800, "height": 600},
            "screenshot": "page.png",
            "elements": [{"locator": "#x", "tag": "a"}]
        }"##;
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, json).unwrap();

        let d = SnapshotDriver::from_file(&path).expect("load snapshot");
        assert_eq!(d.viewport().width, 800);
        assert_eq!(d.snapshot().elements.len(), 1);
        assert!(d.screenshot.is_some());
    }
}
