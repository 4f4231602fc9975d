//! Browser-driver boundary used by locator healing.
//!
//! The engine never drives a browser itself. It talks to a [`BrowserDriver`]
//! that captures screenshots, reports element geometry and resolves
//! locators. [`SnapshotDriver`] implements the boundary offline from a
//! captured page snapshot.
//!
//! # Module Structure
//!
//! - [`selector`] - CSS selector subset matched against captured elements
//! - [`snapshot`] - Snapshot-backed driver

pub mod selector;
pub mod snapshot;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::types::{BoundingBox, PageElement};
use crate::viewport::Viewport;

pub use selector::{locator_matches, parse_compound, CompoundSelector};
pub use snapshot::{PageSnapshot, SnapshotDriver};

/// Live-page operations consumed by the healing pipeline.
///
/// Bounding boxes and full-page screenshots share document coordinates.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Current elements on the page, in document order.
    async fn page_elements(&self) -> Result<Vec<PageElement>, ServiceError>;

    /// Encoded (PNG) screenshot of the whole document.
    async fn full_page_screenshot(&self) -> Result<Vec<u8>, ServiceError>;

    /// Encoded (PNG) screenshot of the first element matching `locator`.
    async fn element_screenshot(&self, locator: &str) -> Result<Vec<u8>, ServiceError>;

    async fn bounding_box(&self, locator: &str) -> Result<Option<BoundingBox>, ServiceError>;

    /// Number of currently visible elements matching `locator`.
    async fn count_visible(&self, locator: &str) -> Result<usize, ServiceError>;

    fn viewport(&self) -> Viewport;
}
