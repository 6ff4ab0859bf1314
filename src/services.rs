//! Collaborator seams.
//!
//! Every remote dependency of the core is an async trait object so the UI layer
//! can plug in its backend and the tests can plug in the in-memory versions from
//! [`crate::memory`]. Implementations may fail independently; callers decide how
//! to degrade.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::AppResult;
use crate::model::{
    CatalogCandidate, CategoryDetection, DetectedItem, InventorySnapshot, NewInventoryItem,
    SubstitutionVerdict,
};

/// Remote product catalog
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fuzzy search by product name. Results carry a `match_score`.
    async fn search_products(&self, term: &str) -> AppResult<Vec<CatalogCandidate>>;

    /// Exact lookup by normalized barcode
    async fn lookup_by_barcode(&self, code: &str) -> AppResult<Option<CatalogCandidate>>;
}

/// Persistent inventory
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert an item and return its id
    async fn insert(&self, item: NewInventoryItem) -> AppResult<String>;

    async fn delete(&self, id: &str) -> AppResult<()>;

    async fn list(&self, user_id: &str) -> AppResult<InventorySnapshot>;
}

#[async_trait]
pub trait SubstitutionService: Send + Sync {
    async fn can_substitute(
        &self,
        requirement_name: &str,
        candidate_name: &str,
    ) -> AppResult<SubstitutionVerdict>;
}

/// Shelf-life estimation per category
#[async_trait]
pub trait ExpiryEstimator: Send + Sync {
    async fn estimate(&self, category_slug: &str) -> AppResult<Option<DateTime<Utc>>>;
}

/// AI inventory scan over uploaded photos
#[async_trait]
pub trait ImageInventoryScanner: Send + Sync {
    async fn scan_photos(&self, image_urls: &[String]) -> AppResult<Vec<DetectedItem>>;
}

#[async_trait]
pub trait CategoryDetector: Send + Sync {
    async fn detect(&self, item_name: &str) -> AppResult<CategoryDetection>;
}
