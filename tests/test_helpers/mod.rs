//! # Test Helper Library
//!
//! Shared builders and scriptable collaborators for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use stockpit_core::capture::{CaptureController, CaptureServices};
use stockpit_core::config::{CaptureConfig, MatcherConfig};
use stockpit_core::errors::{AppError, AppResult};
use stockpit_core::memory::{
    CategoryTableEstimator, InMemoryCatalog, InMemoryInventory, KeywordCategoryDetector,
    StaticImageScanner,
};
use stockpit_core::model::{CatalogCandidate, DetectedItem, SubstitutionVerdict};
use stockpit_core::services::{ProductCatalog, SubstitutionService};

/// Catalog product without a score
pub fn product(id: &str, name: &str, category: &str) -> CatalogCandidate {
    CatalogCandidate {
        id: id.to_string(),
        product_name: name.to_string(),
        brand: None,
        category: category.to_string(),
        barcode: None,
        price: None,
        unit_size: None,
        image_url: None,
        source: None,
        match_score: None,
    }
}

pub fn scored(id: &str, name: &str, score: f64) -> CatalogCandidate {
    CatalogCandidate {
        match_score: Some(score),
        ..product(id, name, "fresh_produce")
    }
}

pub fn detected(name: &str, days_until_expiry: Option<i64>) -> DetectedItem {
    DetectedItem {
        name: name.to_string(),
        quantity_estimate: Some("1 piece".to_string()),
        days_until_expiry,
    }
}

/// Matcher settings without the debounce delay
pub fn instant_matcher_config() -> MatcherConfig {
    MatcherConfig {
        debounce_ms: 0,
        ..Default::default()
    }
}

/// Catalog that answers every search with the same pre-scored list
pub struct ScriptedCatalog {
    results: Vec<CatalogCandidate>,
    calls: AtomicUsize,
}

impl ScriptedCatalog {
    pub fn new(results: Vec<CatalogCandidate>) -> Self {
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCatalog for ScriptedCatalog {
    async fn search_products(&self, _term: &str) -> AppResult<Vec<CatalogCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }

    async fn lookup_by_barcode(&self, _code: &str) -> AppResult<Option<CatalogCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

/// Catalog whose calls for selected terms, or all barcode lookups, block until released
pub struct GatedCatalog {
    inner: InMemoryCatalog,
    gated_terms: Mutex<HashSet<String>>,
    gate_lookups: bool,
    gate: Notify,
    search_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl GatedCatalog {
    pub fn new(products: Vec<CatalogCandidate>, gate_lookups: bool) -> Self {
        Self {
            inner: InMemoryCatalog::new(products),
            gated_terms: Mutex::new(HashSet::new()),
            gate_lookups,
            gate: Notify::new(),
            search_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
        }
    }

    pub fn gate_term(&self, term: &str) {
        self.gated_terms.lock().insert(term.to_string());
    }

    /// Let one blocked call through
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// Calls received, including those still blocked
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCatalog for GatedCatalog {
    async fn search_products(&self, term: &str) -> AppResult<Vec<CatalogCandidate>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let gated = self.gated_terms.lock().contains(term);
        if gated {
            self.gate.notified().await;
        }
        self.inner.search_products(term).await
    }

    async fn lookup_by_barcode(&self, code: &str) -> AppResult<Option<CatalogCandidate>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if self.gate_lookups {
            self.gate.notified().await;
        }
        self.inner.lookup_by_barcode(code).await
    }
}

/// Substitution service that never answers in time
pub struct StalledSubstitutions {
    delay: Duration,
    calls: AtomicUsize,
}

impl StalledSubstitutions {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubstitutionService for StalledSubstitutions {
    async fn can_substitute(
        &self,
        _requirement_name: &str,
        _candidate_name: &str,
    ) -> AppResult<SubstitutionVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Err(AppError::Substitution("stalled".to_string()))
    }
}

/// In-memory backend for capture tests, with handles kept for assertions
pub struct CaptureFixture {
    pub catalog: Arc<InMemoryCatalog>,
    pub inventory: Arc<InMemoryInventory>,
    pub expiry: Arc<CategoryTableEstimator>,
    pub scanner: Arc<StaticImageScanner>,
    pub detector: Arc<KeywordCategoryDetector>,
}

impl CaptureFixture {
    pub fn new(products: Vec<CatalogCandidate>, detections: Vec<DetectedItem>) -> Self {
        Self {
            catalog: Arc::new(InMemoryCatalog::new(products)),
            inventory: Arc::new(InMemoryInventory::new()),
            expiry: Arc::new(CategoryTableEstimator::default()),
            scanner: Arc::new(StaticImageScanner::new(detections)),
            detector: Arc::new(KeywordCategoryDetector::default()),
        }
    }

    pub fn services(&self) -> CaptureServices {
        CaptureServices {
            catalog: self.catalog.clone(),
            inventory: self.inventory.clone(),
            expiry: self.expiry.clone(),
            scanner: self.scanner.clone(),
            detector: self.detector.clone(),
        }
    }

    pub fn controller(&self) -> CaptureController {
        CaptureController::new(
            self.services(),
            instant_matcher_config(),
            CaptureConfig::default(),
        )
    }
}

/// Poll `condition` until it holds, failing the test after one second
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 1s");
}
