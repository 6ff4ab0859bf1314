//! In-process collaborators.
//!
//! Backend-free implementations of every trait in [`crate::services`]. The demo
//! binary runs on them and the tests use their call counters and failure
//! switches to drive degraded paths.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::categories::DEFAULT_CATEGORY;
use crate::errors::{AppError, AppResult};
use crate::ingredients::RawIngredient;
use crate::model::{
    CatalogCandidate, CategoryDetection, DetectedItem, InventoryEntry, InventorySnapshot,
    NewInventoryItem, SubstitutionVerdict, SwapType,
};
use crate::services::{
    CategoryDetector, ExpiryEstimator, ImageInventoryScanner, InventoryStore, ProductCatalog,
    SubstitutionService,
};
use crate::validation::normalize_barcode;

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Similarity between a search term and a product name, in [0, 1]
pub fn name_similarity(term: &str, product_name: &str) -> f64 {
    let term = normalize(term);
    let name = normalize(product_name);
    if term.is_empty() || name.is_empty() {
        return 0.0;
    }

    if name == term {
        return 1.0;
    }
    if name.starts_with(&term) {
        return 0.9;
    }
    if name.split_whitespace().any(|word| word == term) {
        return 0.85;
    }
    if name.contains(&term) {
        return 0.7;
    }
    if term.contains(&name) {
        return 0.6;
    }

    let term_tokens: HashSet<&str> = term.split_whitespace().collect();
    let name_tokens: HashSet<&str> = name.split_whitespace().collect();
    let shared = term_tokens.intersection(&name_tokens).count();
    0.5 * shared as f64 / term_tokens.len() as f64
}

/// Product catalog held in memory
#[derive(Default)]
pub struct InMemoryCatalog {
    products: Vec<CatalogCandidate>,
    latency: Duration,
    fail: AtomicBool,
    search_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<CatalogCandidate>) -> Self {
        Self {
            products,
            ..Default::default()
        }
    }

    /// Delay every call, simulating a slow network
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    async fn simulate_network(&self) -> AppResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Catalog("catalog service unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn search_products(&self, term: &str) -> AppResult<Vec<CatalogCandidate>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;

        let mut results: Vec<CatalogCandidate> = self
            .products
            .iter()
            .filter_map(|product| {
                let score = name_similarity(term, &product.product_name);
                (score > 0.0).then(|| CatalogCandidate {
                    match_score: Some(score),
                    ..product.clone()
                })
            })
            .collect();
        results.sort_by(|a, b| b.score().total_cmp(&a.score()));
        Ok(results)
    }

    async fn lookup_by_barcode(&self, code: &str) -> AppResult<Option<CatalogCandidate>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;

        let code = normalize_barcode(code);
        Ok(self
            .products
            .iter()
            .find(|product| {
                product
                    .barcode
                    .as_deref()
                    .map(normalize_barcode)
                    .is_some_and(|barcode| barcode == code)
            })
            .map(|product| CatalogCandidate {
                match_score: Some(1.0),
                ..product.clone()
            }))
    }
}

/// Inventory held in memory, in insertion order
#[derive(Default)]
pub struct InMemoryInventory {
    items: Mutex<Vec<(String, NewInventoryItem)>>,
    next_id: AtomicU64,
    fail_all: AtomicBool,
    rejected_names: Mutex<HashSet<String>>,
    insert_calls: AtomicUsize,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing entries
    pub fn with_entries(entries: &[InventoryEntry]) -> Self {
        let store = Self::new();
        {
            let mut items = store.items.lock();
            for entry in entries {
                let id = store.allocate_id();
                items.push((
                    id,
                    NewInventoryItem {
                        name: entry.name.clone(),
                        category: entry
                            .category
                            .clone()
                            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                        quantity_label: None,
                        expires_at: entry.expires_at,
                        confidence_score: 1.0,
                        is_food: true,
                        catalog_product_id: None,
                        catalog_price: None,
                        catalog_image_url: None,
                    },
                ));
            }
        }
        store
    }

    /// Reject every insert
    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    /// Reject inserts of one item name, leaving the rest accepted
    pub fn reject_name(&self, name: &str) {
        self.rejected_names.lock().insert(normalize(name));
    }

    pub fn items(&self) -> Vec<NewInventoryItem> {
        self.items
            .lock()
            .iter()
            .map(|(_, item)| item.clone())
            .collect()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn allocate_id(&self) -> String {
        format!("inv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventory {
    async fn insert(&self, item: NewInventoryItem) -> AppResult<String> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(AppError::Inventory("inventory store unavailable".to_string()));
        }
        if self.rejected_names.lock().contains(&normalize(&item.name)) {
            return Err(AppError::Inventory(format!(
                "insert rejected for '{}'",
                item.name
            )));
        }

        let id = self.allocate_id();
        self.items.lock().push((id.clone(), item));
        Ok(id)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|(item_id, _)| item_id != id);
        if items.len() == before {
            return Err(AppError::Inventory(format!("no inventory item with id {}", id)));
        }
        Ok(())
    }

    async fn list(&self, _user_id: &str) -> AppResult<InventorySnapshot> {
        let items = self.items.lock();
        Ok(InventorySnapshot::new(
            items
                .iter()
                .map(|(_, item)| InventoryEntry {
                    name: item.name.clone(),
                    category: Some(item.category.clone()),
                    expires_at: item.expires_at,
                })
                .collect(),
        ))
    }
}

/// One pairwise substitution rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    pub ingredient: String,
    pub substitute: String,
    #[serde(rename = "type")]
    pub swap_type: SwapType,
    pub confidence: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Substitution service answering from a rule table.
///
/// A rule applies when the requirement name contains the rule's ingredient and
/// the candidate name contains the rule's substitute.
#[derive(Default)]
pub struct RuleSubstitutions {
    rules: Vec<SubstitutionRule>,
    fail_all: AtomicBool,
    failing_candidates: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl RuleSubstitutions {
    pub fn new(rules: Vec<SubstitutionRule>) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    /// Make lookups against one candidate fail
    pub fn fail_for_candidate(&self, candidate: &str) {
        self.failing_candidates.lock().insert(normalize(candidate));
    }

    /// Every (requirement, candidate) pair asked so far, in order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SubstitutionService for RuleSubstitutions {
    async fn can_substitute(
        &self,
        requirement_name: &str,
        candidate_name: &str,
    ) -> AppResult<SubstitutionVerdict> {
        self.calls
            .lock()
            .push((requirement_name.to_string(), candidate_name.to_string()));

        let requirement = normalize(requirement_name);
        let candidate = normalize(candidate_name);
        if self.fail_all.load(Ordering::SeqCst) || self.failing_candidates.lock().contains(&candidate)
        {
            return Err(AppError::Substitution(format!(
                "lookup failed for {} -> {}",
                requirement_name, candidate_name
            )));
        }

        Ok(self
            .rules
            .iter()
            .find(|rule| {
                requirement.contains(&normalize(&rule.ingredient))
                    && candidate.contains(&normalize(&rule.substitute))
            })
            .map(|rule| SubstitutionVerdict {
                can_substitute: true,
                swap_type: rule.swap_type,
                confidence: rule.confidence,
                notes: rule.notes.clone(),
            })
            .unwrap_or_else(SubstitutionVerdict::rejected))
    }
}

/// Shelf-life estimator backed by a days-per-category table
pub struct CategoryTableEstimator {
    shelf_life_days: HashMap<String, i64>,
    fail: AtomicBool,
}

impl Default for CategoryTableEstimator {
    fn default() -> Self {
        let table = [
            ("fresh_produce", 5),
            ("dairy_eggs", 7),
            ("proteins", 3),
            ("seafood", 2),
            ("bakery", 4),
            ("pantry", 180),
            ("spices_condiments", 365),
            ("frozen", 90),
            ("ready_meals", 3),
            ("beverages", 180),
            ("snacks", 90),
        ];
        Self {
            shelf_life_days: table
                .iter()
                .map(|(slug, days)| (slug.to_string(), *days))
                .collect(),
            fail: AtomicBool::new(false),
        }
    }
}

impl CategoryTableEstimator {
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn shelf_life_days(&self, category_slug: &str) -> Option<i64> {
        self.shelf_life_days.get(category_slug).copied()
    }
}

#[async_trait]
impl ExpiryEstimator for CategoryTableEstimator {
    async fn estimate(&self, category_slug: &str) -> AppResult<Option<DateTime<Utc>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("expiry estimation unavailable".to_string()));
        }
        Ok(self
            .shelf_life_days(category_slug)
            .map(|days| Utc::now() + ChronoDuration::days(days)))
    }
}

/// Category detector matching keywords in the item name
pub struct KeywordCategoryDetector {
    keywords: Vec<(&'static str, &'static str)>,
    fail: AtomicBool,
}

impl Default for KeywordCategoryDetector {
    fn default() -> Self {
        Self {
            keywords: vec![
                ("melk", "dairy_eggs"),
                ("kaas", "dairy_eggs"),
                ("yoghurt", "dairy_eggs"),
                ("eieren", "dairy_eggs"),
                ("boter", "dairy_eggs"),
                ("kip", "proteins"),
                ("gehakt", "proteins"),
                ("zalm", "seafood"),
                ("garnalen", "seafood"),
                ("brood", "bakery"),
                ("appel", "fresh_produce"),
                ("tomaat", "fresh_produce"),
                ("sla", "fresh_produce"),
                ("koriander", "fresh_produce"),
                ("basilicum", "fresh_produce"),
                ("pizza", "frozen"),
                ("sap", "beverages"),
                ("chips", "snacks"),
                ("shampoo", "personal_care"),
                ("zeep", "personal_care"),
                ("afwasmiddel", "household"),
            ],
            fail: AtomicBool::new(false),
        }
    }
}

impl KeywordCategoryDetector {
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CategoryDetector for KeywordCategoryDetector {
    async fn detect(&self, item_name: &str) -> AppResult<CategoryDetection> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Scan("category detection unavailable".to_string()));
        }

        let name = normalize(item_name);
        let category = self
            .keywords
            .iter()
            .find(|(keyword, _)| name.contains(keyword))
            .map(|(_, category)| *category)
            .unwrap_or(DEFAULT_CATEGORY);
        Ok(CategoryDetection {
            category: category.to_string(),
            is_food: !matches!(category, "personal_care" | "household"),
        })
    }
}

/// Image scanner returning a fixed detection list
#[derive(Default)]
pub struct StaticImageScanner {
    detections: Vec<DetectedItem>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl StaticImageScanner {
    pub fn new(detections: Vec<DetectedItem>) -> Self {
        Self {
            detections,
            ..Default::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageInventoryScanner for StaticImageScanner {
    async fn scan_photos(&self, image_urls: &[String]) -> AppResult<Vec<DetectedItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Scan("image scan unavailable".to_string()));
        }
        if image_urls.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.detections.clone())
    }
}

/// Recipe as stored in a fixture: ingredients in their loose collaborator shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRecipe {
    pub title: String,
    pub ingredients: Vec<RawIngredient>,
}

/// JSON document describing a complete offline backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub catalog: Vec<CatalogCandidate>,
    #[serde(default)]
    pub inventory: Vec<InventoryEntry>,
    #[serde(default)]
    pub substitutions: Vec<SubstitutionRule>,
    #[serde(default)]
    pub detections: Vec<DetectedItem>,
    #[serde(default)]
    pub recipe: Option<FixtureRecipe>,
}

impl Fixture {
    pub fn from_json(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Cannot read fixture {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn catalog(&self) -> InMemoryCatalog {
        InMemoryCatalog::new(self.catalog.clone())
    }

    pub fn inventory_store(&self) -> InMemoryInventory {
        InMemoryInventory::with_entries(&self.inventory)
    }

    pub fn substitutions(&self) -> RuleSubstitutions {
        RuleSubstitutions::new(self.substitutions.clone())
    }

    pub fn image_scanner(&self) -> StaticImageScanner {
        StaticImageScanner::new(self.detections.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, name: &str, barcode: Option<&str>) -> CatalogCandidate {
        CatalogCandidate {
            id: id.to_string(),
            product_name: name.to_string(),
            brand: None,
            category: "fresh_produce".to_string(),
            barcode: barcode.map(str::to_string),
            price: None,
            unit_size: None,
            image_url: None,
            source: None,
            match_score: None,
        }
    }

    #[test]
    fn test_name_similarity_ordering() {
        assert_eq!(name_similarity("appel", "Appel"), 1.0);
        assert!(name_similarity("appel", "Appelmoes") > name_similarity("appel", "Elstar appel"));
        assert!(name_similarity("appel", "Elstar appel") > name_similarity("appel", "Handappels"));
        assert_eq!(name_similarity("appel", "Bloem"), 0.0);
    }

    #[tokio::test]
    async fn test_catalog_barcode_lookup_normalizes() {
        let catalog = InMemoryCatalog::new(vec![product("p1", "Halfvolle melk", Some("8710 4000"))]);
        let found = catalog.lookup_by_barcode(" 87104000 ").await.unwrap();
        assert_eq!(found.unwrap().id, "p1");
        assert_eq!(catalog.lookup_calls(), 1);
    }

    #[tokio::test]
    async fn test_inventory_insert_list_delete() {
        let store = InMemoryInventory::new();
        let id = store
            .insert(NewInventoryItem {
                name: "Kaas".to_string(),
                category: "dairy_eggs".to_string(),
                quantity_label: None,
                expires_at: None,
                confidence_score: 1.0,
                is_food: true,
                catalog_product_id: None,
                catalog_price: None,
                catalog_image_url: None,
            })
            .await
            .unwrap();

        assert_eq!(store.list("u1").await.unwrap().len(), 1);
        store.delete(&id).await.unwrap();
        assert!(store.list("u1").await.unwrap().is_empty());
        assert!(store.delete(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_rule_substitutions() {
        let service = RuleSubstitutions::new(vec![SubstitutionRule {
            ingredient: "boter".to_string(),
            substitute: "margarine".to_string(),
            swap_type: SwapType::Alternative,
            confidence: 0.8,
            notes: Some("iets minder smaak".to_string()),
        }]);

        let verdict = service.can_substitute("Roomboter", "Bak margarine").await.unwrap();
        assert!(verdict.can_substitute);
        assert_eq!(verdict.swap_type, SwapType::Alternative);

        let verdict = service.can_substitute("boter", "olijfolie").await.unwrap();
        assert!(!verdict.can_substitute);
        assert_eq!(service.call_count(), 2);
    }

    #[tokio::test]
    async fn test_keyword_detector() {
        let detector = KeywordCategoryDetector::default();
        let detection = detector.detect("Halfvolle melk").await.unwrap();
        assert_eq!(detection.category, "dairy_eggs");
        assert!(detection.is_food);

        let detection = detector.detect("Afwasmiddel citroen").await.unwrap();
        assert_eq!(detection.category, "household");
        assert!(!detection.is_food);

        let detection = detector.detect("Iets onbekends").await.unwrap();
        assert_eq!(detection.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_fixture_parses_mixed_ingredients() {
        let fixture = Fixture::from_json(
            r#"{
                "inventory": [{"name": "cherry tomaatjes"}],
                "recipe": {"title": "Salade", "ingredients": ["200g tomaat", {"name": "basilicum", "quantity": 1}]}
            }"#,
        )
        .unwrap();

        assert_eq!(fixture.inventory.len(), 1);
        assert_eq!(fixture.recipe.unwrap().ingredients.len(), 2);
    }
}
