//! Core data model shared by the matcher, the capture session and the resolver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confidence score stored with an item added from a barcode catalog match
pub const BARCODE_CONFIDENCE: f64 = 0.98;
/// Confidence score stored with an item entered through the manual wizard
pub const MANUAL_CONFIDENCE: f64 = 1.0;
/// Confidence score stored with an item detected on a photo
pub const PHOTO_CONFIDENCE: f64 = 0.8;

/// A catalog product returned by a search or barcode lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCandidate {
    pub id: String,
    pub product_name: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub category: String,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub unit_size: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Store the product was scraped from
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
}

impl CatalogCandidate {
    /// Score used for ranking; missing scores rank as zero
    pub fn score(&self) -> f64 {
        self.match_score.unwrap_or(0.0)
    }
}

/// The single in-progress item of a capture session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCaptureItem {
    pub raw_name: String,
    pub category: String,
    pub quantity_label: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub selected_candidate: Option<CatalogCandidate>,
    pub is_food: bool,
    /// Set once the user picks a category by hand
    pub category_locked: bool,
}

impl PendingCaptureItem {
    pub fn new(default_category: &str) -> Self {
        Self {
            raw_name: String::new(),
            category: default_category.to_string(),
            quantity_label: String::new(),
            expires_at: None,
            selected_candidate: None,
            is_food: true,
            category_locked: false,
        }
    }

    /// Manual category override. Later catalog matches leave it alone.
    pub fn lock_category(&mut self, category: &str) {
        self.category = category.to_string();
        self.category_locked = true;
    }

    /// Category suggested by the catalog or a detector; ignored while locked.
    /// Returns whether the category changed.
    pub fn suggest_category(&mut self, category: &str) -> bool {
        if self.category_locked || self.category == category {
            return false;
        }
        self.category = category.to_string();
        true
    }

    /// Select a catalog candidate, taking over its category unless locked
    pub fn apply_candidate(&mut self, candidate: CatalogCandidate) {
        self.suggest_category(&candidate.category);
        self.selected_candidate = Some(candidate);
    }

    /// Name written to the inventory: the catalog product name when one is selected
    pub fn display_name(&self) -> &str {
        self.selected_candidate
            .as_ref()
            .map(|c| c.product_name.as_str())
            .unwrap_or(self.raw_name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl InventoryEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
            expires_at: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Ordered, read-only view of a user's inventory. Order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventorySnapshot {
    entries: Vec<InventoryEntry>,
}

impl InventorySnapshot {
    pub fn new(entries: Vec<InventoryEntry>) -> Self {
        Self { entries }
    }

    /// Snapshot of plain names, category unknown
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: names.into_iter().map(InventoryEntry::new).collect(),
        }
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One recipe ingredient line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRequirement {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl IngredientRequirement {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: None,
            unit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapType {
    Synonym,
    Alternative,
}

/// A substitution applied by the resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientSwap {
    pub original: String,
    pub substitute: String,
    #[serde(rename = "type")]
    pub swap_type: SwapType,
    pub confidence: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngredientStatus {
    Available,
    Substituted,
    Missing,
}

/// Classification of one requirement against the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedIngredient {
    pub requirement: IngredientRequirement,
    pub status: IngredientStatus,
    #[serde(default)]
    pub swap: Option<IngredientSwap>,
}

impl ResolvedIngredient {
    /// The substitute's name while a swap is applied, the requirement's name otherwise
    pub fn display_name(&self) -> &str {
        self.swap
            .as_ref()
            .map(|swap| swap.substitute.as_str())
            .unwrap_or(self.requirement.name.as_str())
    }
}

/// Row handed to the inventory store on commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub category: String,
    pub quantity_label: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub confidence_score: f64,
    pub is_food: bool,
    pub catalog_product_id: Option<String>,
    pub catalog_price: Option<f64>,
    pub catalog_image_url: Option<String>,
}

/// Item reported by the AI image inventory service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedItem {
    pub name: String,
    #[serde(default)]
    pub quantity_estimate: Option<String>,
    #[serde(default)]
    pub days_until_expiry: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDetection {
    pub category: String,
    pub is_food: bool,
}

/// Answer of the substitution service for one (requirement, candidate) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionVerdict {
    pub can_substitute: bool,
    pub swap_type: SwapType,
    pub confidence: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SubstitutionVerdict {
    pub fn rejected() -> Self {
        Self {
            can_substitute: false,
            swap_type: SwapType::Alternative,
            confidence: 0.0,
            notes: None,
        }
    }
}
