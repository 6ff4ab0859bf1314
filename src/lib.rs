//! # Stockpit Core
//!
//! Client-side logic of a kitchen inventory app: catalog matching while an item
//! is typed, the capture session that turns barcode scans, photos and manual
//! entries into inventory items, the resolver that classifies a recipe's
//! ingredients against the inventory, and expiry countdowns.
//!
//! Every remote service is reached through the async traits in [`services`];
//! [`memory`] provides in-process implementations.

pub mod cache;
pub mod capture;
pub mod catalog_matcher;
pub mod categories;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod expiry;
pub mod ingredients;
pub mod memory;
pub mod model;
pub mod observability;
pub mod observability_config;
pub mod resolver;
pub mod services;
pub mod validation;

// Re-export types for easier access
pub use capture::{CaptureController, CaptureServices, CaptureSession, CaptureState};
pub use catalog_matcher::{CatalogMatcher, SearchOutcome};
pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use resolver::{IngredientResolver, Resolution};
