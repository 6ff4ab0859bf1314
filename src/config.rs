//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! matcher, capture, resolver and observability settings into a single
//! structured configuration object. It supports loading from environment
//! variables and validation.

use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for `EXPIRY_FALLBACK_DAYS` (ten years)
pub const MAX_EXPIRY_FALLBACK_DAYS: i64 = 3_650;
/// Upper bound for `RESOLVER_CACHE_TTL_SECS` (one day)
pub const MAX_VERDICT_CACHE_TTL_SECS: u64 = 86_400;

/// Catalog matcher configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Terms shorter than this never reach the catalog
    pub min_term_len: usize,
    /// Debounce window applied before a search hits the catalog
    pub debounce_ms: u64,
    /// Maximum number of candidates returned
    pub max_results: usize,
    /// Candidates scoring below this are dropped
    pub min_match_score: f64,
    /// Deadline for a single catalog call
    pub remote_timeout_ms: u64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_term_len: 2,
            debounce_ms: 300,
            max_results: 10,
            min_match_score: 0.3,
            remote_timeout_ms: 5_000,
        }
    }
}

impl MatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Validate matcher configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.min_term_len == 0 {
            return Err(AppError::Config(
                "Minimum search term length cannot be 0".to_string(),
            ));
        }

        if self.max_results == 0 {
            return Err(AppError::Config("Max search results cannot be 0".to_string()));
        }

        if !(0.0..=1.0).contains(&self.min_match_score) {
            return Err(AppError::Config(format!(
                "Minimum match score must be within [0, 1], got {}",
                self.min_match_score
            )));
        }

        if self.remote_timeout_ms == 0 {
            return Err(AppError::Config("Catalog timeout cannot be 0".to_string()));
        }

        Ok(())
    }
}

/// Capture session configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Deadline for barcode lookups, image scans, inserts and estimates
    pub remote_timeout_ms: u64,
    /// Category assigned before detection or catalog data is known
    pub default_category: String,
    /// Unit used when the wizard quantity has no explicit unit
    pub default_unit: String,
    /// Quantity label for catalog products without a unit size
    pub catalog_default_quantity: String,
    /// Days added to now when the expiry estimator fails on a catalog-backed commit
    pub expiry_fallback_days: i64,
    /// Maximum number of images in one photo batch
    pub max_photos_per_batch: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            remote_timeout_ms: 10_000,
            default_category: "pantry".to_string(),
            default_unit: "pieces".to_string(),
            catalog_default_quantity: "1 piece".to_string(),
            expiry_fallback_days: 7,
            max_photos_per_batch: 10,
        }
    }
}

impl CaptureConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Validate capture configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.remote_timeout_ms == 0 {
            return Err(AppError::Config("Capture timeout cannot be 0".to_string()));
        }

        if !crate::categories::is_known_category(&self.default_category) {
            return Err(AppError::Config(format!(
                "Default category '{}' is not a known category",
                self.default_category
            )));
        }

        if self.default_unit.trim().is_empty() {
            return Err(AppError::Config("Default unit cannot be empty".to_string()));
        }

        if self.catalog_default_quantity.trim().is_empty() {
            return Err(AppError::Config(
                "Catalog default quantity cannot be empty".to_string(),
            ));
        }

        if self.expiry_fallback_days <= 0 {
            return Err(AppError::Config(
                "Expiry fallback days must be positive".to_string(),
            ));
        }

        if self.expiry_fallback_days > MAX_EXPIRY_FALLBACK_DAYS {
            return Err(AppError::Config(format!(
                "Expiry fallback days cannot exceed {}, got {}",
                MAX_EXPIRY_FALLBACK_DAYS, self.expiry_fallback_days
            )));
        }

        if self.max_photos_per_batch == 0 {
            return Err(AppError::Config("Max photos per batch cannot be 0".to_string()));
        }

        Ok(())
    }
}

/// How the resolver picks among inventory entries that can stand in for a missing ingredient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubstitutionStrategy {
    /// First inventory entry (in snapshot order) above the threshold wins
    #[default]
    FirstMatch,
    /// Every inventory entry is queried and the highest confidence wins; ties go to the earlier entry
    BestConfidence,
}

impl FromStr for SubstitutionStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first-match" | "first_match" => Ok(SubstitutionStrategy::FirstMatch),
            "best-confidence" | "best_confidence" => Ok(SubstitutionStrategy::BestConfidence),
            other => Err(AppError::Config(format!(
                "Unknown substitution strategy: {}",
                other
            ))),
        }
    }
}

/// Ingredient resolver configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// A swap is applied only when its confidence is strictly greater than this
    pub acceptance_threshold: f64,
    pub strategy: SubstitutionStrategy,
    /// Deadline for a single substitution lookup
    pub remote_timeout_ms: u64,
    /// Consecutive requirements whose lookups all failed before the breaker
    /// opens for the rest of the pass
    pub breaker_threshold: u32,
    /// Seconds the breaker stays open within one pass
    pub breaker_reset_secs: u64,
    /// How long a successful verdict is reused
    pub verdict_cache_ttl_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.5,
            strategy: SubstitutionStrategy::FirstMatch,
            remote_timeout_ms: 5_000,
            breaker_threshold: 5,
            breaker_reset_secs: 60,
            verdict_cache_ttl_secs: 300,
        }
    }
}

impl ResolverConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn verdict_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.verdict_cache_ttl_secs)
    }

    /// Validate resolver configuration
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(AppError::Config(format!(
                "Acceptance threshold must be within [0, 1], got {}",
                self.acceptance_threshold
            )));
        }

        if self.remote_timeout_ms == 0 {
            return Err(AppError::Config("Resolver timeout cannot be 0".to_string()));
        }

        if self.breaker_threshold == 0 {
            return Err(AppError::Config(
                "Circuit breaker threshold cannot be 0".to_string(),
            ));
        }

        if self.breaker_reset_secs == 0 {
            return Err(AppError::Config(
                "Circuit breaker reset window cannot be 0".to_string(),
            ));
        }

        if self.verdict_cache_ttl_secs > MAX_VERDICT_CACHE_TTL_SECS {
            return Err(AppError::Config(format!(
                "Verdict cache TTL cannot exceed {} seconds, got {}",
                MAX_VERDICT_CACHE_TTL_SECS, self.verdict_cache_ttl_secs
            )));
        }

        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub matcher: MatcherConfig,
    pub capture: CaptureConfig,
    pub resolver: ResolverConfig,
    pub observability: ObservabilityConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a valid value, got '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // Shared deadline for catalog and substitution calls
        let remote_timeout_ms = env_or("REMOTE_TIMEOUT_MS", config.matcher.remote_timeout_ms)?;

        config.matcher.min_term_len = env_or("MATCHER_MIN_TERM_LEN", config.matcher.min_term_len)?;
        config.matcher.debounce_ms = env_or("MATCHER_DEBOUNCE_MS", config.matcher.debounce_ms)?;
        config.matcher.max_results = env_or("MATCHER_MAX_RESULTS", config.matcher.max_results)?;
        config.matcher.min_match_score =
            env_or("MATCHER_MIN_SCORE", config.matcher.min_match_score)?;
        config.matcher.remote_timeout_ms = remote_timeout_ms;

        config.capture.remote_timeout_ms =
            env_or("CAPTURE_TIMEOUT_MS", config.capture.remote_timeout_ms)?;
        config.capture.expiry_fallback_days =
            env_or("EXPIRY_FALLBACK_DAYS", config.capture.expiry_fallback_days)?;
        config.capture.max_photos_per_batch =
            env_or("MAX_PHOTOS_PER_BATCH", config.capture.max_photos_per_batch)?;
        if let Ok(category) = env::var("DEFAULT_CATEGORY") {
            config.capture.default_category = category.trim().to_string();
        }

        config.resolver.acceptance_threshold = env_or(
            "RESOLVER_ACCEPTANCE_THRESHOLD",
            config.resolver.acceptance_threshold,
        )?;
        config.resolver.strategy = env_or("RESOLVER_STRATEGY", config.resolver.strategy)?;
        config.resolver.remote_timeout_ms = remote_timeout_ms;
        config.resolver.breaker_threshold =
            env_or("RESOLVER_BREAKER_THRESHOLD", config.resolver.breaker_threshold)?;
        config.resolver.breaker_reset_secs =
            env_or("RESOLVER_BREAKER_RESET_SECS", config.resolver.breaker_reset_secs)?;
        config.resolver.verdict_cache_ttl_secs =
            env_or("RESOLVER_CACHE_TTL_SECS", config.resolver.verdict_cache_ttl_secs)?;

        config.observability = ObservabilityConfig::from_env();

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.matcher.validate()?;
        self.capture.validate()?;
        self.resolver.validate()?;
        self.observability.validate().map_err(AppError::Config)?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: debounce_ms={}, max_results={}, min_match_score={}, acceptance_threshold={}, strategy={:?}, environment={}",
            self.matcher.debounce_ms,
            self.matcher.max_results,
            self.matcher.min_match_score,
            self.resolver.acceptance_threshold,
            self.resolver.strategy,
            self.observability.environment
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_matcher_config_validation() {
        let mut config = MatcherConfig::default();
        assert!(config.validate().is_ok());

        config.min_match_score = 1.5;
        assert!(config.validate().is_err());
        config.min_match_score = 0.3;

        config.max_results = 0;
        assert!(config.validate().is_err());
        config.max_results = 10;

        config.remote_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_capture_config_validation() {
        let mut config = CaptureConfig::default();
        assert!(config.validate().is_ok());

        config.default_category = "moon_rocks".to_string();
        assert!(config.validate().is_err());
        config.default_category = "pantry".to_string();

        config.expiry_fallback_days = 0;
        assert!(config.validate().is_err());

        config.expiry_fallback_days = MAX_EXPIRY_FALLBACK_DAYS;
        assert!(config.validate().is_ok());
        config.expiry_fallback_days = i64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolver_config_validation() {
        let mut config = ResolverConfig::default();
        assert!(config.validate().is_ok());

        config.acceptance_threshold = -0.1;
        assert!(config.validate().is_err());
        config.acceptance_threshold = 0.5;

        config.breaker_threshold = 0;
        assert!(config.validate().is_err());
        config.breaker_threshold = 5;

        config.verdict_cache_ttl_secs = 0;
        assert!(config.validate().is_ok());
        config.verdict_cache_ttl_secs = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "first-match".parse::<SubstitutionStrategy>().unwrap(),
            SubstitutionStrategy::FirstMatch
        );
        assert_eq!(
            "BEST_CONFIDENCE".parse::<SubstitutionStrategy>().unwrap(),
            SubstitutionStrategy::BestConfidence
        );
        assert!("random".parse::<SubstitutionStrategy>().is_err());
    }
}
