//! # Ingredient Resolver
//!
//! Classifies every recipe ingredient against an inventory snapshot as
//! available, substituted or missing.
//!
//! Per requirement, in recipe order:
//! 1. direct match: some inventory name equals, contains or is contained in the
//!    requirement name (both lowercased and trimmed);
//! 2. otherwise the substitution service is asked about each inventory entry,
//!    sequentially in snapshot order, and a verdict is accepted only when its
//!    confidence is strictly above the acceptance threshold;
//! 3. otherwise the requirement is missing.
//!
//! Collaborator failures never escape: a failed lookup moves on to the next
//! inventory entry, and total failure shows everything unmatched as missing.
//!
//! Each pass carries its own circuit breaker. It counts requirements whose
//! lookups all failed, never single pairs, so one requirement always gets to
//! ask about every inventory entry. Once `breaker_threshold` requirements in a
//! row come back with nothing but failures, the rest of the pass stops calling
//! the service. The next pass starts closed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, Instrument};

use crate::cache::VerdictCache;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::ResolverConfig;
use crate::errors::{error_logging, AppError, AppResult};
use crate::model::{
    IngredientRequirement, IngredientStatus, IngredientSwap, InventorySnapshot, ResolvedIngredient,
    SubstitutionVerdict,
};
use crate::observability::{
    record_collaborator_failure, record_resolution_metrics, resolver_span,
    update_circuit_breaker_state,
};
use crate::services::SubstitutionService;

pub use crate::config::SubstitutionStrategy;

/// Lowercase and trim a name for comparison
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Bidirectional substring test: "tomaat" matches "cherry tomaatjes" and the
/// other way round. Blank names never match.
pub fn names_match(requirement: &str, inventory_name: &str) -> bool {
    let requirement = normalize_name(requirement);
    let inventory_name = normalize_name(inventory_name);
    if requirement.is_empty() || inventory_name.is_empty() {
        return false;
    }
    requirement.contains(&inventory_name) || inventory_name.contains(&requirement)
}

/// Whether any inventory entry directly satisfies `requirement`
pub fn has_direct_match(requirement: &str, inventory: &InventorySnapshot) -> bool {
    inventory
        .entries()
        .iter()
        .any(|entry| names_match(requirement, &entry.name))
}

/// Status counts of a resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionSummary {
    pub available: usize,
    pub substituted: usize,
    pub missing: usize,
}

impl ResolutionSummary {
    pub fn total(&self) -> usize {
        self.available + self.substituted + self.missing
    }

    /// Ingredients the user can cook with right now, swaps included
    pub fn on_hand(&self) -> usize {
        self.available + self.substituted
    }
}

/// Output of [`IngredientResolver::resolve`]. `resolved` keeps recipe order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub resolved: Vec<ResolvedIngredient>,
    pub swaps: Vec<IngredientSwap>,
}

impl Resolution {
    /// Confirm a proposed swap. The swap is already applied, so this only
    /// reports whether one exists for `original`.
    pub fn accept_swap(&self, original: &str) -> bool {
        let original = normalize_name(original);
        self.swaps
            .iter()
            .any(|swap| normalize_name(&swap.original) == original)
    }

    /// Reject the swap proposed for `original`.
    ///
    /// The swap leaves the swap list, the ingredient shows its own name again
    /// and its status is re-evaluated by direct match against `inventory`.
    /// Returns false when no swap exists for `original`.
    pub fn reject_swap(&mut self, original: &str, inventory: &InventorySnapshot) -> bool {
        let key = normalize_name(original);
        let before = self.swaps.len();
        self.swaps
            .retain(|swap| normalize_name(&swap.original) != key);
        if self.swaps.len() == before {
            return false;
        }

        for ingredient in &mut self.resolved {
            let rejected = ingredient
                .swap
                .as_ref()
                .is_some_and(|swap| normalize_name(&swap.original) == key);
            if rejected {
                ingredient.swap = None;
                ingredient.status = if has_direct_match(&ingredient.requirement.name, inventory) {
                    IngredientStatus::Available
                } else {
                    IngredientStatus::Missing
                };
            }
        }
        debug!(original = %original, "Swap rejected");
        true
    }

    pub fn summary(&self) -> ResolutionSummary {
        self.resolved
            .iter()
            .fold(ResolutionSummary::default(), |mut summary, ingredient| {
                match ingredient.status {
                    IngredientStatus::Available => summary.available += 1,
                    IngredientStatus::Substituted => summary.substituted += 1,
                    IngredientStatus::Missing => summary.missing += 1,
                }
                summary
            })
    }

    /// Names to display, in recipe order: substitutes in place of swapped ingredients
    pub fn display_names(&self) -> Vec<&str> {
        self.resolved
            .iter()
            .map(ResolvedIngredient::display_name)
            .collect()
    }

    pub fn missing(&self) -> impl Iterator<Item = &ResolvedIngredient> {
        self.resolved
            .iter()
            .filter(|ingredient| ingredient.status == IngredientStatus::Missing)
    }
}

/// Remote lookups made for one requirement
#[derive(Debug, Default)]
struct LookupTally {
    succeeded: usize,
    failed: usize,
}

pub struct IngredientResolver {
    substitutions: Arc<dyn SubstitutionService>,
    config: ResolverConfig,
    verdicts: VerdictCache,
}

impl IngredientResolver {
    pub fn new(substitutions: Arc<dyn SubstitutionService>, config: ResolverConfig) -> Self {
        let verdicts = VerdictCache::new(config.verdict_cache_ttl());
        Self {
            substitutions,
            config,
            verdicts,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn verdict_cache(&self) -> &VerdictCache {
        &self.verdicts
    }

    /// Classify every requirement against `inventory`. Never fails.
    pub async fn resolve(
        &self,
        requirements: &[IngredientRequirement],
        inventory: &InventorySnapshot,
    ) -> Resolution {
        let start = Instant::now();
        self.verdicts.cleanup();

        let resolution = self
            .resolve_inner(requirements, inventory)
            .instrument(resolver_span("resolve", requirements.len()))
            .await;

        let statuses: Vec<IngredientStatus> =
            resolution.resolved.iter().map(|r| r.status).collect();
        record_resolution_metrics(&statuses, start.elapsed());
        let summary = resolution.summary();
        info!(
            available = summary.available,
            substituted = summary.substituted,
            missing = summary.missing,
            "Recipe resolved against inventory"
        );
        resolution
    }

    async fn resolve_inner(
        &self,
        requirements: &[IngredientRequirement],
        inventory: &InventorySnapshot,
    ) -> Resolution {
        let mut resolution = Resolution::default();
        let breaker = CircuitBreaker::new(
            self.config.breaker_threshold,
            Duration::from_secs(self.config.breaker_reset_secs),
        );
        update_circuit_breaker_state(false);

        for requirement in requirements {
            if has_direct_match(&requirement.name, inventory) {
                resolution.resolved.push(ResolvedIngredient {
                    requirement: requirement.clone(),
                    status: IngredientStatus::Available,
                    swap: None,
                });
                continue;
            }

            match self.find_substitute(requirement, inventory, &breaker).await {
                Some(swap) => {
                    resolution.swaps.push(swap.clone());
                    resolution.resolved.push(ResolvedIngredient {
                        requirement: requirement.clone(),
                        status: IngredientStatus::Substituted,
                        swap: Some(swap),
                    });
                }
                None => resolution.resolved.push(ResolvedIngredient {
                    requirement: requirement.clone(),
                    status: IngredientStatus::Missing,
                    swap: None,
                }),
            }
        }

        resolution
    }

    fn accepts(&self, verdict: &SubstitutionVerdict) -> bool {
        verdict.can_substitute
            && verdict.confidence.is_finite()
            && verdict.confidence.clamp(0.0, 1.0) > self.config.acceptance_threshold
    }

    async fn find_substitute(
        &self,
        requirement: &IngredientRequirement,
        inventory: &InventorySnapshot,
        breaker: &CircuitBreaker,
    ) -> Option<IngredientSwap> {
        if normalize_name(&requirement.name).is_empty() {
            return None;
        }

        // Checked once: failures inside this loop never cut it short
        let breaker_open = breaker.is_open();
        if breaker_open {
            debug!(requirement = %requirement.name, "Substitution breaker open, using cached verdicts only");
        }

        let mut asked = HashSet::new();
        let mut tally = LookupTally::default();
        let mut best: Option<IngredientSwap> = None;

        for entry in inventory.entries() {
            let candidate = normalize_name(&entry.name);
            if candidate.is_empty() || !asked.insert(candidate) {
                continue;
            }

            let Some(verdict) = self
                .verdict(&requirement.name, &entry.name, breaker_open, &mut tally)
                .await
            else {
                continue;
            };
            if !self.accepts(&verdict) {
                continue;
            }

            let swap = IngredientSwap {
                original: requirement.name.clone(),
                substitute: entry.name.clone(),
                swap_type: verdict.swap_type,
                confidence: verdict.confidence.clamp(0.0, 1.0),
                notes: verdict.notes,
            };
            match self.config.strategy {
                SubstitutionStrategy::FirstMatch => {
                    best = Some(swap);
                    break;
                }
                SubstitutionStrategy::BestConfidence => {
                    if best
                        .as_ref()
                        .map_or(true, |current| swap.confidence > current.confidence)
                    {
                        best = Some(swap);
                    }
                }
            }
        }

        if tally.succeeded > 0 {
            breaker.record_success();
        } else if tally.failed > 0 {
            breaker.record_failure();
            if breaker.is_open() {
                info!(
                    requirement = %requirement.name,
                    failed_requirements = breaker.failure_count(),
                    "Substitution service unreachable, skipping lookups for the rest of this pass"
                );
                update_circuit_breaker_state(true);
            }
        }

        best
    }

    /// Verdict for one pair: cached, fetched, or `None` when unavailable.
    /// Remote lookups are counted in `tally`; cache hits are not.
    async fn verdict(
        &self,
        requirement: &str,
        candidate: &str,
        breaker_open: bool,
        tally: &mut LookupTally,
    ) -> Option<SubstitutionVerdict> {
        if let Some(verdict) = self.verdicts.get(requirement, candidate) {
            return Some(verdict);
        }
        if breaker_open {
            return None;
        }

        match self.lookup(requirement, candidate).await {
            Ok(verdict) => {
                tally.succeeded += 1;
                self.verdicts.insert(requirement, candidate, verdict.clone());
                Some(verdict)
            }
            Err(e) => {
                tally.failed += 1;
                let subject = format!("{} -> {}", requirement, candidate);
                error_logging::log_collaborator_error(
                    &e,
                    "substitution_service",
                    "can_substitute",
                    Some(&subject),
                );
                record_collaborator_failure("substitution_service");
                None
            }
        }
    }

    async fn lookup(&self, requirement: &str, candidate: &str) -> AppResult<SubstitutionVerdict> {
        tokio::time::timeout(
            self.config.remote_timeout(),
            self.substitutions.can_substitute(requirement, candidate),
        )
        .await
        .map_err(AppError::from)?
    }
}
