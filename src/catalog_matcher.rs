//! # Catalog Matcher
//!
//! Fuzzy product search over the remote catalog for the manual capture wizard.
//!
//! Every search is tagged with a [`SearchRequest`] carrying a generation number
//! drawn from a counter on the matcher. Issuing a new request makes all older
//! ones stale; a stale request is dropped after its debounce window (no remote
//! call) or, if its remote call was already underway, its result is discarded
//! when it arrives. Only the result of the most recently issued term is ever
//! reported as applicable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, Instrument};

use crate::config::MatcherConfig;
use crate::errors::{error_logging, AppError};
use crate::model::CatalogCandidate;
use crate::observability::{catalog_span, record_collaborator_failure, record_search_metrics};
use crate::services::ProductCatalog;

/// Ticket for one search. Compare with [`CatalogMatcher::is_current`] before applying results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    generation: u64,
    term: String,
}

impl SearchRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The trimmed term this request searches for
    pub fn term(&self) -> &str {
        &self.term
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Term below the minimum length; the catalog was not called
    TooShort,
    /// Ranked candidates for the current term (possibly empty)
    Results(Vec<CatalogCandidate>),
    /// The catalog failed or timed out. Non-fatal: show "search unavailable".
    Unavailable,
    /// A newer search was issued; this result must not be applied
    Superseded,
}

impl SearchOutcome {
    /// Candidates to display; empty for every outcome except `Results`
    pub fn candidates(&self) -> &[CatalogCandidate] {
        match self {
            SearchOutcome::Results(candidates) => candidates,
            _ => &[],
        }
    }

    /// Top-ranked candidate
    pub fn best_match(&self) -> Option<&CatalogCandidate> {
        self.candidates().first()
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, SearchOutcome::Superseded)
    }

    fn metric_label(&self) -> &'static str {
        match self {
            SearchOutcome::TooShort => "too_short",
            SearchOutcome::Results(_) => "results",
            SearchOutcome::Unavailable => "unavailable",
            SearchOutcome::Superseded => "superseded",
        }
    }
}

/// What to do with the current selection after a search
#[derive(Debug, Clone, PartialEq)]
pub enum AutoSelect {
    /// The existing selection still fits the term; leave it alone
    Keep,
    /// Select this candidate
    Select(CatalogCandidate),
    /// Nothing fits; drop the selection
    Clear,
}

/// Clamp, filter, order and cap raw catalog results.
///
/// Scores are clamped into [0, 1]; candidates scoring zero or below
/// `min_score` are dropped. Order is score descending, then shorter product
/// name first.
pub fn rank_candidates(
    candidates: Vec<CatalogCandidate>,
    min_score: f64,
    max_results: usize,
) -> Vec<CatalogCandidate> {
    let mut ranked: Vec<CatalogCandidate> = candidates
        .into_iter()
        .filter_map(|mut candidate| {
            let score = candidate.score().clamp(0.0, 1.0);
            if score.is_nan() || score <= 0.0 || score < min_score {
                return None;
            }
            candidate.match_score = Some(score);
            Some(candidate)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score().total_cmp(&a.score()).then_with(|| {
            a.product_name
                .chars()
                .count()
                .cmp(&b.product_name.chars().count())
        })
    });
    ranked.truncate(max_results);
    ranked
}

fn selection_satisfies(
    selection: &CatalogCandidate,
    term: &str,
    results: &[CatalogCandidate],
) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    selection.product_name.to_lowercase().contains(&term)
        || results.iter().any(|candidate| candidate.id == selection.id)
}

/// Decide the selection after a search for `term`.
///
/// A selection that still satisfies the term (its product name contains the
/// term, or it is still among the results) is kept; otherwise the top result
/// is selected, or the selection is cleared when there are no results.
pub fn auto_select(
    results: &[CatalogCandidate],
    current: Option<&CatalogCandidate>,
    term: &str,
) -> AutoSelect {
    if let Some(selection) = current {
        if selection_satisfies(selection, term, results) {
            return AutoSelect::Keep;
        }
    }

    match results.first() {
        Some(top) => AutoSelect::Select(top.clone()),
        None => AutoSelect::Clear,
    }
}

pub struct CatalogMatcher {
    catalog: Arc<dyn ProductCatalog>,
    config: MatcherConfig,
    generation: AtomicU64,
}

impl CatalogMatcher {
    pub fn new(catalog: Arc<dyn ProductCatalog>, config: MatcherConfig) -> Self {
        Self {
            catalog,
            config,
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Register a new term. Every previously issued request becomes stale.
    pub fn issue(&self, term: &str) -> SearchRequest {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        SearchRequest {
            generation,
            term: term.trim().to_string(),
        }
    }

    /// Whether `request` is still the latest issued search
    pub fn is_current(&self, request: &SearchRequest) -> bool {
        self.generation.load(Ordering::SeqCst) == request.generation
    }

    /// Issue and run a search for `term`
    pub async fn search(&self, term: &str) -> SearchOutcome {
        let request = self.issue(term);
        self.run(&request).await
    }

    /// Run a previously issued request: debounce, query, rank.
    ///
    /// Never fails; catalog errors and timeouts become [`SearchOutcome::Unavailable`].
    pub async fn run(&self, request: &SearchRequest) -> SearchOutcome {
        let start = Instant::now();
        let outcome = self
            .run_inner(request)
            .instrument(catalog_span("search"))
            .await;
        record_search_metrics(outcome.metric_label(), start.elapsed());
        outcome
    }

    async fn run_inner(&self, request: &SearchRequest) -> SearchOutcome {
        if request.term.chars().count() < self.config.min_term_len {
            return SearchOutcome::TooShort;
        }

        if !self.config.debounce().is_zero() {
            tokio::time::sleep(self.config.debounce()).await;
        }
        if !self.is_current(request) {
            debug!(term = %request.term, "Search superseded during debounce");
            return SearchOutcome::Superseded;
        }

        let result = tokio::time::timeout(
            self.config.remote_timeout(),
            self.catalog.search_products(&request.term),
        )
        .await
        .map_err(AppError::from)
        .and_then(|inner| inner);

        // Late results for a stale term are dropped whatever they contain
        if !self.is_current(request) {
            debug!(term = %request.term, "Discarding late search result");
            return SearchOutcome::Superseded;
        }

        match result {
            Ok(candidates) => {
                let received = candidates.len();
                let ranked = rank_candidates(
                    candidates,
                    self.config.min_match_score,
                    self.config.max_results,
                );
                debug!(
                    term = %request.term,
                    received,
                    kept = ranked.len(),
                    "Catalog search completed"
                );
                SearchOutcome::Results(ranked)
            }
            Err(e) => {
                error_logging::log_collaborator_error(
                    &e,
                    "product_catalog",
                    "search_products",
                    Some(&request.term),
                );
                record_collaborator_failure("product_catalog");
                SearchOutcome::Unavailable
            }
        }
    }
}
