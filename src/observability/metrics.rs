//! Metrics recording functions.
//!
//! All functions are cheap no-ops until a recorder is installed, so library
//! code calls them unconditionally.

use std::time::Duration;

use crate::model::IngredientStatus;

/// Register descriptions for the Prometheus exposition
pub fn describe_metrics() {
    metrics::describe_counter!("catalog_searches_total", "Catalog searches by outcome");
    metrics::describe_histogram!(
        "catalog_search_duration_seconds",
        "Time spent waiting on the product catalog"
    );
    metrics::describe_counter!("barcode_scans_total", "Barcode scan events by disposition");
    metrics::describe_counter!("photo_batch_items_total", "Photo batch detections by result");
    metrics::describe_counter!("capture_commits_total", "Inventory commits by mode and result");
    metrics::describe_histogram!("capture_commit_duration_seconds", "Inventory commit latency");
    metrics::describe_counter!(
        "resolved_ingredients_total",
        "Resolved recipe ingredients by status"
    );
    metrics::describe_histogram!("resolution_duration_seconds", "Time for one resolver pass");
    metrics::describe_counter!(
        "collaborator_failures_total",
        "Degraded collaborator calls by collaborator"
    );
    metrics::describe_gauge!(
        "substitution_breaker_open",
        "1 while the substitution circuit breaker is open"
    );
}

/// Record one catalog search and how it ended
pub fn record_search_metrics(outcome: &'static str, duration: Duration) {
    metrics::counter!("catalog_searches_total", "outcome" => outcome).increment(1);
    metrics::histogram!("catalog_search_duration_seconds").record(duration.as_secs_f64());
}

/// Record a barcode event: "started", "duplicate", "ignored", "found", "not_found", "unavailable"
pub fn record_barcode_metrics(disposition: &'static str) {
    metrics::counter!("barcode_scans_total", "disposition" => disposition).increment(1);
}

pub fn record_photo_batch_metrics(detected: usize, inserted: usize, failed: usize) {
    metrics::counter!("photo_batch_items_total", "result" => "detected").increment(detected as u64);
    metrics::counter!("photo_batch_items_total", "result" => "inserted").increment(inserted as u64);
    metrics::counter!("photo_batch_items_total", "result" => "failed").increment(failed as u64);
}

pub fn record_commit_metrics(mode: &'static str, success: bool, duration: Duration) {
    metrics::counter!(
        "capture_commits_total",
        "mode" => mode,
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
    metrics::histogram!("capture_commit_duration_seconds").record(duration.as_secs_f64());
}

/// Record the status mix of one resolver pass
pub fn record_resolution_metrics(statuses: &[IngredientStatus], duration: Duration) {
    for status in statuses {
        let label = match status {
            IngredientStatus::Available => "available",
            IngredientStatus::Substituted => "substituted",
            IngredientStatus::Missing => "missing",
        };
        metrics::counter!("resolved_ingredients_total", "status" => label).increment(1);
    }
    metrics::histogram!("resolution_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_collaborator_failure(collaborator: &'static str) {
    metrics::counter!("collaborator_failures_total", "collaborator" => collaborator).increment(1);
}

pub fn update_circuit_breaker_state(is_open: bool) {
    metrics::gauge!("substitution_breaker_open").set(if is_open { 1.0 } else { 0.0 });
}
