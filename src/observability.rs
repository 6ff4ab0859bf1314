//! Observability module for centralized tracing, logging and metrics setup.
//!
//! This module provides:
//! - Structured logging with configurable levels (pretty or JSON)
//! - Prometheus metrics recorder installation
//! - Span helpers for the capture, catalog and resolver components

pub mod metrics;

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::prelude::*;

use crate::observability_config::ObservabilityConfig;

pub use self::metrics::{
    record_barcode_metrics, record_collaborator_failure, record_commit_metrics,
    record_photo_batch_metrics, record_resolution_metrics, record_search_metrics,
    update_circuit_breaker_state,
};

/// Initialize logging and, when enabled, the metrics recorder.
///
/// Returns the Prometheus handle so the caller can render a snapshot.
pub fn init_observability_with_config(
    config: &ObservabilityConfig,
) -> Result<Option<PrometheusHandle>> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(config)?;

    let handle = if config.enable_metrics_export {
        Some(init_metrics_with_config(config)?)
    } else {
        None
    };

    tracing::info!(
        environment = %config.environment,
        metrics_enabled = %handle.is_some(),
        "Observability initialized"
    );
    Ok(handle)
}

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("stockpit_core={}", config.log_level).parse()?);

    // Pretty for development, JSON for everything else
    if config.is_development()
        || std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()) == "pretty"
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Install the Prometheus recorder with the configured global labels
pub fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<PrometheusHandle> {
    let mut builder = PrometheusBuilder::new();
    for (key, value) in &config.tags {
        builder = builder.add_global_label(key.clone(), value.clone());
    }

    let handle = builder
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    self::metrics::describe_metrics();
    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

/// Span wrapping one capture session transition
pub fn capture_span(operation: &str, session_id: u64) -> tracing::Span {
    tracing::info_span!("capture", operation = %operation, session_id = %session_id)
}

/// Span wrapping a catalog search or lookup
pub fn catalog_span(operation: &str) -> tracing::Span {
    tracing::debug_span!("catalog", operation = %operation)
}

/// Span wrapping a full resolver pass
pub fn resolver_span(operation: &str, ingredient_count: usize) -> tracing::Span {
    tracing::info_span!(
        "resolver",
        operation = %operation,
        ingredient_count = %ingredient_count
    )
}
