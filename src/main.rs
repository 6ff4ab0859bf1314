use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::json;
use std::env;
use std::sync::Arc;
use stockpit_core::config::AppConfig;
use stockpit_core::errors::error_logging;
use stockpit_core::expiry::{days_until, sort_by_urgency, urgency_bucket, urgency_summary};
use stockpit_core::ingredients::{display_line, normalize_ingredients};
use stockpit_core::memory::Fixture;
use stockpit_core::observability;
use stockpit_core::resolver::IngredientResolver;
use stockpit_core::services::InventoryStore;
use tracing::{debug, info};

/// Fixture path from the first argument, falling back to STOCKPIT_FIXTURE
fn fixture_path() -> Result<String> {
    env::args()
        .nth(1)
        .or_else(|| env::var("STOCKPIT_FIXTURE").ok())
        .filter(|path| !path.trim().is_empty())
        .ok_or_else(|| {
            anyhow!("No fixture given. Usage: stockpit-core <fixture.json>, or set STOCKPIT_FIXTURE.")
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    if let Err(e) = config.validate() {
        error_logging::log_config_error(&e, "app_config", "startup_validation");
        return Err(e.into());
    }

    let metrics_handle = observability::init_observability_with_config(&config.observability)?;
    info!("{}", config.summary());

    let path = fixture_path()?;
    let fixture = Fixture::from_path(&path)?;
    let recipe = fixture
        .recipe
        .clone()
        .ok_or_else(|| anyhow!("Fixture {} has no recipe to resolve", path))?;
    info!(fixture = %path, recipe = %recipe.title, "Fixture loaded");

    let requirements = normalize_ingredients(&recipe.ingredients);
    let store = fixture.inventory_store();
    let snapshot = store.list("local").await?;

    let resolver = IngredientResolver::new(Arc::new(fixture.substitutions()), config.resolver.clone());
    let resolution = resolver.resolve(&requirements, &snapshot).await;

    let now = Utc::now();
    let mut entries = snapshot.entries().to_vec();
    sort_by_urgency(&mut entries, now);

    let ingredients: Vec<_> = resolution
        .resolved
        .iter()
        .map(|ingredient| {
            json!({
                "line": display_line(&ingredient.requirement),
                "display_name": ingredient.display_name(),
                "status": ingredient.status,
                "swap": ingredient.swap,
            })
        })
        .collect();
    let inventory: Vec<_> = entries
        .iter()
        .map(|entry| {
            let days = days_until(entry.expires_at, now);
            json!({
                "name": entry.name,
                "days_until_expiry": days,
                "urgency": urgency_bucket(days).label(),
            })
        })
        .collect();

    let report = json!({
        "recipe": recipe.title,
        "ingredients": ingredients,
        "swaps": resolution.swaps,
        "summary": resolution.summary(),
        "inventory": inventory,
        "urgency": urgency_summary(&entries, now),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(handle) = metrics_handle {
        debug!(metrics = %handle.render(), "Metrics snapshot");
    }

    Ok(())
}
