use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

use stockpit_core::config::ResolverConfig;
use stockpit_core::memory::{RuleSubstitutions, SubstitutionRule};
use stockpit_core::model::{IngredientRequirement, IngredientStatus, InventorySnapshot, SwapType};
use stockpit_core::resolver::{names_match, IngredientResolver, Resolution, SubstitutionStrategy};

mod test_helpers;
use test_helpers::StalledSubstitutions;

fn rule(ingredient: &str, substitute: &str, confidence: f64) -> SubstitutionRule {
    SubstitutionRule {
        ingredient: ingredient.to_string(),
        substitute: substitute.to_string(),
        swap_type: SwapType::Alternative,
        confidence,
        notes: None,
    }
}

fn recipe(names: &[&str]) -> Vec<IngredientRequirement> {
    names.iter().map(|name| IngredientRequirement::named(*name)).collect()
}

fn statuses(resolution: &Resolution) -> Vec<(&str, IngredientStatus)> {
    resolution
        .resolved
        .iter()
        .map(|r| (r.requirement.name.as_str(), r.status))
        .collect()
}

/// Scenario C: substring matches are available, the unmatched herb is missing
#[tokio::test]
async fn test_salad_recipe_against_inventory() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(Vec::new()));
    let resolver = IngredientResolver::new(service.clone(), ResolverConfig::default());
    let inventory = InventorySnapshot::from_names(["cherry tomaatjes", "extra vergine olijfolie"]);

    let resolution = resolver
        .resolve(&recipe(&["tomaat", "basilicum", "olijfolie"]), &inventory)
        .await;

    assert_eq!(
        statuses(&resolution),
        vec![
            ("tomaat", IngredientStatus::Available),
            ("basilicum", IngredientStatus::Missing),
            ("olijfolie", IngredientStatus::Available),
        ]
    );
    assert!(resolution.swaps.is_empty());
    // Only basilicum needed the service, once per inventory entry
    assert_eq!(service.call_count(), 2);

    let summary = resolution.summary();
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.on_hand(), 2);
    assert_eq!(
        resolution.missing().map(|r| r.requirement.name.as_str()).collect::<Vec<_>>(),
        vec!["basilicum"]
    );
    Ok(())
}

#[tokio::test]
async fn test_resolution_is_deterministic() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(vec![
        rule("boter", "margarine", 0.8),
        rule("suiker", "honing", 0.7),
    ]));
    service.fail_for_candidate("appel");
    service.fail_for_candidate("kokosolie");
    let resolver = IngredientResolver::new(service.clone(), ResolverConfig::default());
    let inventory =
        InventorySnapshot::from_names(["appel", "kokosolie", "margarine", "bloem", "honing"]);
    let requirements = recipe(&["boter", "bloem", "suiker", "ei"]);

    let first = resolver.resolve(&requirements, &inventory).await;
    let second = resolver.resolve(&requirements, &inventory).await;

    assert_eq!(first.resolved, second.resolved);
    assert_eq!(first.swaps, second.swaps);
    assert_eq!(
        statuses(&second),
        vec![
            ("boter", IngredientStatus::Substituted),
            ("bloem", IngredientStatus::Available),
            ("suiker", IngredientStatus::Substituted),
            ("ei", IngredientStatus::Missing),
        ]
    );
    // Failed pairs are asked again on the second pass, successful ones are cached
    let failed_pairs = service
        .calls()
        .iter()
        .filter(|(_, candidate)| candidate == "appel" || candidate == "kokosolie")
        .count();
    assert_eq!(failed_pairs, 12);
    Ok(())
}

/// Any inventory name containing, or contained in, the requirement counts as on hand
#[tokio::test]
async fn test_direct_match_never_asks_the_service() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(Vec::new()));
    let resolver = IngredientResolver::new(service.clone(), ResolverConfig::default());

    let cases = [
        ("tomaat", "Cherry tomaatjes"),
        ("verse koriander", "koriander"),
        ("  Ui ", "rode ui"),
        ("melk", "MELK"),
    ];
    for (requirement, inventory_name) in cases {
        assert!(names_match(requirement, inventory_name));
        let inventory = InventorySnapshot::from_names([inventory_name]);
        let resolution = resolver.resolve(&recipe(&[requirement]), &inventory).await;
        assert_eq!(resolution.resolved[0].status, IngredientStatus::Available);
    }
    assert_eq!(service.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_accepted_swap_and_rejection() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(vec![SubstitutionRule {
        notes: Some("iets minder smaak".to_string()),
        ..rule("boter", "margarine", 0.8)
    }]));
    let resolver = IngredientResolver::new(service, ResolverConfig::default());
    let inventory = InventorySnapshot::from_names(["margarine", "bloem"]);

    let mut resolution = resolver.resolve(&recipe(&["boter", "bloem"]), &inventory).await;

    assert_eq!(resolution.resolved[0].status, IngredientStatus::Substituted);
    assert_eq!(resolution.display_names(), vec!["margarine", "bloem"]);
    let swap = &resolution.swaps[0];
    assert_eq!(swap.original, "boter");
    assert_eq!(swap.substitute, "margarine");
    assert_eq!(swap.confidence, 0.8);
    assert_eq!(swap.notes.as_deref(), Some("iets minder smaak"));
    assert!(resolution.accept_swap("Boter"));

    assert!(resolution.reject_swap("boter", &inventory));
    assert!(resolution.swaps.is_empty());
    assert_eq!(resolution.resolved[0].status, IngredientStatus::Missing);
    assert_eq!(resolution.display_names(), vec!["boter", "bloem"]);
    assert!(!resolution.reject_swap("boter", &inventory));
    Ok(())
}

/// A rejected swap is re-checked against the inventory passed in
#[tokio::test]
async fn test_rejected_swap_rechecks_direct_match() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(vec![rule("boter", "margarine", 0.8)]));
    let resolver = IngredientResolver::new(service, ResolverConfig::default());

    let mut resolution = resolver
        .resolve(&recipe(&["boter"]), &InventorySnapshot::from_names(["margarine"]))
        .await;
    let restocked = InventorySnapshot::from_names(["margarine", "roomboter"]);

    assert!(resolution.reject_swap("boter", &restocked));
    assert_eq!(resolution.resolved[0].status, IngredientStatus::Available);
    Ok(())
}

#[tokio::test]
async fn test_threshold_is_strict() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(vec![
        rule("boter", "margarine", 0.5),
        rule("room", "melk", 0.51),
    ]));
    let resolver = IngredientResolver::new(service, ResolverConfig::default());
    let inventory = InventorySnapshot::from_names(["margarine", "volle melk"]);

    let resolution = resolver.resolve(&recipe(&["boter", "slagroom"]), &inventory).await;

    assert_eq!(
        statuses(&resolution),
        vec![
            ("boter", IngredientStatus::Missing),
            ("slagroom", IngredientStatus::Substituted),
        ]
    );
    Ok(())
}

/// One failing lookup moves on to the next inventory entry
#[tokio::test]
async fn test_failed_lookup_continues_with_next_candidate() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(vec![
        rule("boter", "kokosolie", 0.9),
        rule("boter", "margarine", 0.8),
    ]));
    service.fail_for_candidate("kokosolie");
    let resolver = IngredientResolver::new(service.clone(), ResolverConfig::default());
    let inventory = InventorySnapshot::from_names(["kokosolie", "margarine"]);

    let resolution = resolver.resolve(&recipe(&["boter"]), &inventory).await;

    assert_eq!(resolution.resolved[0].status, IngredientStatus::Substituted);
    assert_eq!(resolution.swaps[0].substitute, "margarine");
    assert_eq!(service.call_count(), 2);
    Ok(())
}

/// Per-pair failures never stop the loop, however many there are
#[tokio::test]
async fn test_failing_candidates_beyond_breaker_threshold() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(vec![rule("boter", "margarine", 0.9)]));
    let failing = ["a1", "a2", "a3", "a4", "a5", "a6"];
    for candidate in failing {
        service.fail_for_candidate(candidate);
    }
    let config = ResolverConfig::default();
    assert!(failing.len() as u32 > config.breaker_threshold);
    let resolver = IngredientResolver::new(service.clone(), config);
    let inventory = InventorySnapshot::from_names(
        failing.iter().copied().chain(["margarine"]),
    );

    let resolution = resolver.resolve(&recipe(&["boter"]), &inventory).await;

    assert_eq!(resolution.resolved[0].status, IngredientStatus::Substituted);
    assert_eq!(resolution.swaps[0].substitute, "margarine");
    assert_eq!(service.call_count(), 7);
    Ok(())
}

#[tokio::test]
async fn test_service_down_shows_unmatched_as_missing() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(vec![rule("boter", "margarine", 0.8)]));
    service.set_failing(true);
    let resolver = IngredientResolver::new(service, ResolverConfig::default());
    let inventory = InventorySnapshot::from_names(["tomaatjes", "margarine"]);

    let resolution = resolver.resolve(&recipe(&["tomaat", "boter", "ei"]), &inventory).await;

    assert_eq!(
        statuses(&resolution),
        vec![
            ("tomaat", IngredientStatus::Available),
            ("boter", IngredientStatus::Missing),
            ("ei", IngredientStatus::Missing),
        ]
    );
    assert!(resolution.swaps.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_first_match_versus_best_confidence() -> Result<()> {
    let rules = vec![rule("boter", "margarine", 0.7), rule("boter", "kokosolie", 0.9)];
    let inventory = InventorySnapshot::from_names(["margarine", "kokosolie"]);
    let requirements = recipe(&["boter"]);

    let first_match = IngredientResolver::new(
        Arc::new(RuleSubstitutions::new(rules.clone())),
        ResolverConfig::default(),
    )
    .resolve(&requirements, &inventory)
    .await;
    assert_eq!(first_match.swaps[0].substitute, "margarine");

    let best = IngredientResolver::new(
        Arc::new(RuleSubstitutions::new(rules)),
        ResolverConfig {
            strategy: SubstitutionStrategy::BestConfidence,
            ..Default::default()
        },
    )
    .resolve(&requirements, &inventory)
    .await;
    assert_eq!(best.swaps[0].substitute, "kokosolie");
    assert_eq!(best.swaps[0].confidence, 0.9);
    Ok(())
}

/// Lookups follow inventory order and stop at the first accepted verdict
#[tokio::test]
async fn test_lookups_follow_inventory_order() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(vec![rule("boter", "margarine", 0.8)]));
    let resolver = IngredientResolver::new(service.clone(), ResolverConfig::default());
    let inventory = InventorySnapshot::from_names(["appel", "margarine", "peer"]);

    resolver.resolve(&recipe(&["boter"]), &inventory).await;

    assert_eq!(
        service.calls(),
        vec![
            ("boter".to_string(), "appel".to_string()),
            ("boter".to_string(), "margarine".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_cached_verdicts_skip_repeat_lookups() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(vec![rule("boter", "margarine", 0.8)]));
    let resolver = IngredientResolver::new(service.clone(), ResolverConfig::default());
    let inventory = InventorySnapshot::from_names(["appel", "margarine"]);
    let requirements = recipe(&["boter"]);

    let first = resolver.resolve(&requirements, &inventory).await;
    let calls = service.call_count();
    let second = resolver.resolve(&requirements, &inventory).await;

    assert_eq!(calls, 2);
    assert_eq!(service.call_count(), calls);
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_stalled_service_times_out_to_missing() -> Result<()> {
    let service = Arc::new(StalledSubstitutions::new(Duration::from_millis(500)));
    let config = ResolverConfig {
        remote_timeout_ms: 20,
        ..Default::default()
    };
    let resolver = IngredientResolver::new(service.clone(), config);
    let inventory = InventorySnapshot::from_names(["margarine", "kokosolie"]);

    let start = Instant::now();
    let resolution = resolver.resolve(&recipe(&["boter"]), &inventory).await;

    assert_eq!(resolution.resolved[0].status, IngredientStatus::Missing);
    assert_eq!(service.calls(), 2);
    assert!(start.elapsed() < Duration::from_millis(400));
    Ok(())
}

#[tokio::test]
async fn test_empty_inventory_everything_missing() -> Result<()> {
    let service = Arc::new(RuleSubstitutions::new(vec![rule("boter", "margarine", 0.8)]));
    let resolver = IngredientResolver::new(service.clone(), ResolverConfig::default());

    let resolution = resolver
        .resolve(&recipe(&["boter", "bloem"]), &InventorySnapshot::default())
        .await;

    assert_eq!(resolution.summary().missing, 2);
    assert_eq!(service.call_count(), 0);
    Ok(())
}
