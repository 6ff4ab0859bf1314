use chrono::{DateTime, Duration, TimeZone, Utc};

use stockpit_core::expiry::{
    count_expiring_soon, days_until, sort_by_urgency, urgency_bucket, urgency_summary,
    usable_percentage, UrgencyBucket, NO_EXPIRY_DAYS,
};
use stockpit_core::model::InventoryEntry;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
}

fn expiring_in(name: &str, offset: Duration) -> InventoryEntry {
    InventoryEntry {
        expires_at: Some(now() + offset),
        ..InventoryEntry::new(name)
    }
}

#[test]
fn test_bucket_boundaries() {
    let cases = [
        (-2, UrgencyBucket::Critical),
        (0, UrgencyBucket::Critical),
        (3, UrgencyBucket::Critical),
        (4, UrgencyBucket::Soon),
        (7, UrgencyBucket::Soon),
        (8, UrgencyBucket::ThisMonth),
        (30, UrgencyBucket::ThisMonth),
        (31, UrgencyBucket::Fresh),
        (365, UrgencyBucket::Fresh),
    ];
    for (days, bucket) in cases {
        assert_eq!(urgency_bucket(days), bucket, "days = {}", days);
    }
}

#[test]
fn test_bucket_labels() {
    assert_eq!(UrgencyBucket::Critical.label(), "critical");
    assert_eq!(UrgencyBucket::Soon.label(), "soon");
    assert_eq!(UrgencyBucket::ThisMonth.label(), "this month");
    assert_eq!(UrgencyBucket::Fresh.label(), "fresh");
}

/// Items without a date count as a month out
#[test]
fn test_missing_expiry_is_low_urgency() {
    assert_eq!(days_until(None, now()), NO_EXPIRY_DAYS);
    assert_eq!(urgency_bucket(days_until(None, now())), UrgencyBucket::ThisMonth);
}

#[test]
fn test_countdown_rounds_partial_days_up() {
    assert_eq!(days_until(Some(now() + Duration::hours(1)), now()), 1);
    assert_eq!(days_until(Some(now() + Duration::hours(72)), now()), 3);
    assert_eq!(days_until(Some(now() + Duration::hours(73)), now()), 4);
    assert_eq!(days_until(Some(now() - Duration::hours(1)), now()), 0);
    assert_eq!(days_until(Some(now() - Duration::hours(25)), now()), -1);
}

#[test]
fn test_expired_items_sort_first() {
    let mut entries = vec![
        InventoryEntry::new("rijst"),
        expiring_in("yoghurt", Duration::days(5)),
        expiring_in("gehakt", Duration::days(-2)),
        expiring_in("kaas", Duration::days(45)),
        expiring_in("sla", Duration::days(1)),
    ];

    sort_by_urgency(&mut entries, now());

    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["gehakt", "sla", "yoghurt", "rijst", "kaas"]);
}

#[test]
fn test_summary_counts_and_usable_share() {
    let entries = vec![
        expiring_in("gehakt", Duration::days(-1)),
        expiring_in("sla", Duration::days(3)),
        expiring_in("yoghurt", Duration::days(6)),
        InventoryEntry::new("rijst"),
        expiring_in("pasta", Duration::days(200)),
    ];

    assert_eq!(count_expiring_soon(&entries, now()), 2);
    assert_eq!(usable_percentage(&entries, now()), 60);

    let summary = urgency_summary(&entries, now());
    assert_eq!(summary.critical, 2);
    assert_eq!(summary.soon, 1);
    assert_eq!(summary.this_month, 1);
    assert_eq!(summary.fresh, 1);
    assert_eq!(summary.usable_percentage, 60);
}

#[test]
fn test_empty_inventory_summary() {
    let summary = urgency_summary(&[], now());
    assert_eq!(summary.critical + summary.soon + summary.this_month + summary.fresh, 0);
    assert_eq!(summary.usable_percentage, 0);
}
