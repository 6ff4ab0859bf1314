//! # Expiry Scheduler
//!
//! Countdown and urgency buckets derived from stored expiry timestamps. Every
//! function here is total and takes the current time as an argument, so the
//! same input always gives the same answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::InventoryEntry;

/// Days reported for an item without an expiry date
pub const NO_EXPIRY_DAYS: i64 = 30;

/// Items at or below this many days count as expiring soon
pub const EXPIRING_SOON_DAYS: i64 = 3;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Whole days until `expires_at`, rounded up.
///
/// Returns [`NO_EXPIRY_DAYS`] when no date is set, so unscheduled items rank
/// as low urgency. Past dates give zero or negative values.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use stockpit_core::expiry::days_until;
///
/// let now = Utc::now();
/// assert_eq!(days_until(None, now), 30);
/// assert_eq!(days_until(Some(now + Duration::hours(30)), now), 2);
/// assert_eq!(days_until(Some(now - Duration::hours(30)), now), -1);
/// ```
pub fn days_until(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match expires_at {
        None => NO_EXPIRY_DAYS,
        Some(expires_at) => {
            let millis = (expires_at - now).num_milliseconds() as f64;
            (millis / MILLIS_PER_DAY).ceil() as i64
        }
    }
}

/// [`days_until`] against the current clock
pub fn days_until_now(expires_at: Option<DateTime<Utc>>) -> i64 {
    days_until(expires_at, Utc::now())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyBucket {
    Critical,
    Soon,
    ThisMonth,
    Fresh,
}

impl UrgencyBucket {
    pub fn label(self) -> &'static str {
        match self {
            UrgencyBucket::Critical => "critical",
            UrgencyBucket::Soon => "soon",
            UrgencyBucket::ThisMonth => "this month",
            UrgencyBucket::Fresh => "fresh",
        }
    }
}

/// `<= 3` critical, `<= 7` soon, `<= 30` this month, otherwise fresh
pub fn urgency_bucket(days: i64) -> UrgencyBucket {
    match days {
        d if d <= EXPIRING_SOON_DAYS => UrgencyBucket::Critical,
        d if d <= 7 => UrgencyBucket::Soon,
        d if d <= NO_EXPIRY_DAYS => UrgencyBucket::ThisMonth,
        _ => UrgencyBucket::Fresh,
    }
}

/// Order entries soonest-expiring first. Entries with equal countdowns keep their order.
pub fn sort_by_urgency(entries: &mut [InventoryEntry], now: DateTime<Utc>) {
    entries.sort_by_key(|entry| days_until(entry.expires_at, now));
}

pub fn count_expiring_soon(entries: &[InventoryEntry], now: DateTime<Utc>) -> usize {
    entries
        .iter()
        .filter(|entry| days_until(entry.expires_at, now) <= EXPIRING_SOON_DAYS)
        .count()
}

/// Rounded share of entries not expiring soon, 0 for an empty inventory
pub fn usable_percentage(entries: &[InventoryEntry], now: DateTime<Utc>) -> u8 {
    if entries.is_empty() {
        return 0;
    }
    let usable = entries.len() - count_expiring_soon(entries, now);
    ((usable as f64 / entries.len() as f64) * 100.0).round() as u8
}

/// Per-bucket counts for an inventory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencySummary {
    pub critical: usize,
    pub soon: usize,
    pub this_month: usize,
    pub fresh: usize,
    pub usable_percentage: u8,
}

pub fn urgency_summary(entries: &[InventoryEntry], now: DateTime<Utc>) -> UrgencySummary {
    let mut summary = entries
        .iter()
        .fold(UrgencySummary::default(), |mut summary, entry| {
            match urgency_bucket(days_until(entry.expires_at, now)) {
                UrgencyBucket::Critical => summary.critical += 1,
                UrgencyBucket::Soon => summary.soon += 1,
                UrgencyBucket::ThisMonth => summary.this_month += 1,
                UrgencyBucket::Fresh => summary.fresh += 1,
            }
            summary
        });
    summary.usable_percentage = usable_percentage(entries, now);
    summary
}
