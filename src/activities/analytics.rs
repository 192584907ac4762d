//! Derived statistics over the mirrored activity lists.
//!
//! Everything here is a pure function of the lists and an explicit `now_ms`,
//! so the mirror can recompute after each snapshot and tests can pin time.

use std::collections::BTreeMap;

use serde::Serialize;
use time::{macros::format_description, OffsetDateTime};

use super::format::time_ago;
use super::repo_types::{Diaper, Feeding, Health, Sleep};
use crate::clock::MILLIS_PER_DAY;

pub const UNKNOWN: &str = "UNKNOWN";

pub const FEEDING_WELL: &str = "Your baby is feeding well! Keep up the routine.";
pub const SLEEPING_WELL: &str = "Great sleep pattern! Consistency helps.";
pub const DIAPERS_REGULAR: &str = "Diaper changes are regular. Monitor for any changes.";
pub const FEVER_WATCH: &str = "Monitor baby's temperature and consult a doctor if needed.";
pub const LOG_MORE: &str = "Log more activities for personalized insights!";

const BUSY_THRESHOLD: usize = 5;
const NO_DATA: &str = "NO DATA";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiaperSummary {
    pub frequency_24h: usize,
    pub color_stats: BTreeMap<String, usize>,
    pub consistency_stats: BTreeMap<String, usize>,
}

/// Diapers strictly newer than `now - 24h`, with color and consistency
/// histograms (absent values count as `UNKNOWN`).
pub fn diaper_summary(diapers: &[Diaper], now_ms: i64) -> DiaperSummary {
    let since = now_ms - MILLIS_PER_DAY;
    let mut out = DiaperSummary::default();
    for d in diapers.iter().filter(|d| d.timestamp > since) {
        out.frequency_24h += 1;
        let color = d.color.clone().unwrap_or_else(|| UNKNOWN.to_string());
        *out.color_stats.entry(color).or_default() += 1;
        let consistency = d.consistency.clone().unwrap_or_else(|| UNKNOWN.to_string());
        *out.consistency_stats.entry(consistency).or_default() += 1;
    }
    out
}

/// Advisory messages in fixed order; never empty.
pub fn suggestions(
    feedings: &[Feeding],
    sleeps: &[Sleep],
    diapers: &[Diaper],
    health: &[Health],
) -> Vec<String> {
    let mut out = Vec::new();
    if feedings.len() > BUSY_THRESHOLD {
        out.push(FEEDING_WELL.to_string());
    }
    if sleeps.len() > BUSY_THRESHOLD {
        out.push(SLEEPING_WELL.to_string());
    }
    if diapers.len() > BUSY_THRESHOLD {
        out.push(DIAPERS_REGULAR.to_string());
    }
    if health.iter().any(mentions_fever) {
        out.push(FEVER_WATCH.to_string());
    }
    if out.is_empty() {
        out.push(LOG_MORE.to_string());
    }
    out
}

fn mentions_fever(h: &Health) -> bool {
    h.notes
        .as_deref()
        .map(|n| n.to_lowercase().contains("fever"))
        .unwrap_or(false)
}

/// State recomputed after every mirror update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub diapers: DiaperSummary,
    pub suggestions: Vec<String>,
}

impl Default for Insights {
    fn default() -> Self {
        Self {
            diapers: DiaperSummary::default(),
            suggestions: vec![LOG_MORE.to_string()],
        }
    }
}

pub fn insights(
    feedings: &[Feeding],
    sleeps: &[Sleep],
    diapers: &[Diaper],
    health: &[Health],
    now_ms: i64,
) -> Insights {
    Insights {
        diapers: diaper_summary(diapers, now_ms),
        suggestions: suggestions(feedings, sleeps, diapers, health),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBucket {
    pub start_ms: i64,
    pub label: String,
    pub feedings: usize,
    pub sleeps: usize,
    pub diapers: usize,
    pub health: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySeries {
    pub days: Vec<DayBucket>,
    /// Tallest bar across all series, at least 1.
    pub max_count: usize,
}

/// Per-day counts from the earliest record through `now_ms`.
///
/// Buckets are day-length windows anchored at the earliest timestamp (not at
/// midnight); membership is `[start, start + 1 day)`. A sleep is placed by its
/// end time and ignored while it has none.
pub fn daily_series(
    feedings: &[Feeding],
    sleeps: &[Sleep],
    diapers: &[Diaper],
    health: &[Health],
    now_ms: i64,
) -> DailySeries {
    // times before the epoch are never written; skip any that slipped in
    let valid = |t: &i64| *t >= 0;
    let feeding_ts: Vec<i64> = feedings.iter().map(|f| f.timestamp).filter(valid).collect();
    let sleep_ts: Vec<i64> = sleeps.iter().filter_map(|s| s.end_time).filter(valid).collect();
    let diaper_ts: Vec<i64> = diapers.iter().map(|d| d.timestamp).filter(valid).collect();
    let health_ts: Vec<i64> = health.iter().map(|h| h.timestamp).filter(valid).collect();

    let min_ts = feeding_ts
        .iter()
        .chain(&sleep_ts)
        .chain(&diaper_ts)
        .chain(&health_ts)
        .copied()
        .min()
        .unwrap_or(now_ms);

    let day_count = (now_ms.saturating_sub(min_ts) / MILLIS_PER_DAY + 1).max(0);
    let count_in = |ts: &[i64], start: i64| {
        let end = start.saturating_add(MILLIS_PER_DAY);
        ts.iter().filter(|&&t| t >= start && t < end).count()
    };

    let days: Vec<DayBucket> = (0..day_count)
        .map(|i| {
            let start = min_ts + i * MILLIS_PER_DAY;
            DayBucket {
                start_ms: start,
                label: day_label(start),
                feedings: count_in(&feeding_ts, start),
                sleeps: count_in(&sleep_ts, start),
                diapers: count_in(&diaper_ts, start),
                health: count_in(&health_ts, start),
            }
        })
        .collect();

    let max_count = days
        .iter()
        .flat_map(|d| [d.feedings, d.sleeps, d.diapers, d.health])
        .max()
        .unwrap_or(0)
        .max(1);

    DailySeries { days, max_count }
}

fn day_label(ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .ok()
        .and_then(|dt| dt.format(format_description!("[month repr:short] [day padding:none]")).ok())
        .unwrap_or_default()
}

/// Home screen tiles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeSummary {
    pub last_feed: String,
    pub last_sleep: String,
    pub last_diaper: String,
    pub last_check: String,
}

pub fn home_summary(
    latest_feeding: Option<&Feeding>,
    latest_sleep: Option<&Sleep>,
    latest_diaper: Option<&Diaper>,
    latest_health: Option<&Health>,
    now_ms: i64,
) -> HomeSummary {
    HomeSummary {
        last_feed: match latest_feeding {
            Some(_) => "The baby has been fed".to_string(),
            None => NO_DATA.to_string(),
        },
        last_sleep: latest_sleep
            .map(|s| time_ago(s.start_time, now_ms))
            .unwrap_or_else(|| NO_DATA.to_string()),
        last_diaper: latest_diaper
            .map(|d| time_ago(d.timestamp, now_ms))
            .unwrap_or_else(|| NO_DATA.to_string()),
        last_check: latest_health
            .map(|h| time_ago(h.timestamp, now_ms))
            .unwrap_or_else(|| NO_DATA.to_string()),
    }
}
