use std::collections::BTreeMap;
use std::ops::AddAssign;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::records::{round2, RunRecord};

/// Billable minutes per calendar day.
pub type DailyUsage = BTreeMap<NaiveDate, f64>;

/// Raw billable milliseconds per calendar day and execution environment.
pub type OsUsage = BTreeMap<NaiveDate, BTreeMap<String, u64>>;

/// Entry of `daily_trend.json` as the dashboard reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsageEntry {
    pub date: NaiveDate,
    #[serde(rename = "totalMinutes")]
    pub total_minutes: f64,
}

/// Running totals keyed by bucket.
///
/// Keys are created at zero on first use and never evicted.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageTotals<K: Ord, V> {
    totals: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for UsageTotals<K, V> {
    fn default() -> Self {
        Self {
            totals: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V: Copy + Default + AddAssign> UsageTotals<K, V> {
    pub fn add(&mut self, key: K, amount: V) {
        *self.totals.entry(key).or_default() += amount;
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.totals.iter()
    }

    pub fn into_inner(self) -> BTreeMap<K, V> {
        self.totals
    }
}

/// Minutes per day over `records`, each run contributing its rounded minutes.
pub fn daily_totals<'a>(records: impl IntoIterator<Item = &'a RunRecord>) -> DailyUsage {
    let mut totals = UsageTotals::default();
    for record in records {
        totals.add(record.created_date(), record.total_time_minutes);
    }
    totals
        .into_inner()
        .into_iter()
        .map(|(date, minutes)| (date, round2(minutes)))
        .collect()
}

/// Raw milliseconds per day and billing label over `records`.
pub fn os_totals<'a>(records: impl IntoIterator<Item = &'a RunRecord>) -> OsUsage {
    let mut per_day: BTreeMap<NaiveDate, UsageTotals<String, u64>> = BTreeMap::new();
    for record in records {
        let day = per_day.entry(record.created_date()).or_default();
        for (label, ms) in &record.billable_ms_by_os {
            day.add(label.clone(), *ms);
        }
    }
    per_day
        .into_iter()
        .filter(|(_, labels)| !labels.is_empty())
        .map(|(date, labels)| (date, labels.into_inner()))
        .collect()
}

/// Replace each day in `persisted` that `computed` covers; other days are kept.
///
/// Overwriting rather than adding keeps a day's total stable when the same
/// window is collected twice.
pub fn overwrite_days<V: Clone>(
    persisted: &mut BTreeMap<NaiveDate, V>,
    computed: &BTreeMap<NaiveDate, V>,
) {
    for (date, value) in computed {
        persisted.insert(*date, value.clone());
    }
}

pub fn trend_entries(usage: &DailyUsage) -> Vec<DailyUsageEntry> {
    usage
        .iter()
        .map(|(date, minutes)| DailyUsageEntry {
            date: *date,
            total_minutes: *minutes,
        })
        .collect()
}
