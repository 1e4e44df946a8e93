use std::collections::BTreeSet;

use chrono::{DateTime, NaiveTime, Utc};

use crate::records::RunRecord;

/// Incremental collection state carried between invocations.
///
/// `processed` only ever grows, and `watermark` never moves backwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    processed: BTreeSet<u64>,
    watermark: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn new(processed: BTreeSet<u64>, watermark: Option<DateTime<Utc>>) -> Self {
        Self {
            processed,
            watermark,
        }
    }

    /// Lower bound of the next collection window.
    ///
    /// Falls back to the start of `now`'s UTC day when nothing was collected yet.
    pub fn threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.watermark
            .unwrap_or_else(|| now.date_naive().and_time(NaiveTime::MIN).and_utc())
    }

    pub fn is_processed(&self, run_id: u64) -> bool {
        self.processed.contains(&run_id)
    }

    pub fn mark_processed(&mut self, run_id: u64) -> bool {
        self.processed.insert(run_id)
    }

    pub fn processed(&self) -> &BTreeSet<u64> {
        &self.processed
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    /// Move the watermark up to the newest run in `records`.
    pub fn advance<'a>(&mut self, records: impl IntoIterator<Item = &'a RunRecord>) {
        let newest = records.into_iter().map(|record| record.created_at).max();
        self.watermark = match (self.watermark, newest) {
            (Some(current), Some(newest)) => Some(current.max(newest)),
            (current, newest) => current.or(newest),
        };
    }
}
