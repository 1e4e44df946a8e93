use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Final outcome of a workflow run as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    Stale,
    StartupFailure,
    #[serde(other)]
    Unknown,
}

impl Conclusion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::TimedOut => "timed_out",
            Self::ActionRequired => "action_required",
            Self::Neutral => "neutral",
            Self::Stale => "stale",
            Self::StartupFailure => "startup_failure",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One workflow run with its billable time, as written to `workflow_runs.json`.
///
/// Field names follow what the dashboard reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub repo: String,
    pub workflow_name: String,
    pub run_id: u64,
    pub status: Option<Conclusion>,
    pub created_at: DateTime<Utc>,
    pub html_url: String,
    #[serde(default)]
    pub total_time_minutes: f64,
    /// Raw billable milliseconds per execution environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub billable_ms_by_os: BTreeMap<String, u64>,
}

impl RunRecord {
    /// Calendar day (UTC) the run was created on.
    pub fn created_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn is_failure(&self) -> bool {
        self.status == Some(Conclusion::Failure)
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert billable milliseconds to minutes, rounded to two decimals.
#[allow(clippy::cast_precision_loss)]
pub fn ms_to_minutes(ms: u64) -> f64 {
    round2(ms as f64 / 60_000.0)
}
