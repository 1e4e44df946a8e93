use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::Conclusion;

use super::pagination::Listing;

/// Repository as returned by `GET /orgs/{org}/repos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// Short repository name
    pub name: String,
    /// Owning account
    #[serde(default)]
    pub owner: Option<Owner>,
    /// Archived repositories keep their billable history
    #[serde(default)]
    pub archived: bool,
}

impl Repository {
    /// Login of the owning account, falling back to the organization being scanned.
    pub fn owner_login<'a>(&'a self, org: &'a str) -> &'a str {
        self.owner.as_ref().map_or(org, |owner| owner.login.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// GitHub Actions workflow run, reduced to the fields the collector records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Unique identifier for the workflow run
    pub id: u64,
    /// Name of the workflow
    #[serde(default)]
    pub name: Option<String>,
    /// Status of the run (queued, in_progress, completed)
    #[serde(default)]
    pub status: Option<String>,
    /// Conclusion of the run, absent while the run is still going
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    /// When the run was created
    pub created_at: DateTime<Utc>,
    /// Web page of the run
    #[serde(default)]
    pub html_url: String,
}

/// Envelope of `GET /repos/{owner}/{repo}/actions/runs`.
#[derive(Debug, Deserialize)]
pub struct WorkflowRunsPage {
    pub workflow_runs: Vec<WorkflowRun>,
}

impl Listing for WorkflowRunsPage {
    type Item = WorkflowRun;

    fn into_items(self) -> Vec<WorkflowRun> {
        self.workflow_runs
    }
}

/// Body of `GET /repos/{owner}/{repo}/actions/runs/{id}/timing`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunTiming {
    /// Billable time keyed by execution environment (`UBUNTU`, `MACOS`, `WINDOWS`, ...)
    #[serde(default)]
    pub billable: Option<BTreeMap<String, BillableEntry>>,
    /// Wall-clock duration of the run
    #[serde(default)]
    pub run_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillableEntry {
    #[serde(default)]
    pub total_ms: u64,
}
