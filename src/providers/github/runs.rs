use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use crate::records::{ms_to_minutes, RunRecord};

use super::client::GitHubClient;
use super::types::{Repository, RunTiming, WorkflowRun, WorkflowRunsPage};

/// Runs gathered from one repository.
///
/// Each repository task owns its collection; collections are merged once
/// every task has finished.
#[derive(Debug, Default)]
pub struct RepoCollection {
    pub repository: String,
    pub runs: Vec<RunRecord>,
    /// Runs skipped because they were already processed
    pub skipped: usize,
    /// Whether the run listing was fetched; false means runs may be missing
    pub listed: bool,
}

impl GitHubClient {
    /// Workflow runs of `owner/repo` created strictly after `threshold`.
    pub async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<WorkflowRun>> {
        let mut url = self.api_url(&format!("repos/{owner}/{repo}/actions/runs"))?;
        url.query_pairs_mut()
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair(
                "created",
                &format!(">{}", threshold.format("%Y-%m-%dT%H:%M:%SZ")),
            );

        let mut runs = self.walk::<WorkflowRunsPage>(url).await?;
        runs.retain(|run| run.created_at > threshold);

        Ok(runs)
    }

    /// Timing breakdown of a single run. Not paginated.
    pub async fn fetch_run_timing(&self, owner: &str, repo: &str, run_id: u64) -> Result<RunTiming> {
        let url = self.api_url(&format!("repos/{owner}/{repo}/actions/runs/{run_id}/timing"))?;
        Ok(self.fetch::<RunTiming>(&url).await?.data)
    }

    /// Collect new runs of one repository into normalized records.
    ///
    /// Never fails: a listing failure yields an empty collection, and a run
    /// without usable timing is recorded with zero minutes.
    pub async fn collect_repository(
        &self,
        org: &str,
        repository: &Repository,
        threshold: DateTime<Utc>,
        checkpoint: &Checkpoint,
    ) -> RepoCollection {
        let owner = repository.owner_login(org);
        let name = repository.name.as_str();
        let mut collection = RepoCollection {
            repository: name.to_string(),
            ..RepoCollection::default()
        };

        let runs = match self.list_workflow_runs(owner, name, threshold).await {
            Ok(runs) => {
                collection.listed = true;
                runs
            }
            Err(e) => {
                warn!("Skipping {owner}/{name}: could not list workflow runs: {e}");
                return collection;
            }
        };

        for run in runs {
            if checkpoint.is_processed(run.id) {
                collection.skipped += 1;
                continue;
            }

            let timing = match self.fetch_run_timing(owner, name, run.id).await {
                Ok(timing) => Some(timing),
                Err(e) => {
                    warn!("Error fetching timing data for {name}, run ID {}: {e}", run.id);
                    None
                }
            };

            collection.runs.push(build_record(name, run, timing));
        }

        debug!(
            "{name}: {} new runs, {} already processed",
            collection.runs.len(),
            collection.skipped
        );

        collection
    }
}

/// Normalize a run and its timing into a [`RunRecord`].
///
/// Billable time is summed across every execution environment before the
/// conversion to minutes.
pub fn build_record(repo: &str, run: WorkflowRun, timing: Option<RunTiming>) -> RunRecord {
    let timing = timing.unwrap_or_default();

    let billable_ms_by_os: BTreeMap<String, u64> = match timing.billable {
        Some(platforms) => platforms
            .into_iter()
            .map(|(label, entry)| (label, entry.total_ms))
            .collect(),
        None => {
            warn!(
                "No timing data for run ID {} in repo {repo} (status: {}, wall time: {} ms)",
                run.id,
                run.status.as_deref().unwrap_or("unknown"),
                timing
                    .run_duration_ms
                    .map_or_else(|| "unknown".to_string(), |ms| ms.to_string())
            );
            BTreeMap::new()
        }
    };

    let total_ms: u64 = billable_ms_by_os.values().sum();

    RunRecord {
        repo: repo.to_string(),
        workflow_name: run.name.unwrap_or_default(),
        run_id: run.id,
        status: run.conclusion,
        created_at: run.created_at,
        html_url: run.html_url,
        total_time_minutes: ms_to_minutes(total_ms),
        billable_ms_by_os,
    }
}
