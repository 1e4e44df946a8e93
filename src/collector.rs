use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use log::{error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use crate::output::PhaseProgress;
use crate::providers::github::{GitHubClient, RepoCollection, Repository};
use crate::storage::DataStore;
use crate::usage;

/// Knobs for a collection pass.
#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
    /// Repositories collected at the same time
    pub concurrency: usize,
    /// Maintain `os_usage.json`
    pub track_os_usage: bool,
    /// Draw progress on stderr
    pub show_progress: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            track_os_usage: true,
            show_progress: false,
        }
    }
}

/// Outcome of one collection pass, for the terminal summary.
#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    pub organization: String,
    pub repositories: usize,
    pub new_runs: usize,
    pub skipped_runs: usize,
    pub new_failures: usize,
    /// Day totals for every day that received new runs
    pub minutes_by_day: BTreeMap<NaiveDate, f64>,
    pub threshold: Option<DateTime<Utc>>,
    pub watermark: Option<DateTime<Utc>>,
    pub remaining_api_calls: Option<u32>,
}

/// Incremental collection pipeline for one organization.
///
/// Enumerates repositories, collects each one's new runs with bounded
/// concurrency, merges the per-repository results, and persists every
/// artifact through the [`DataStore`].
pub struct Collector {
    client: Arc<GitHubClient>,
    org: String,
    options: CollectOptions,
}

impl Collector {
    pub fn new(client: GitHubClient, org: impl Into<String>, options: CollectOptions) -> Self {
        Self {
            client: Arc::new(client),
            org: org.into(),
            options,
        }
    }

    /// Run one collection pass against `store`.
    ///
    /// Returns `Ok(None)` when the organization has no repositories, in which
    /// case nothing is written.
    ///
    /// # Errors
    ///
    /// Fails only when the repository listing cannot be fetched at all.
    pub async fn run(&self, store: &DataStore, now: DateTime<Utc>) -> Result<Option<CollectionReport>> {
        let mut checkpoint = store.load_checkpoint();
        let threshold = checkpoint.threshold(now);
        info!(
            "Collecting workflow runs for {} created after {}",
            self.org,
            threshold.to_rfc3339()
        );

        let progress = PhaseProgress::start_phase_1(self.options.show_progress);

        let repositories = match self.client.list_repositories(&self.org).await {
            Ok(repositories) => repositories,
            Err(e) => {
                progress.abandon("Could not fetch repositories");
                return Err(e);
            }
        };

        if repositories.is_empty() {
            warn!("No repositories found for organization: {}", self.org);
            progress.abandon("No repositories fetched");
            return Ok(None);
        }

        let progress = progress.finish_phase_1_start_phase_2(repositories.len());
        let collections = self
            .collect_all(&repositories, threshold, &checkpoint, &progress)
            .await;

        let progress = progress.finish_phase_2_start_phase_3();
        let mut report = self.merge_and_persist(store, &mut checkpoint, collections);
        report.repositories = repositories.len();
        report.threshold = Some(threshold);
        progress.finish_phase_3();

        let rate_limit = self.client.rate_limit();
        match (rate_limit.remaining, rate_limit.reset_at) {
            (Some(remaining), Some(reset_at)) => info!(
                "Remaining API calls: {remaining} (resets at {})",
                reset_at.to_rfc3339()
            ),
            (Some(remaining), None) => info!("Remaining API calls: {remaining}"),
            _ => info!("Remaining API calls: unknown"),
        }

        Ok(Some(report))
    }

    async fn collect_all(
        &self,
        repositories: &[Repository],
        threshold: DateTime<Utc>,
        checkpoint: &Checkpoint,
        progress: &PhaseProgress,
    ) -> Vec<RepoCollection> {
        let client = self.client.as_ref();
        let org = self.org.as_str();

        stream::iter(repositories)
            .map(|repository| async move {
                let collection = client
                    .collect_repository(org, repository, threshold, checkpoint)
                    .await;
                progress.inc();
                collection
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await
    }

    /// Fold per-repository results into the persisted artifacts.
    fn merge_and_persist(
        &self,
        store: &DataStore,
        checkpoint: &mut Checkpoint,
        collections: Vec<RepoCollection>,
    ) -> CollectionReport {
        let mut runs = store.load_runs();
        let mut failed = store.load_failed_runs();
        let mut known: HashSet<u64> = runs.iter().map(|run| run.run_id).collect();

        let mut report = CollectionReport {
            organization: self.org.clone(),
            ..CollectionReport::default()
        };
        let mut touched_days = BTreeSet::new();

        let mut incomplete = Vec::new();
        for collection in collections {
            report.skipped_runs += collection.skipped;
            if !collection.listed {
                incomplete.push(collection.repository.clone());
            }
            for record in collection.runs {
                checkpoint.mark_processed(record.run_id);
                if !known.insert(record.run_id) {
                    continue;
                }
                touched_days.insert(record.created_date());
                if record.is_failure() {
                    failed.push(record.clone());
                    report.new_failures += 1;
                }
                runs.push(record);
                report.new_runs += 1;
            }
        }

        runs.sort_by(|a, b| b.total_time_minutes.total_cmp(&a.total_time_minutes));

        let mut trend = store.load_daily_trend();
        let daily = usage::daily_totals(&runs);
        usage::overwrite_days(&mut trend, &daily);
        report.minutes_by_day = touched_days
            .iter()
            .filter_map(|day| daily.get(day).map(|minutes| (*day, *minutes)))
            .collect();

        // A repository whose listing failed still has runs below any new
        // watermark; keep the old one so the next pass asks for them again.
        if incomplete.is_empty() {
            checkpoint.advance(&runs);
        } else {
            warn!(
                "Keeping watermark, run listing failed for: {}",
                incomplete.join(", ")
            );
        }
        report.watermark = checkpoint.watermark();
        report.remaining_api_calls = self.client.remaining_calls();

        info!(
            "Collected {} new runs ({} failed), skipped {} already processed",
            report.new_runs, report.new_failures, report.skipped_runs
        );

        let runs_saved = persist("workflow runs", store.save_runs(&runs));
        let failed_saved = persist("failed runs", store.save_failed_runs(&failed));
        persist("daily trend", store.save_daily_trend(&trend));
        if self.options.track_os_usage {
            let mut os_usage = store.load_os_usage();
            usage::overwrite_days(&mut os_usage, &usage::os_totals(&runs));
            persist("OS usage", store.save_os_usage(&os_usage));
        }

        // Processed ids must only name runs whose records are on disk.
        if runs_saved && failed_saved {
            persist("checkpoint", store.save_checkpoint(checkpoint));
        } else {
            error!("Run records were not saved, leaving the checkpoint unchanged");
        }

        report
    }
}

fn persist(what: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to save {what}: {e}");
            false
        }
    }
}

