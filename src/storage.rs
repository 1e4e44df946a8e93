use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::checkpoint::Checkpoint;
use crate::config::OutputFiles;
use crate::error::Result;
use crate::records::RunRecord;
use crate::usage::{trend_entries, DailyUsage, DailyUsageEntry, OsUsage};

/// `daily_trend.json` in either of the shapes it has been written in.
#[derive(Deserialize)]
#[serde(untagged)]
enum TrendFile {
    Entries(Vec<DailyUsageEntry>),
    ByDate(DailyUsage),
}

impl From<TrendFile> for DailyUsage {
    fn from(file: TrendFile) -> Self {
        match file {
            TrendFile::ByDate(usage) => usage,
            TrendFile::Entries(entries) => {
                let mut usage = DailyUsage::new();
                for entry in entries {
                    *usage.entry(entry.date).or_default() += entry.total_minutes;
                }
                usage
            }
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatermarkFile {
    last_processed_time: Option<DateTime<Utc>>,
}

/// Flat JSON artifacts under one data directory.
///
/// Each artifact loads and saves on its own. Loading never fails: a missing,
/// unreadable or malformed file yields the empty value.
#[derive(Debug, Clone)]
pub struct DataStore {
    dir: PathBuf,
    files: OutputFiles,
}

impl DataStore {
    pub fn new(dir: impl Into<PathBuf>, files: OutputFiles) -> Self {
        Self {
            dir: dir.into(),
            files,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn load<T: DeserializeOwned + Default>(&self, file: &str) -> T {
        let path = self.path(file);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No existing data at {}", path.display());
                return T::default();
            }
            Err(e) => {
                warn!("Failed to read {}: {e}, starting empty", path.display());
                return T::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(
                "Unexpected content in {}: {e}, starting empty",
                path.display()
            );
            T::default()
        })
    }

    /// Write `value` as indented JSON, replacing the file in one rename.
    fn save<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path(file);
        let staging = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(value)?;
        fs::write(&staging, content)?;
        fs::rename(&staging, &path)?;

        debug!("Saved {}", path.display());
        Ok(())
    }

    pub fn load_runs(&self) -> Vec<RunRecord> {
        self.load(&self.files.workflow_runs)
    }

    pub fn save_runs(&self, runs: &[RunRecord]) -> Result<()> {
        self.save(&self.files.workflow_runs, runs)
    }

    pub fn load_failed_runs(&self) -> Vec<RunRecord> {
        self.load(&self.files.failed_runs)
    }

    pub fn save_failed_runs(&self, runs: &[RunRecord]) -> Result<()> {
        self.save(&self.files.failed_runs, runs)
    }

    /// Daily totals, accepting both the entry list and the date mapping.
    pub fn load_daily_trend(&self) -> DailyUsage {
        self.load::<Option<TrendFile>>(&self.files.daily_trend)
            .map(DailyUsage::from)
            .unwrap_or_default()
    }

    pub fn save_daily_trend(&self, usage: &DailyUsage) -> Result<()> {
        self.save(&self.files.daily_trend, &trend_entries(usage))
    }

    pub fn load_os_usage(&self) -> OsUsage {
        self.load(&self.files.os_usage)
    }

    pub fn save_os_usage(&self, usage: &OsUsage) -> Result<()> {
        self.save(&self.files.os_usage, usage)
    }

    pub fn load_checkpoint(&self) -> Checkpoint {
        let processed: BTreeSet<u64> = self.load(&self.files.processed_runs);
        let watermark: WatermarkFile = self.load(&self.files.last_processed);

        info!(
            "Loaded {} processed run IDs, last processed time: {}",
            processed.len(),
            watermark
                .last_processed_time
                .map_or_else(|| "none".to_string(), |t| t.to_rfc3339())
        );

        Checkpoint::new(processed, watermark.last_processed_time)
    }

    pub fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.save(&self.files.processed_runs, checkpoint.processed())?;
        self.save(
            &self.files.last_processed,
            &WatermarkFile {
                last_processed_time: checkpoint.watermark(),
            },
        )
    }
}
