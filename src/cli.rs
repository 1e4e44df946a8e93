use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::collector::{CollectOptions, Collector};
use crate::config::Config;
use crate::output::{self, StoredUsage};
use crate::providers::github::GitHubClient;
use crate::storage::DataStore;

#[derive(Parser)]
#[command(name = "actionboard")]
#[command(author, version, about = "GitHub Actions Usage Collector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect new workflow runs and update the usage artifacts
    Collect(CollectArgs),

    /// Summarize the usage artifacts already on disk
    Report {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[derive(Args, Default)]
struct CollectArgs {
    #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(short, long, env = "GITHUB_ORG")]
    org: Option<String>,

    /// GitHub API base URL, for GitHub Enterprise Server
    #[arg(long)]
    api_url: Option<String>,

    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    max_pages: Option<usize>,

    /// Do not maintain per-OS usage
    #[arg(long, default_value_t = false)]
    no_os_usage: bool,

    /// Hide the progress display
    #[arg(long, default_value_t = false)]
    no_progress: bool,
}

impl CollectArgs {
    /// Layer flags over the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(token) = &self.token {
            config.github.token = Some(token.clone());
        }
        if let Some(org) = &self.org {
            config.github.org = Some(org.clone());
        }
        if let Some(api_url) = &self.api_url {
            config.github.base_url.clone_from(api_url);
        }
        if let Some(data_dir) = &self.data_dir {
            config.output.data_dir.clone_from(data_dir);
        }
        if let Some(concurrency) = self.concurrency {
            config.collection.concurrency = concurrency;
        }
        if let Some(max_pages) = self.max_pages {
            config.collection.max_pages = max_pages;
        }
        if self.no_os_usage {
            config.collection.track_os_usage = false;
        }
    }
}

impl Cli {
    async fn execute_collect(args: &CollectArgs, mut config: Config) -> Result<()> {
        args.apply(&mut config);
        let (token, org) = config.github.credentials()?;

        info!("Collecting GitHub Actions usage for organization: {}", org);

        let client = GitHubClient::new(
            &config.github.base_url,
            &token,
            config.collection.retry_policy(),
        )?
        .with_pagination(config.github.per_page, config.collection.max_pages);

        let store = DataStore::new(config.output.data_dir.clone(), config.output.files.clone());
        let options = CollectOptions {
            concurrency: config.collection.concurrency,
            track_os_usage: config.collection.track_os_usage,
            show_progress: !args.no_progress,
        };

        let collector = Collector::new(client, org, options);
        let report = collector
            .run(&store, Utc::now())
            .await
            .context("Collection failed")?;

        if let Some(report) = report {
            info!("Usage data written to: {}", store.dir().display());
            output::print_collection_summary(&report);
        }

        Ok(())
    }

    fn execute_report(data_dir: Option<&PathBuf>, top: usize, config: &Config) {
        let dir = data_dir.unwrap_or(&config.output.data_dir);
        let store = DataStore::new(dir.clone(), config.output.files.clone());

        let runs = store.load_runs();
        let failed = store.load_failed_runs();
        let daily = store.load_daily_trend();
        let os_usage = store.load_os_usage();

        output::print_report(
            &StoredUsage {
                runs: &runs,
                failed: &failed,
                daily: &daily,
                os_usage: &os_usage,
            },
            top,
        );
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Collect(args) => Self::execute_collect(args, config).await,
            Commands::Report { data_dir, top } => {
                Self::execute_report(data_dir.as_ref(), *top, &config);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionboardError;

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.github.org = Some("from-file".to_string());
        config.collection.concurrency = 4;

        let args = CollectArgs {
            org: Some("from-flag".to_string()),
            api_url: Some("https://ghe.example.com/api/v3".to_string()),
            data_dir: Some(PathBuf::from("out")),
            no_os_usage: true,
            ..CollectArgs::default()
        };
        args.apply(&mut config);

        assert_eq!(config.github.org.as_deref(), Some("from-flag"));
        assert_eq!(config.github.base_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.output.data_dir, PathBuf::from("out"));
        assert!(!config.collection.track_os_usage);
        // Unset flags leave the file's values alone.
        assert_eq!(config.collection.concurrency, 4);
    }

    #[test]
    fn test_defaults_survive_without_flags() {
        let mut config = Config::default();
        CollectArgs::default().apply(&mut config);

        assert_eq!(config.github.base_url, "https://api.github.com");
        assert_eq!(config.collection.concurrency, 10);
        assert!(config.collection.track_os_usage);
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_network() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        // Nothing listens here; reaching the network would be a different error.
        config.github.base_url = "http://127.0.0.1:9".to_string();
        config.github.org = Some("acme".to_string());
        config.output.data_dir = dir.path().join("data");

        let args = CollectArgs {
            no_progress: true,
            ..CollectArgs::default()
        };
        let err = Cli::execute_collect(&args, config).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ActionboardError>(),
            Some(ActionboardError::Config(_))
        ));
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn test_parse_collect_flags() {
        let cli = Cli::try_parse_from([
            "actionboard",
            "collect",
            "--token",
            "ghp_x",
            "--org",
            "acme",
            "--concurrency",
            "3",
            "--no-os-usage",
        ])
        .unwrap();

        let Commands::Collect(args) = cli.command else {
            panic!("expected collect");
        };
        assert_eq!(args.token.as_deref(), Some("ghp_x"));
        assert_eq!(args.org.as_deref(), Some("acme"));
        assert_eq!(args.concurrency, Some(3));
        assert!(args.no_os_usage);
    }
}
