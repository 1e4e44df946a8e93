use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Token;
use crate::error::ActionboardError;
use crate::providers::github::{RetryPolicy, DEFAULT_BASE_URL, DEFAULT_MAX_PAGES, DEFAULT_PER_PAGE};

/// Configuration file structure for actionboard.
///
/// Every value can also come from the command line, which takes precedence.
/// Configuration files are loaded from an explicit path, the current
/// directory, or the user configuration directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GitHub connection settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Collection tuning
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Where artifacts are written
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub token with `actions:read` on the organization's repositories
    pub token: Option<String>,

    /// Organization whose repositories are scanned
    pub org: Option<String>,

    /// GitHub API base URL
    #[serde(default = "default_github_base_url")]
    pub base_url: String,

    /// Items requested per page (GitHub caps this at 100)
    #[serde(default = "default_per_page")]
    pub per_page: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CollectionConfig {
    /// Repositories collected at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pages followed per resource before giving up
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on every further retry
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Keep per-OS billable milliseconds by day
    #[serde(default = "default_true")]
    pub track_os_usage: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding the JSON artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Artifact file names inside `data-dir`
    #[serde(default)]
    pub files: OutputFiles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputFiles {
    pub workflow_runs: String,
    pub failed_runs: String,
    pub daily_trend: String,
    pub os_usage: String,
    pub processed_runs: String,
    pub last_processed: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            org: None,
            base_url: default_github_base_url(),
            per_page: default_per_page(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_pages: default_max_pages(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            track_os_usage: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            files: OutputFiles::default(),
        }
    }
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            workflow_runs: "workflow_runs.json".to_string(),
            failed_runs: "failed_runs.json".to_string(),
            daily_trend: "daily_trend.json".to_string(),
            os_usage: "os_usage.json".to_string(),
            processed_runs: "processed_runs.json".to_string(),
            last_processed: "last_processed.json".to_string(),
        }
    }
}

fn default_github_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_per_page() -> u8 {
    DEFAULT_PER_PAGE
}

fn default_concurrency() -> usize {
    10
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("public").join("data")
}

impl CollectionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

impl GitHubConfig {
    /// Token and organization, both of which must be present and non-blank.
    pub fn credentials(&self) -> std::result::Result<(Token, String), ActionboardError> {
        let token = self
            .token
            .as_deref()
            .map(Token::from)
            .filter(|token| !token.is_empty());
        let org = self
            .org
            .as_deref()
            .map(str::trim)
            .filter(|org| !org.is_empty());

        match (token, org) {
            (Some(token), Some(org)) => Ok((token, org.to_string())),
            _ => Err(ActionboardError::Config(
                "GITHUB_TOKEN and GITHUB_ORG environment variables must be set".to_string(),
            )),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./actionboard.toml
    /// 3. ./actionboard.json
    /// 4. ./actionboard.yaml
    /// 5. ./actionboard.yml
    /// 6. `<user config dir>/actionboard/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "actionboard.toml",
            "actionboard.json",
            "actionboard.yaml",
            "actionboard.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = dirs::config_dir().map(|dir| dir.join("actionboard").join("config.toml")) {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }
}
