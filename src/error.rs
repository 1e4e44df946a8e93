use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionboardError {
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("API request failed with status {status} after {retries} attempts")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not list repositories for organization '{0}'")]
    RepositoriesUnavailable(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ActionboardError>;
