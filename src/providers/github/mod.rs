mod client;
mod pagination;
mod repos;
mod runs;
mod types;

#[cfg(test)]
mod tests;

pub use client::{GitHubClient, RetryPolicy, DEFAULT_BASE_URL, DEFAULT_PER_PAGE};
pub use pagination::DEFAULT_MAX_PAGES;
pub use runs::RepoCollection;
pub use types::Repository;
