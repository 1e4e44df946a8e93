use log::{error, info};

use crate::error::{ActionboardError, Result};

use super::client::GitHubClient;
use super::types::Repository;

impl GitHubClient {
    /// List every repository owned by `org`.
    ///
    /// A failure on the first page means there is nothing to process and is
    /// reported as [`ActionboardError::RepositoriesUnavailable`]. An empty
    /// organization is not an error.
    pub async fn list_repositories(&self, org: &str) -> Result<Vec<Repository>> {
        info!("Fetching repositories for organization: {org}");

        let mut url = self.api_url(&format!("orgs/{org}/repos"))?;
        url.query_pairs_mut()
            .append_pair("per_page", &self.per_page.to_string());

        let repositories = self
            .walk::<Vec<Repository>>(url)
            .await
            .map_err(|e| {
                error!("Failed to fetch repositories for {org}: {e}");
                ActionboardError::RepositoriesUnavailable(org.to_string())
            })?;

        let archived = repositories.iter().filter(|repo| repo.archived).count();
        info!(
            "Found {} repositories in {org} ({archived} archived)",
            repositories.len()
        );

        Ok(repositories)
    }
}
