use log::{debug, warn};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Result;

use super::client::GitHubClient;

/// Upper bound on pages followed for a single resource.
pub const DEFAULT_MAX_PAGES: usize = 500;

/// A page body that carries a list of items.
///
/// Listing endpoints either return a bare array or wrap the array in an
/// envelope (`{"total_count": .., "workflow_runs": [..]}`).
pub trait Listing: DeserializeOwned {
    type Item;

    fn into_items(self) -> Vec<Self::Item>;
}

impl<T: DeserializeOwned> Listing for Vec<T> {
    type Item = T;

    fn into_items(self) -> Vec<T> {
        self
    }
}

impl GitHubClient {
    /// Follow `rel="next"` links from `seed`, concatenating every page's items in order.
    ///
    /// Stops when a page has no successor, when a fetch fails, or when the
    /// configured page cap is reached. Only a failure on the very first page is
    /// returned as an error; later failures keep what was gathered so far.
    pub async fn walk<L: Listing>(&self, seed: Url) -> Result<Vec<L::Item>> {
        let mut items = Vec::new();
        let mut next = Some(seed);
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            if pages >= self.max_pages {
                warn!(
                    "Stopped following pagination at {url} after {} pages",
                    self.max_pages
                );
                break;
            }

            match self.fetch::<L>(&url).await {
                Ok(page) => {
                    pages += 1;
                    items.extend(page.data.into_items());
                    next = page.next;
                }
                Err(e) if pages == 0 => return Err(e),
                Err(e) => {
                    warn!("Stopping pagination after page {pages}: {e}");
                    break;
                }
            }
        }

        debug!("Collected {} items over {pages} pages", items.len());

        Ok(items)
    }
}
