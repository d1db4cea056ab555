//! Remote workflow retrieval.

use async_trait::async_trait;

use crate::workflow::RemoteRef;

pub const DEFAULT_RAW_CONTENT_URL: &str = "https://raw.githubusercontent.com";

/// Source of remote workflow text.
///
/// `None` means the workflow is unavailable; callers treat that branch of the
/// call graph as a leaf.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, remote: &RemoteRef) -> Option<String>;
}

/// Fetches from a raw-content host laid out as `{base}/{org}/{repo}/{ref}/{path}`.
pub struct GitHubRawFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl GitHubRawFetcher {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_RAW_CONTENT_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, remote: &RemoteRef) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.base_url, remote.org, remote.repo, remote.git_ref, remote.file_path
        )
    }
}

impl Default for GitHubRawFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteFetcher for GitHubRawFetcher {
    async fn fetch(&self, remote: &RemoteRef) -> Option<String> {
        let url = self.url_for(remote);
        tracing::debug!("[CallGraph] Fetching remote workflow {}", url);

        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("[CallGraph] Failed to fetch remote workflow {}: {}", remote, e);
                return None;
            }
        };

        if !resp.status().is_success() {
            tracing::warn!(
                "[CallGraph] Remote workflow {} returned HTTP {}",
                remote,
                resp.status()
            );
            return None;
        }

        match resp.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("[CallGraph] Failed to read remote workflow {}: {}", remote, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_url_layout() {
        let fetcher = GitHubRawFetcher::with_base_url("https://raw.example.com/");
        let remote = RemoteRef {
            org: "org".to_string(),
            repo: "repo".to_string(),
            file_path: ".github/workflows/build.yml".to_string(),
            git_ref: "v2".to_string(),
        };
        assert_eq!(
            fetcher.url_for(&remote),
            "https://raw.example.com/org/repo/v2/.github/workflows/build.yml"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_none() {
        let fetcher = GitHubRawFetcher::with_base_url("http://127.0.0.1:1");
        let remote = RemoteRef {
            org: "org".to_string(),
            repo: "repo".to_string(),
            file_path: ".github/workflows/build.yml".to_string(),
            git_ref: "main".to_string(),
        };
        assert!(fetcher.fetch(&remote).await.is_none());
    }
}
