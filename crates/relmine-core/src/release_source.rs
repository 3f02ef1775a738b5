//! Release metadata sources.
//!
//! A `ReleaseSource` supplies the ordered list of published releases for a
//! repository. The GitHub implementation pages through the releases API,
//! drops drafts and pre-releases, and sorts oldest first.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::error::{RelmineError, Result};
use crate::domain::release::ReleaseDescriptor;

/// Default GitHub REST API base URL.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

/// Source of release descriptors for a repository.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch published releases, ascending by publish date.
    ///
    /// Any failure here is fatal to the whole run.
    async fn fetch_releases(&self, owner: &str, repo: &str) -> Result<Vec<ReleaseDescriptor>>;
}

/// A slug component is used as a directory name, so it must stay inside its parent.
fn valid_slug_part(part: &str) -> bool {
    !part.is_empty()
        && part != "."
        && part != ".."
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Split an `owner/repo` slug, rejecting anything else.
pub fn parse_repo_slug(slug: &str) -> Result<(String, String)> {
    let invalid = || RelmineError::InvalidRepository(slug.to_string());
    let (owner, repo) = slug.trim().split_once('/').ok_or_else(invalid)?;
    if !valid_slug_part(owner) || !valid_slug_part(repo) {
        return Err(invalid());
    }
    Ok((owner.to_string(), repo.to_string()))
}

/// GitHub API response for a single release.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
}

/// Filter and order raw API entries into release descriptors.
///
/// Drafts and pre-releases are dropped, `published_at` falls back to
/// `created_at`, entries with neither are dropped, and the result is sorted
/// ascending by timestamp (stable for equal timestamps).
pub fn normalize_releases(raw: Vec<GitHubRelease>) -> Vec<ReleaseDescriptor> {
    let mut releases: Vec<ReleaseDescriptor> = raw
        .into_iter()
        .filter(|r| !r.draft && !r.prerelease)
        .filter_map(|r| {
            let published_at = r.published_at.or(r.created_at)?;
            let name = r
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| r.tag_name.clone());
            Some(ReleaseDescriptor::new(r.tag_name, name, published_at, r.html_url))
        })
        .collect();

    releases.sort_by_key(|r| r.published_at);
    releases
}

/// Release source backed by the GitHub releases API.
pub struct GitHubReleaseSource {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubReleaseSource {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_api_base(GITHUB_API_BASE, token)
    }

    /// Point the source at a different API host (GitHub Enterprise, tests).
    pub fn with_api_base(api_base: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("relmine/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    async fn fetch_page(&self, owner: &str, repo: &str, page: usize) -> Result<Vec<GitHubRelease>> {
        let url = format!("{}/repos/{}/{}/releases", self.api_base, owner, repo);
        let mut request = self
            .client
            .get(&url)
            .query(&[("per_page", PER_PAGE), ("page", page)])
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelmineError::Fetch(format!(
                "GET {url} page {page} returned {status}: {}",
                body.trim()
            )));
        }

        response
            .json::<Vec<GitHubRelease>>()
            .await
            .map_err(|e| RelmineError::Fetch(format!("invalid releases payload: {e}")))
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleaseSource {
    async fn fetch_releases(&self, owner: &str, repo: &str) -> Result<Vec<ReleaseDescriptor>> {
        let mut raw = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.fetch_page(owner, repo, page).await?;
            debug!(owner, repo, page, count = batch.len(), "Fetched release page");
            let last = batch.len() < PER_PAGE;
            raw.extend(batch);
            if last {
                break;
            }
            page += 1;
        }

        let total = raw.len();
        let releases = normalize_releases(raw);
        info!(
            owner,
            repo,
            fetched = total,
            published = releases.len(),
            "Fetched releases"
        );
        Ok(releases)
    }
}
