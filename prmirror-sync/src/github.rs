//! GitHub REST implementation of [`SourceFeed`].
//!
//! Lists `/orgs/{org}/repos` and `/repos/{full_name}/pulls`, 100 items per
//! page, following the `Link: <...>; rel="next"` header until it runs out.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use prmirror_core::{PullRequestId, Settings, TrackedRecord};

use crate::error::FeedError;
use crate::feed::{Repository, SourceFeed};

const USER_AGENT: &str = concat!("prmirror/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: u32 = 100;
const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RepoPayload {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct PullPayload {
    id: u64,
    number: u64,
    html_url: String,
    title: String,
    created_at: String,
    updated_at: String,
}

/// Blocking GitHub API client.
pub struct GitHubFeed {
    agent: ureq::Agent,
    api_url: String,
    authorization: Option<String>,
}

impl GitHubFeed {
    /// Basic auth is sent only when a username is given.
    pub fn new(api_url: &str, username: Option<&str>, password: Option<&str>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        let authorization = username.map(|user| {
            let credentials = format!("{user}:{}", password.unwrap_or_default());
            format!("Basic {}", STANDARD.encode(credentials))
        });
        Self {
            agent,
            api_url: api_url.trim_end_matches('/').to_string(),
            authorization,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.api_url,
            settings.username.as_deref(),
            settings.password.as_deref(),
        )
    }

    fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, FeedError> {
        let mut items = Vec::new();
        let mut next = Some(format!("{}{path}?per_page={PER_PAGE}", self.api_url));

        while let Some(url) = next.take() {
            tracing::debug!("GET {url}");
            let mut request = self
                .agent
                .get(&url)
                .set("Accept", "application/vnd.github+json");
            if let Some(auth) = &self.authorization {
                request = request.set("Authorization", auth);
            }
            let response = request.call().map_err(|e| FeedError::Http {
                url: url.clone(),
                source: Box::new(e),
            })?;

            next = response.header("Link").and_then(next_link);
            let page: Vec<T> = response
                .into_json()
                .map_err(|e| FeedError::Decode { url, source: e })?;
            items.extend(page);
        }
        Ok(items)
    }
}

impl SourceFeed for GitHubFeed {
    fn repositories(&self, organization: &str) -> Result<Vec<Repository>, FeedError> {
        let repos: Vec<RepoPayload> = self.get_all(&format!("/orgs/{organization}/repos"))?;
        Ok(repos
            .into_iter()
            .map(|r| Repository::new(r.full_name))
            .collect())
    }

    fn pull_requests(&self, repository: &Repository) -> Result<Vec<TrackedRecord>, FeedError> {
        let pulls: Vec<PullPayload> =
            self.get_all(&format!("/repos/{}/pulls", repository.full_name))?;
        Ok(pulls
            .into_iter()
            .map(|p| TrackedRecord {
                id: PullRequestId(p.id),
                repo_full_name: repository.full_name.clone(),
                number: p.number,
                url: p.html_url,
                title: p.title,
                created_at: p.created_at,
                updated_at: p.updated_at,
            })
            .collect())
    }
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        if !pieces.any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_owned)
    })
}
