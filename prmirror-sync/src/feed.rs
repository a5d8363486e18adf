//! Source feed: the remote's view of every open pull request.

use prmirror_core::TrackedRecord;

use crate::error::FeedError;

/// A repository of the mirrored organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub full_name: String,
}

impl Repository {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
        }
    }
}

/// Enumerates repositories and their open pull requests.
///
/// Implementations page through the remote themselves; callers see complete
/// lists.
pub trait SourceFeed {
    fn repositories(&self, organization: &str) -> Result<Vec<Repository>, FeedError>;

    fn pull_requests(&self, repository: &Repository) -> Result<Vec<TrackedRecord>, FeedError>;
}

/// A fixed snapshot, for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    repositories: Vec<Repository>,
    pull_requests: Vec<TrackedRecord>,
}

impl StaticFeed {
    /// Repositories are derived from the records, in first-seen order.
    pub fn new(pull_requests: Vec<TrackedRecord>) -> Self {
        let mut repositories: Vec<Repository> = Vec::new();
        for pr in &pull_requests {
            if !repositories.iter().any(|r| r.full_name == pr.repo_full_name) {
                repositories.push(Repository::new(pr.repo_full_name.clone()));
            }
        }
        Self {
            repositories,
            pull_requests,
        }
    }

    /// Add a repository that has no open pull requests.
    pub fn with_repository(mut self, full_name: &str) -> Self {
        if !self.repositories.iter().any(|r| r.full_name == full_name) {
            self.repositories.push(Repository::new(full_name));
        }
        self
    }
}

impl SourceFeed for StaticFeed {
    fn repositories(&self, _organization: &str) -> Result<Vec<Repository>, FeedError> {
        Ok(self.repositories.clone())
    }

    fn pull_requests(&self, repository: &Repository) -> Result<Vec<TrackedRecord>, FeedError> {
        Ok(self
            .pull_requests
            .iter()
            .filter(|pr| pr.repo_full_name == repository.full_name)
            .cloned()
            .collect())
    }
}
