use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    owner: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    #[error("repository owner cannot be empty")]
    EmptyOwner,
    #[error("repository name cannot be empty")]
    EmptyName,
    #[error("repository component '{0}' must not contain '/'")]
    InvalidComponent(String),
    #[error("expected 'owner/repo', got '{0}'")]
    InvalidFormat(String),
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into().trim().to_string();
        let name = name.into().trim().to_string();

        if owner.is_empty() {
            return Err(RepoError::EmptyOwner);
        }
        if name.is_empty() {
            return Err(RepoError::EmptyName);
        }
        for component in [&owner, &name] {
            if component.contains('/') {
                return Err(RepoError::InvalidComponent(component.clone()));
            }
        }

        Ok(Self { owner, name })
    }

    /// Parses `owner/repo`.
    pub fn parse(value: &str) -> Result<Self, RepoError> {
        match value.trim().split_once('/') {
            Some((owner, name)) if !name.contains('/') => Self::new(owner, name),
            _ => Err(RepoError::InvalidFormat(value.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Open pull request as returned by the search endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An outstanding review request with no submitted review yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub reviewer: String,
    pub pr_number: u64,
}

/// Review states reported by GitHub. States added to the API later land in
/// `Unknown` instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Pending,
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    #[serde(other)]
    Unknown,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Pending => "PENDING",
            ReviewState::Approved => "APPROVED",
            ReviewState::ChangesRequested => "CHANGES_REQUESTED",
            ReviewState::Commented => "COMMENTED",
            ReviewState::Dismissed => "DISMISSED",
            ReviewState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub reviewer: String,
    pub state: ReviewState,
    /// `None` while the review has not been submitted.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// The last review activity recorded for a delayed reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastReview {
    NotAvailable,
    At(DateTime<Utc>),
}

impl LastReview {
    pub const NOT_AVAILABLE: &'static str = "N/A";

    /// `None` when there is no review record to date.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            LastReview::NotAvailable => None,
            LastReview::At(ts) => Some(*ts),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayReason {
    /// Requested, but no review of any kind exists.
    AwaitingReview,
    /// A pending review has been sitting past the threshold.
    StalePendingReview,
}

impl DelayReason {
    pub fn describe(&self) -> &'static str {
        match self {
            DelayReason::AwaitingReview => "no review",
            DelayReason::StalePendingReview => "pending review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedReviewer {
    pub reviewer: String,
    pub pr_number: u64,
    pub last_review: LastReview,
    pub reason: DelayReason,
}

/// A pull request together with the reviewers found to be delayed on it.
#[derive(Debug, Clone, PartialEq)]
pub struct PrReport {
    pub pr: PullRequest,
    pub delayed: Vec<DelayedReviewer>,
}

impl PrReport {
    pub fn has_delays(&self) -> bool {
        !self.delayed.is_empty()
    }
}

/// Source of pull request data for a single repository.
///
/// Implemented by the GitHub client and by in-memory fakes in tests.
#[async_trait]
pub trait Forge {
    /// Returns the first page of open pull requests, at most `limit` entries.
    async fn search_open_pull_requests(&self, repo: &Repo, limit: u8) -> Result<Vec<PullRequest>>;

    async fn list_requested_reviewers(
        &self,
        repo: &Repo,
        number: u64,
    ) -> Result<Vec<ReviewRequest>>;

    async fn list_reviews(&self, repo: &Repo, number: u64) -> Result<Vec<Review>>;
}
