//! Records as delivered by a source, before normalization.
//!
//! Fields the remote API may omit or garble are optional; the collector decides what a usable
//! record needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub full_name: String,
    pub private: bool,
    pub archived: bool,
    pub default_branch: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub files_changed: u64,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCommit {
    pub sha: Option<String>,

    /// Login of the platform account linked to the commit author, if any
    pub author_login: Option<String>,

    /// Display name recorded in the commit itself
    pub author_name: Option<String>,

    pub authored_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub stats: Option<CommitStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePullRequest {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub author_login: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged: bool,
    pub base_branch: Option<String>,
    pub head_branch: Option<String>,

    /// Review comment count; list endpoints leave this empty
    pub review_comments: Option<u64>,

    /// Conversation comment count; list endpoints leave this empty
    pub comments: Option<u64>,
}

impl SourcePullRequest {
    #[must_use]
    pub const fn has_counts(&self) -> bool {
        self.review_comments.is_some() && self.comments.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReview {
    pub id: Option<u64>,
    pub author_login: Option<String>,

    /// Raw state such as `APPROVED` or `CHANGES_REQUESTED`
    pub state: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceIssue {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub author_login: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,

    /// The issue endpoint also returns pull requests; this marks them
    pub is_pull_request: bool,
}

/// State filter for list operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ListState {
    Open,
    Closed,
    #[default]
    All,
}

/// Sort field for pull request listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum PullSort {
    #[default]
    #[strum(serialize = "created")]
    Created,
    #[strum(serialize = "updated")]
    Updated,
    #[strum(serialize = "popularity")]
    Popularity,
    #[strum(serialize = "long-running")]
    LongRunning,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}
