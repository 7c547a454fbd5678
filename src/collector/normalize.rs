//! Conversion of source records into [`ContributionEvent`] values.

use crate::model::{ContributionEvent, ContributionKind, EventHeader, IssueState, Metadata, PullRequestState, RepoName, ReviewState};
use crate::source::{SourceCommit, SourceIssue, SourcePullRequest, SourceReview};
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use serde_json::{Value, json};

/// Developer recorded when a record names no author at all.
pub const UNKNOWN_DEVELOPER: &str = "unknown";

/// A source record that cannot become an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    MissingField { kind: ContributionKind, field: &'static str },
}

impl Display for NormalizeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingField { kind, field } => write!(f, "{kind} record has no '{field}'"),
        }
    }
}

impl core::error::Error for NormalizeError {}

const fn missing(kind: ContributionKind, field: &'static str) -> NormalizeError {
    NormalizeError::MissingField { kind, field }
}

/// A source record with the instant used to place it in a period.
pub trait Dated {
    const KIND: ContributionKind;
    const TIMESTAMP_FIELD: &'static str;

    fn occurred_at(&self) -> Option<DateTime<Utc>>;
}

impl Dated for SourceCommit {
    const KIND: ContributionKind = ContributionKind::Commit;
    const TIMESTAMP_FIELD: &'static str = "authored_at";

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.authored_at
    }
}

impl Dated for SourcePullRequest {
    const KIND: ContributionKind = ContributionKind::PullRequest;
    const TIMESTAMP_FIELD: &'static str = "created_at";

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// A review together with the number of the pull request it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestReview {
    pub pull_request: u64,
    pub review: SourceReview,
}

impl Dated for PullRequestReview {
    const KIND: ContributionKind = ContributionKind::Review;
    const TIMESTAMP_FIELD: &'static str = "submitted_at";

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.review.submitted_at
    }
}

impl Dated for SourceIssue {
    const KIND: ContributionKind = ContributionKind::Issue;
    const TIMESTAMP_FIELD: &'static str = "created_at";

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// The trimmed first line, or `None` when it is blank.
fn first_line(message: &str) -> Option<String> {
    let line = message.lines().next().unwrap_or_default().trim();
    (!line.is_empty()).then(|| line.to_string())
}

pub fn commit(repo: &RepoName, record: SourceCommit) -> Result<ContributionEvent, NormalizeError> {
    let kind = ContributionKind::Commit;
    let sha = record.sha.filter(|s| !s.is_empty()).ok_or(missing(kind, "sha"))?;
    let timestamp = record.authored_at.ok_or(missing(kind, "authored_at"))?;
    let developer = record
        .author_login
        .filter(|s| !s.is_empty())
        .or_else(|| record.author_name.filter(|s| !s.is_empty()))
        .ok_or(missing(kind, "author"))?;

    let message = record.message.unwrap_or_default();
    let stats = record.stats.unwrap_or_default();

    let mut metadata = Metadata::new();
    let _ = metadata.insert("sha".into(), json!(sha));
    let _ = metadata.insert("message".into(), json!(message));
    let _ = metadata.insert("files_changed".into(), json!(stats.files_changed));
    let _ = metadata.insert("additions".into(), json!(stats.additions));
    let _ = metadata.insert("deletions".into(), json!(stats.deletions));

    let header = EventHeader {
        id: sha,
        timestamp,
        repository: repo.full_name(),
        developer,
        title: first_line(&message),
    };

    Ok(ContributionEvent::commit(header, metadata))
}

pub fn pull_request(repo: &RepoName, record: SourcePullRequest) -> Result<ContributionEvent, NormalizeError> {
    let kind = ContributionKind::PullRequest;
    let number = record.number.ok_or(missing(kind, "number"))?;
    let timestamp = record.created_at.ok_or(missing(kind, "created_at"))?;

    let state = if record.merged {
        PullRequestState::Merged
    } else if record.closed_at.is_some() {
        PullRequestState::Closed
    } else {
        PullRequestState::Open
    };

    let mut metadata = Metadata::new();
    let _ = metadata.insert("number".into(), json!(number));
    let _ = metadata.insert("base_branch".into(), json!(record.base_branch));
    let _ = metadata.insert("head_branch".into(), json!(record.head_branch));
    let _ = metadata.insert("merged".into(), json!(record.merged));
    let _ = metadata.insert("review_count".into(), json!(record.review_comments.unwrap_or_default()));
    let _ = metadata.insert("comment_count".into(), json!(record.comments.unwrap_or_default()));

    let header = EventHeader {
        id: format!("pr-{number}"),
        timestamp,
        repository: repo.full_name(),
        developer: record.author_login.unwrap_or_else(|| UNKNOWN_DEVELOPER.to_string()),
        title: record.title,
    };

    Ok(ContributionEvent::pull_request(header, state, metadata))
}

/// Map a raw review state; anything unrecognized counts as a comment.
#[must_use]
pub fn review_state(raw: Option<&str>) -> ReviewState {
    match raw.map(str::to_ascii_uppercase).as_deref() {
        Some("APPROVED") => ReviewState::Approved,
        Some("CHANGES_REQUESTED") => ReviewState::ChangesRequested,
        _ => ReviewState::Commented,
    }
}

pub fn review(repo: &RepoName, record: PullRequestReview) -> Result<ContributionEvent, NormalizeError> {
    let kind = ContributionKind::Review;
    let PullRequestReview { pull_request, review } = record;
    let review_id = review.id.ok_or(missing(kind, "id"))?;
    let timestamp = review.submitted_at.ok_or(missing(kind, "submitted_at"))?;

    let mut metadata = Metadata::new();
    let _ = metadata.insert("review_id".into(), json!(review_id));
    let _ = metadata.insert("pr_number".into(), json!(pull_request));

    let header = EventHeader {
        id: format!("review-{review_id}"),
        timestamp,
        repository: repo.full_name(),
        developer: review.author_login.unwrap_or_else(|| UNKNOWN_DEVELOPER.to_string()),
        title: Some(format!("Review PR #{pull_request}")),
    };

    Ok(ContributionEvent::review(header, review_state(review.state.as_deref()), metadata))
}

pub fn issue(repo: &RepoName, record: SourceIssue) -> Result<ContributionEvent, NormalizeError> {
    let kind = ContributionKind::Issue;
    let number = record.number.ok_or(missing(kind, "number"))?;
    let timestamp = record.created_at.ok_or(missing(kind, "created_at"))?;
    let state = if record.closed_at.is_some() { IssueState::Closed } else { IssueState::Open };

    let mut metadata = Metadata::new();
    let _ = metadata.insert("number".into(), json!(number));
    let _ = metadata.insert("labels".into(), Value::from(record.labels));
    let _ = metadata.insert("assignees".into(), Value::from(record.assignees));

    let header = EventHeader {
        id: format!("issue-{number}"),
        timestamp,
        repository: repo.full_name(),
        developer: record.author_login.unwrap_or_else(|| UNKNOWN_DEVELOPER.to_string()),
        title: record.title,
    };

    Ok(ContributionEvent::issue(header, state, metadata))
}
