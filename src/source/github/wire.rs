//! Response shapes of the GitHub REST API.
//!
//! Every field is optional and timestamps stay textual until conversion, so one malformed
//! element never fails a whole page. An element that does not decode at all becomes an empty
//! record and is dropped later during normalization.

use crate::source::{CommitStats, RepositoryInfo, SourceCommit, SourceIssue, SourcePullRequest, SourceReview};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Decode one listing element, falling back to an empty record.
pub fn decode<T: DeserializeOwned + Default>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap_or_default()
}

fn timestamp(text: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text?).ok().map(|at| at.with_timezone(&Utc))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct User {
    pub login: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub full_name: Option<String>,
    pub private: Option<bool>,
    pub archived: Option<bool>,
    pub default_branch: Option<String>,
    pub description: Option<String>,
}

impl Repository {
    pub fn into_info(self) -> Option<RepositoryInfo> {
        Some(RepositoryInfo {
            full_name: self.full_name?,
            private: self.private.unwrap_or_default(),
            archived: self.archived.unwrap_or_default(),
            default_branch: self.default_branch,
            description: self.description,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitAuthor {
    pub name: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommitDetail {
    pub author: Option<GitAuthor>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Commit {
    pub sha: Option<String>,
    pub commit: Option<CommitDetail>,
    pub author: Option<User>,
    pub stats: Option<Stats>,
    pub files: Option<Vec<serde_json::Value>>,
}

impl From<Commit> for SourceCommit {
    fn from(value: Commit) -> Self {
        let (author_name, authored_at, message) = match value.commit {
            Some(detail) => {
                let (name, date) = detail.author.map_or((None, None), |a| (a.name, a.date));
                (name, timestamp(date.as_deref()), detail.message)
            }
            None => (None, None, None),
        };

        let stats = value.stats.map(|s| CommitStats {
            files_changed: value.files.as_ref().map_or(0, |f| f.len() as u64),
            additions: s.additions.unwrap_or_default(),
            deletions: s.deletions.unwrap_or_default(),
        });

        Self {
            sha: value.sha,
            author_login: value.author.and_then(|u| u.login),
            author_name,
            authored_at,
            message,
            stats,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub user: Option<User>,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
    pub merged: Option<bool>,
    pub base: Option<BranchRef>,
    pub head: Option<BranchRef>,
    pub comments: Option<u64>,
    pub review_comments: Option<u64>,
}

impl From<PullRequest> for SourcePullRequest {
    fn from(value: PullRequest) -> Self {
        // list responses carry `merged_at` only; detail responses also carry `merged`
        let merged = value.merged.unwrap_or_else(|| value.merged_at.is_some());

        Self {
            number: value.number,
            title: value.title,
            author_login: value.user.and_then(|u| u.login),
            created_at: timestamp(value.created_at.as_deref()),
            closed_at: timestamp(value.closed_at.as_deref()),
            merged,
            base_branch: value.base.and_then(|b| b.name),
            head_branch: value.head.and_then(|b| b.name),
            review_comments: value.review_comments,
            comments: value.comments,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Review {
    pub id: Option<u64>,
    pub user: Option<User>,
    pub state: Option<String>,
    pub submitted_at: Option<String>,
}

impl From<Review> for SourceReview {
    fn from(value: Review) -> Self {
        Self {
            id: value.id,
            author_login: value.user.and_then(|u| u.login),
            state: value.state,
            submitted_at: timestamp(value.submitted_at.as_deref()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Issue {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub user: Option<User>,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub labels: Vec<serde_json::Value>,
    pub assignees: Vec<User>,
    pub pull_request: Option<serde_json::Value>,
}

impl From<Issue> for SourceIssue {
    fn from(value: Issue) -> Self {
        // labels come back as objects, but older payloads use plain strings
        let labels = value
            .labels
            .into_iter()
            .filter_map(|label| match label {
                serde_json::Value::String(name) => Some(name),
                other => other.get("name").and_then(serde_json::Value::as_str).map(str::to_string),
            })
            .collect();

        Self {
            number: value.number,
            title: value.title,
            author_login: value.user.and_then(|u| u.login),
            created_at: timestamp(value.created_at.as_deref()),
            closed_at: timestamp(value.closed_at.as_deref()),
            labels,
            assignees: value.assignees.into_iter().filter_map(|u| u.login).collect(),
            is_pull_request: value.pull_request.is_some_and(|v| !v.is_null()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commit_without_linked_user() {
        let commit: Commit = decode(json!({
            "sha": "abc123",
            "author": null,
            "commit": {
                "author": { "name": "Jane Doe", "date": "2024-01-15T10:00:00Z" },
                "message": "Fix parser\n\nLonger body"
            }
        }));

        let commit = SourceCommit::from(commit);
        assert_eq!(commit.sha.as_deref(), Some("abc123"));
        assert_eq!(commit.author_login, None);
        assert_eq!(commit.author_name.as_deref(), Some("Jane Doe"));
        assert_eq!(commit.authored_at.unwrap().to_rfc3339(), "2024-01-15T10:00:00+00:00");
        assert_eq!(commit.stats, None);
    }

    #[test]
    fn test_commit_detail_carries_stats() {
        let commit = SourceCommit::from(decode::<Commit>(json!({
            "sha": "abc123",
            "author": { "login": "jane" },
            "commit": { "author": { "name": "Jane", "date": "2024-01-15T10:00:00Z" }, "message": "x" },
            "stats": { "additions": 10, "deletions": 2, "total": 12 },
            "files": [{ "filename": "a.rs" }, { "filename": "b.rs" }]
        })));

        assert_eq!(commit.author_login.as_deref(), Some("jane"));
        assert_eq!(
            commit.stats,
            Some(CommitStats {
                files_changed: 2,
                additions: 10,
                deletions: 2
            })
        );
    }

    #[test]
    fn test_pull_request_merged_from_merged_at() {
        let pr = SourcePullRequest::from(decode::<PullRequest>(json!({
            "number": 7,
            "title": "Add feature",
            "user": { "login": "bob" },
            "created_at": "2024-01-10T00:00:00Z",
            "closed_at": "2024-01-11T00:00:00Z",
            "merged_at": "2024-01-11T00:00:00Z",
            "base": { "ref": "main" },
            "head": { "ref": "feature" }
        })));

        assert!(pr.merged);
        assert_eq!(pr.base_branch.as_deref(), Some("main"));
        assert_eq!(pr.head_branch.as_deref(), Some("feature"));
        assert!(!pr.has_counts());
    }

    #[test]
    fn test_bad_timestamp_only_clears_that_field() {
        let pr = SourcePullRequest::from(decode::<PullRequest>(json!({
            "number": 7,
            "created_at": "last tuesday"
        })));

        assert_eq!(pr.number, Some(7));
        assert_eq!(pr.created_at, None);
    }

    #[test]
    fn test_undecodable_element_becomes_empty_record() {
        let pr = SourcePullRequest::from(decode::<PullRequest>(json!({ "number": "seven" })));
        assert_eq!(pr, SourcePullRequest::default());

        let pr = SourcePullRequest::from(decode::<PullRequest>(json!(42)));
        assert_eq!(pr.number, None);
    }

    #[test]
    fn test_issue_marks_pull_requests_and_flattens_labels() {
        let issue = SourceIssue::from(decode::<Issue>(json!({
            "number": 3,
            "title": "Crash",
            "user": { "login": "carol" },
            "created_at": "2024-01-05T00:00:00Z",
            "closed_at": null,
            "labels": [{ "name": "bug" }, "legacy"],
            "assignees": [{ "login": "dave" }, {}]
        })));

        assert!(!issue.is_pull_request);
        assert_eq!(issue.labels, vec!["bug".to_string(), "legacy".to_string()]);
        assert_eq!(issue.assignees, vec!["dave".to_string()]);

        let pr_shaped = SourceIssue::from(decode::<Issue>(json!({
            "number": 4,
            "pull_request": { "url": "https://api.github.com/repos/o/r/pulls/4" }
        })));
        assert!(pr_shaped.is_pull_request);
    }

    #[test]
    fn test_repository_requires_full_name() {
        assert!(decode::<Repository>(json!({ "private": true })).into_info().is_none());

        let info = decode::<Repository>(json!({ "full_name": "o/r", "archived": true })).into_info().unwrap();
        assert_eq!(info.full_name, "o/r");
        assert!(info.archived);
        assert!(!info.private);
    }
}
