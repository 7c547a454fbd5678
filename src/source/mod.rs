//! Read access to the remote activity source.
//!
//! [`SourceCapability`] is the seam between the collector and the network. Every operation
//! paginates internally and reports failure as a [`SourceError`] that already carries its
//! [`crate::retry::FailureClass`], so the retry engine never has to inspect raw responses.

pub mod github;
mod records;

use crate::model::RepoName;
use crate::retry::SourceError;
use chrono::{DateTime, Utc};

pub use records::{
    CommitStats, ListState, PullSort, RepositoryInfo, SortDirection, SourceCommit, SourceIssue, SourcePullRequest, SourceReview,
};

/// Paginated read operations against a remote repository host.
pub trait SourceCapability {
    fn get_repository(&self, repo: &RepoName) -> Result<RepositoryInfo, SourceError>;

    /// Commits authored between `since` and `until`.
    fn list_commits(&self, repo: &RepoName, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<SourceCommit>, SourceError>;

    fn list_pull_requests(
        &self,
        repo: &RepoName,
        state: ListState,
        sort: PullSort,
        direction: SortDirection,
    ) -> Result<Vec<SourcePullRequest>, SourceError>;

    /// A single pull request, including the comment counts list endpoints omit.
    fn get_pull_request(&self, repo: &RepoName, number: u64) -> Result<SourcePullRequest, SourceError>;

    fn list_reviews(&self, repo: &RepoName, pull_request: u64) -> Result<Vec<SourceReview>, SourceError>;

    /// Issues updated at or after `since`. The result may include pull requests.
    fn list_issues(&self, repo: &RepoName, state: ListState, since: Option<DateTime<Utc>>) -> Result<Vec<SourceIssue>, SourceError>;

    fn is_organization_member(&self, org: &str, user: &str) -> Result<bool, SourceError>;

    fn is_repository_collaborator(&self, repo: &RepoName, user: &str) -> Result<bool, SourceError>;

    fn list_organization_repositories(&self, org: &str) -> Result<Vec<RepositoryInfo>, SourceError>;
}
