use super::client::Client;
use super::wire::{self, decode};
use crate::Result;
use crate::logging::{self, SharedLogger};
use crate::model::RepoName;
use crate::retry::SourceError;
use crate::source::{
    ListState, PullSort, RepositoryInfo, SortDirection, SourceCapability, SourceCommit, SourceIssue, SourcePullRequest, SourceReview,
};
use chrono::{DateTime, SecondsFormat, Utc};
use core::fmt::{Debug, Formatter};
use core::time::Duration;
use log::Level;
use ohno::IntoAppError;
use std::future::Future;
use tokio::runtime::{Builder, Runtime};

const LOG_TARGET: &str = "    github";

/// Default public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("contrib-ingest/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`GitHubSource`].
#[derive(Debug, Clone)]
pub struct GitHubOptions {
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,

    /// Fetch each commit's detail to learn files changed, additions and deletions.
    pub fetch_commit_stats: bool,
}

impl Default for GitHubOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            request_timeout: Duration::from_secs(30),
            fetch_commit_stats: true,
        }
    }
}

/// [`SourceCapability`] backed by the GitHub REST API.
///
/// The HTTP client is asynchronous; a private current-thread runtime drives each call to
/// completion so callers stay synchronous.
pub struct GitHubSource {
    client: Client,
    runtime: Runtime,
    fetch_commit_stats: bool,
    logger: SharedLogger,
}

impl Debug for GitHubSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GitHubSource")
            .field("base_url", &self.client.base_url())
            .field("fetch_commit_stats", &self.fetch_commit_stats)
            .finish_non_exhaustive()
    }
}

impl GitHubSource {
    pub fn new(options: &GitHubOptions) -> Result<Self> {
        let client = Client::new(
            options.token.as_deref(),
            options.base_url.as_str(),
            USER_AGENT,
            options.request_timeout,
        )?;

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .into_app_err("unable to start the HTTP runtime")?;

        Ok(Self {
            client,
            runtime,
            fetch_commit_stats: options.fetch_commit_stats,
            logger: logging::global(),
        })
    }

    #[must_use]
    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn repo_url(&self, repo: &RepoName, suffix: &str) -> String {
        format!("{}/repos/{}/{}{suffix}", self.client.base_url(), repo.owner(), repo.name())
    }

    fn list<T, R>(&self, url: &str) -> Result<Vec<R>, SourceError>
    where
        T: serde::de::DeserializeOwned + Default + Into<R>,
    {
        emit!(self.logger, Level::Debug, "Listing '{url}'");
        let items = self.block_on(self.client.get_pages(url))?;
        Ok(items.into_iter().map(|item| decode::<T>(item).into()).collect())
    }

    fn commit_detail(&self, repo: &RepoName, sha: &str) -> Result<SourceCommit, SourceError> {
        let url = self.repo_url(repo, &format!("/commits/{sha}"));
        let value = self.block_on(self.client.get_json::<serde_json::Value>(&url))?;
        Ok(decode::<wire::Commit>(value).into())
    }
}

fn query_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl SourceCapability for GitHubSource {
    fn get_repository(&self, repo: &RepoName) -> Result<RepositoryInfo, SourceError> {
        let url = self.repo_url(repo, "");
        let value = self.block_on(self.client.get_json::<serde_json::Value>(&url))?;

        decode::<wire::Repository>(value)
            .into_info()
            .ok_or_else(|| SourceError::transport(format!("repository response for '{repo}' has no full_name")))
    }

    fn list_commits(&self, repo: &RepoName, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<SourceCommit>, SourceError> {
        let url = self.repo_url(repo, &format!("/commits?since={}&until={}", query_time(since), query_time(until)));
        let commits: Vec<SourceCommit> = self.list::<wire::Commit, _>(&url)?;

        if !self.fetch_commit_stats {
            return Ok(commits);
        }

        commits
            .into_iter()
            .map(|commit| match commit.sha.as_deref() {
                Some(sha) if commit.stats.is_none() => {
                    let detail = self.commit_detail(repo, sha)?;
                    Ok(SourceCommit {
                        stats: detail.stats,
                        ..commit
                    })
                }
                _ => Ok(commit),
            })
            .collect()
    }

    fn list_pull_requests(
        &self,
        repo: &RepoName,
        state: ListState,
        sort: PullSort,
        direction: SortDirection,
    ) -> Result<Vec<SourcePullRequest>, SourceError> {
        let url = self.repo_url(repo, &format!("/pulls?state={state}&sort={sort}&direction={direction}"));
        self.list::<wire::PullRequest, _>(&url)
    }

    fn get_pull_request(&self, repo: &RepoName, number: u64) -> Result<SourcePullRequest, SourceError> {
        let url = self.repo_url(repo, &format!("/pulls/{number}"));
        let value = self.block_on(self.client.get_json::<serde_json::Value>(&url))?;
        Ok(decode::<wire::PullRequest>(value).into())
    }

    fn list_reviews(&self, repo: &RepoName, pull_request: u64) -> Result<Vec<SourceReview>, SourceError> {
        let url = self.repo_url(repo, &format!("/pulls/{pull_request}/reviews"));
        self.list::<wire::Review, _>(&url)
    }

    fn list_issues(&self, repo: &RepoName, state: ListState, since: Option<DateTime<Utc>>) -> Result<Vec<SourceIssue>, SourceError> {
        let suffix = since.map_or_else(
            || format!("/issues?state={state}"),
            |since| format!("/issues?state={state}&since={}", query_time(since)),
        );

        self.list::<wire::Issue, _>(&self.repo_url(repo, &suffix))
    }

    fn is_organization_member(&self, org: &str, user: &str) -> Result<bool, SourceError> {
        let url = format!("{}/orgs/{org}/members/{user}", self.client.base_url());
        self.block_on(self.client.probe(&url))
    }

    fn is_repository_collaborator(&self, repo: &RepoName, user: &str) -> Result<bool, SourceError> {
        let url = self.repo_url(repo, &format!("/collaborators/{user}"));
        self.block_on(self.client.probe(&url))
    }

    fn list_organization_repositories(&self, org: &str) -> Result<Vec<RepositoryInfo>, SourceError> {
        let url = format!("{}/orgs/{org}/repos?type=all", self.client.base_url());
        emit!(self.logger, Level::Debug, "Listing '{url}'");

        let items = self.block_on(self.client.get_pages(&url))?;
        Ok(items
            .into_iter()
            .filter_map(|item| decode::<wire::Repository>(item).into_info())
            .collect())
    }
}
