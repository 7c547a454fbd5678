use super::affiliation::Affiliation;
use super::normalize::{self, Dated, NormalizeError, PullRequestReview};
use crate::cache::Cache;
use crate::clock::{self, SharedClock};
use crate::logging::{self, SharedLogger};
use crate::model::{ContributionEvent, ContributionKind, RepoName, TimePeriod};
use crate::retry::{FailureClass, RetryEngine, RetryError, SourceError};
use crate::source::{ListState, PullSort, RepositoryInfo, SortDirection, SourceCapability, SourceIssue, SourcePullRequest};
use core::fmt::{Debug, Formatter};
use core::time::Duration;
use log::Level;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = " collector";

/// Prefix of every collection cache key.
pub const CACHE_PREFIX: &str = "contributions";

/// Events gathered for one repository over one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub repository: RepoName,
    pub period: TimePeriod,

    /// Commits, then pull requests, then reviews, then issues, each in source order
    pub events: Vec<ContributionEvent>,

    /// Whether the events came from the cache
    pub cached: bool,

    /// One line per kind that could not be fetched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Gathers the four kinds of activity for a repository and normalizes them into one list.
///
/// Each kind is fetched through the [`RetryEngine`]; a kind that still fails is logged and
/// contributes nothing instead of failing the whole collection.
pub struct Collector<S> {
    source: S,
    retry: RetryEngine,
    cache: Option<Cache>,
    historical_ttl: Option<Duration>,
    clock: SharedClock,
    logger: SharedLogger,
}

impl<S: Debug> Debug for Collector<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collector")
            .field("source", &self.source)
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .field("historical_ttl", &self.historical_ttl)
            .finish_non_exhaustive()
    }
}

impl<S: SourceCapability> Collector<S> {
    pub fn new(source: S, retry: RetryEngine) -> Self {
        Self {
            source,
            retry,
            cache: None,
            historical_ttl: None,
            clock: clock::system(),
            logger: logging::global(),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// TTL used instead of the cache default for periods that ended before today.
    #[must_use]
    pub const fn with_historical_ttl(mut self, ttl: Duration) -> Self {
        self.historical_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }

    /// Cache key under which the collection for `repo` over `period` is stored.
    #[must_use]
    pub fn cache_key(repo: &RepoName, period: &TimePeriod) -> String {
        Cache::derive_key(CACHE_PREFIX, Some(repo), Some(period.start()), Some(period.end()), &[])
    }

    /// Collect every event of `repo` that falls within `period`.
    ///
    /// With `use_cache`, a fresh cached result is returned as is. A newly fetched result is
    /// written back whenever a cache is attached, replacing any stale entry.
    pub fn collect(&self, repo: &RepoName, period: &TimePeriod, use_cache: bool) -> Collection {
        let cache = self.cache.as_ref();
        let key = Self::cache_key(repo, period);

        if let Some(events) = cache.filter(|_| use_cache).and_then(|c| c.get::<Vec<ContributionEvent>>(&key)) {
            emit!(self.logger, Level::Debug, "Using cached contributions for '{repo}' ({period})");
            return Collection {
                repository: repo.clone(),
                period: *period,
                events,
                cached: true,
                warnings: Vec::new(),
            };
        }

        emit!(self.logger, Level::Info, "Collecting contributions for '{repo}' ({period})");

        let mut warnings = Vec::new();
        let mut events = Vec::new();

        events.extend(self.fetch_kind(
            ContributionKind::Commit,
            repo,
            period,
            &mut warnings,
            || self.source.list_commits(repo, period.start(), period.end()),
            normalize::commit,
        ));

        events.extend(self.fetch_kind(
            ContributionKind::PullRequest,
            repo,
            period,
            &mut warnings,
            || self.pull_requests_with_counts(repo, period),
            normalize::pull_request,
        ));

        events.extend(self.fetch_kind(
            ContributionKind::Review,
            repo,
            period,
            &mut warnings,
            || self.reviews(repo, period),
            normalize::review,
        ));

        events.extend(self.fetch_kind(
            ContributionKind::Issue,
            repo,
            period,
            &mut warnings,
            || self.issues(repo, period),
            normalize::issue,
        ));

        emit!(self.logger, Level::Info, "Collected {} contributions for '{repo}'", events.len());

        if let Some(cache) = cache {
            let ttl = self
                .historical_ttl
                .filter(|_| period.ended_before_day_of(self.clock.now()));

            if let Err(e) = cache.set(&key, &events, ttl) {
                emit!(self.logger, Level::Warn, "Could not cache contributions for '{repo}': {e:#}");
            }
        }

        Collection {
            repository: repo.clone(),
            period: *period,
            events,
            cached: false,
            warnings,
        }
    }

    /// Repository metadata, with retries.
    pub fn repository(&self, repo: &RepoName) -> Result<RepositoryInfo, RetryError> {
        self.retry
            .execute(&format!("get_repository_{repo}"), None, || self.source.get_repository(repo))
    }

    /// Every repository of an organization, with retries.
    pub fn organization_repositories(&self, org: &str) -> Result<Vec<RepositoryInfo>, RetryError> {
        self.retry.execute(&format!("list_repositories_{org}"), None, || {
            self.source.list_organization_repositories(org)
        })
    }

    /// Classify `user` against `org` and `repo`: membership first, then collaboration.
    ///
    /// A lookup that fails is logged and treated as a negative answer.
    pub fn classify_developer(&self, org: &str, repo: &RepoName, user: &str) -> Affiliation {
        let member = self.retry.execute(&format!("check_member_{org}_{user}"), None, || {
            self.source.is_organization_member(org, user)
        });

        match member {
            Ok(true) => return Affiliation::Member,
            Ok(false) => {}
            Err(e) => emit!(self.logger, Level::Warn, "Could not check whether '{user}' belongs to '{org}': {e}"),
        }

        let collaborator = self.retry.execute(&format!("check_collaborator_{repo}_{user}"), None, || {
            self.source.is_repository_collaborator(repo, user)
        });

        match collaborator {
            Ok(true) => Affiliation::OutsideCollaborator,
            Ok(false) => Affiliation::External,
            Err(e) => {
                emit!(self.logger, Level::Warn, "Could not check whether '{user}' collaborates on '{repo}': {e}");
                Affiliation::External
            }
        }
    }

    /// Run one sub-fetch under the retry engine, then filter it to the period and normalize.
    fn fetch_kind<R, F, N>(
        &self,
        kind: ContributionKind,
        repo: &RepoName,
        period: &TimePeriod,
        warnings: &mut Vec<String>,
        fetch: F,
        normalize: N,
    ) -> Vec<ContributionEvent>
    where
        R: Dated,
        F: FnMut() -> Result<Vec<R>, SourceError>,
        N: Fn(&RepoName, R) -> Result<ContributionEvent, NormalizeError>,
    {
        let operation_id = format!("collect_{kind}_{repo}");
        let checkpoint_key = format!("{kind}_{}_{}", repo.key_form(), period.start().date_naive());

        let records = match self.retry.execute(&operation_id, Some(&checkpoint_key), fetch) {
            Ok(records) => records,
            Err(e) => {
                emit!(self.logger, Level::Warn, "Skipping {kind} events for '{repo}': {e}");
                warnings.push(format!("{kind} events for '{repo}' were not collected: {e}"));
                return Vec::new();
            }
        };

        let fetched = records.len();
        let mut dropped = 0usize;
        let mut events = Vec::new();

        for record in records {
            let Some(at) = record.occurred_at() else {
                dropped += 1;
                let e = NormalizeError::MissingField {
                    kind: R::KIND,
                    field: R::TIMESTAMP_FIELD,
                };
                emit!(self.logger, Level::Warn, "Dropping record from '{repo}': {e}");
                continue;
            };

            if !period.contains(at) {
                continue;
            }

            match normalize(repo, record) {
                Ok(event) => events.push(event),
                Err(e) => {
                    dropped += 1;
                    emit!(self.logger, Level::Warn, "Dropping record from '{repo}': {e}");
                }
            }
        }

        emit!(
            self.logger,
            Level::Debug,
            "{kind}: {fetched} fetched, {} in period, {dropped} dropped for '{repo}'",
            events.len()
        );

        events
    }

    /// Pull requests created in the period, with comment counts filled in where possible.
    fn pull_requests_with_counts(&self, repo: &RepoName, period: &TimePeriod) -> Result<Vec<SourcePullRequest>, SourceError> {
        let pulls = self
            .source
            .list_pull_requests(repo, ListState::All, PullSort::Created, SortDirection::Desc)?;

        let mut selected = Vec::new();
        for pull in pulls {
            match pull.created_at {
                // kept so normalization reports it
                None => {
                    selected.push(pull);
                    continue;
                }
                Some(at) if !period.contains(at) => continue,
                Some(_) => {}
            }

            let pull = match pull.number {
                Some(number) if !pull.has_counts() => match self.source.get_pull_request(repo, number) {
                    Ok(detail) => SourcePullRequest {
                        review_comments: detail.review_comments,
                        comments: detail.comments,
                        ..pull
                    },
                    Err(e) if e.class() == FailureClass::ClientError => {
                        emit!(self.logger, Level::Debug, "No detail for pull request #{number} of '{repo}': {e}");
                        pull
                    }
                    Err(e) => return Err(e),
                },
                _ => pull,
            };

            selected.push(pull);
        }

        Ok(selected)
    }

    /// Reviews of every pull request that could have been reviewed during the period.
    fn reviews(&self, repo: &RepoName, period: &TimePeriod) -> Result<Vec<PullRequestReview>, SourceError> {
        let pulls = self
            .source
            .list_pull_requests(repo, ListState::All, PullSort::Created, SortDirection::Desc)?;

        let mut reviews = Vec::new();
        for pull in pulls {
            let Some(number) = pull.number else {
                continue;
            };

            // a pull request opened after the period cannot hold reviews from within it
            if pull.created_at.is_some_and(|at| at > period.end()) {
                continue;
            }

            match self.source.list_reviews(repo, number) {
                Ok(batch) => reviews.extend(batch.into_iter().map(|review| PullRequestReview {
                    pull_request: number,
                    review,
                })),
                Err(e) if e.class() == FailureClass::ClientError => {
                    emit!(self.logger, Level::Warn, "Skipping reviews of pull request #{number} in '{repo}': {e}");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(reviews)
    }

    /// Issues, without the pull requests the issue listing also returns.
    fn issues(&self, repo: &RepoName, period: &TimePeriod) -> Result<Vec<SourceIssue>, SourceError> {
        let issues = self.source.list_issues(repo, ListState::All, Some(period.start()))?;
        Ok(issues.into_iter().filter(|issue| !issue.is_pull_request).collect())
    }
}
