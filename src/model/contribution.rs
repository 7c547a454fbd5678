use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use strum::{Display as StrumDisplay, EnumString};

/// Kind-specific details attached to an event.
pub type Metadata = BTreeMap<String, Value>;

/// The four kinds of activity collected from a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, StrumDisplay, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContributionKind {
    Commit,
    PullRequest,
    Review,
    Issue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueState {
    Open,
    Closed,
}

/// The state of an event, tied to its kind.
///
/// Commits carry no state, so there is no commit variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContributionState {
    PullRequest(PullRequestState),
    Review(ReviewState),
    Issue(IssueState),
}

impl ContributionState {
    #[must_use]
    pub const fn kind(&self) -> ContributionKind {
        match self {
            Self::PullRequest(_) => ContributionKind::PullRequest,
            Self::Review(_) => ContributionKind::Review,
            Self::Issue(_) => ContributionKind::Issue,
        }
    }

    fn parse(kind: ContributionKind, text: &str) -> Option<Self> {
        let quoted = Value::String(text.to_string());
        match kind {
            ContributionKind::Commit => None,
            ContributionKind::PullRequest => serde_json::from_value(quoted).ok().map(Self::PullRequest),
            ContributionKind::Review => serde_json::from_value(quoted).ok().map(Self::Review),
            ContributionKind::Issue => serde_json::from_value(quoted).ok().map(Self::Issue),
        }
    }
}

impl Display for ContributionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PullRequest(s) => Display::fmt(s, f),
            Self::Review(s) => Display::fmt(s, f),
            Self::Issue(s) => Display::fmt(s, f),
        }
    }
}

/// One normalized unit of repository activity.
///
/// Built only through the per-kind constructors, so the state always belongs to the kind.
/// Deserialization checks the same rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventRecord", into = "EventRecord")]
pub struct ContributionEvent {
    id: String,
    kind: ContributionKind,
    timestamp: DateTime<Utc>,
    repository: String,
    developer: String,
    title: Option<String>,
    state: Option<ContributionState>,
    metadata: Metadata,
}

/// Common fields shared by every kind of event.
#[derive(Debug, Clone)]
pub struct EventHeader {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub repository: String,
    pub developer: String,
    pub title: Option<String>,
}

impl ContributionEvent {
    #[must_use]
    pub fn commit(header: EventHeader, metadata: Metadata) -> Self {
        Self::assemble(header, ContributionKind::Commit, None, metadata)
    }

    #[must_use]
    pub fn pull_request(header: EventHeader, state: PullRequestState, metadata: Metadata) -> Self {
        Self::assemble(header, ContributionKind::PullRequest, Some(ContributionState::PullRequest(state)), metadata)
    }

    #[must_use]
    pub fn review(header: EventHeader, state: ReviewState, metadata: Metadata) -> Self {
        Self::assemble(header, ContributionKind::Review, Some(ContributionState::Review(state)), metadata)
    }

    #[must_use]
    pub fn issue(header: EventHeader, state: IssueState, metadata: Metadata) -> Self {
        Self::assemble(header, ContributionKind::Issue, Some(ContributionState::Issue(state)), metadata)
    }

    fn assemble(header: EventHeader, kind: ContributionKind, state: Option<ContributionState>, metadata: Metadata) -> Self {
        Self {
            id: header.id,
            kind,
            timestamp: header.timestamp,
            repository: header.repository,
            developer: header.developer,
            title: header.title,
            state,
            metadata,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn kind(&self) -> ContributionKind {
        self.kind
    }

    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    #[must_use]
    pub fn developer(&self) -> &str {
        &self.developer
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub const fn state(&self) -> Option<ContributionState> {
        self.state
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EventRecord {
    id: String,
    kind: ContributionKind,
    timestamp: DateTime<Utc>,
    repository: String,
    developer: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

impl TryFrom<EventRecord> for ContributionEvent {
    type Error = String;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let state = match record.state.as_deref() {
            None => None,
            Some(text) => Some(
                ContributionState::parse(record.kind, text)
                    .ok_or_else(|| format!("state '{text}' is not valid for a {} event", record.kind))?,
            ),
        };

        Ok(Self {
            id: record.id,
            kind: record.kind,
            timestamp: record.timestamp,
            repository: record.repository,
            developer: record.developer,
            title: record.title,
            state,
            metadata: record.metadata,
        })
    }
}

impl From<ContributionEvent> for EventRecord {
    fn from(event: ContributionEvent) -> Self {
        Self {
            id: event.id,
            kind: event.kind,
            timestamp: event.timestamp,
            repository: event.repository,
            developer: event.developer,
            title: event.title,
            state: event.state.map(|s| s.to_string()),
            metadata: event.metadata,
        }
    }
}
