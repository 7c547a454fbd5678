//! Record, period, and repository types shared by the pipeline.

mod contribution;
mod repo_name;
mod time_period;

pub use contribution::{
    ContributionEvent, ContributionKind, ContributionState, EventHeader, IssueState, Metadata, PullRequestState, ReviewState,
};
pub use repo_name::RepoName;
pub use time_period::{PeriodError, PeriodKind, TimePeriod};
