//! Collection of repository activity over a period.
//!
//! [`Collector::collect`] checks the cache, then runs four sub-fetches (commits, pull requests,
//! reviews, issues) through the retry engine, filters each to the period, normalizes every
//! surviving record into a [`crate::model::ContributionEvent`], and writes the merged list back.

mod affiliation;
mod contributions;
mod normalize;

pub use affiliation::Affiliation;
pub use contributions::{CACHE_PREFIX, Collection, Collector};
pub use normalize::{NormalizeError, UNKNOWN_DEVELOPER, review_state};
