use crate::model::RepoName;
use chrono::{DateTime, Utc};
use core::fmt::Display;
use std::collections::BTreeMap;

/// Builds deterministic cache keys.
///
/// Parts are joined with `_` in a fixed order: prefix, repository (`owner_name`), start date,
/// end date (both `YYYYMMDD`), then every extra parameter as `name_value`, sorted by name.
/// The order in which extras are added does not matter.
#[derive(Debug, Clone)]
pub struct CacheKey {
    prefix: String,
    repository: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    extra: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            repository: None,
            start: None,
            end: None,
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn repository(mut self, repository: &RepoName) -> Self {
        self.repository = Some(repository.key_form());
        self
    }

    #[must_use]
    pub const fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    #[must_use]
    pub const fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Add a named parameter. A later value for the same name replaces the earlier one.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Display) -> Self {
        let _ = self.extra.insert(name.into(), value.to_string());
        self
    }

    #[must_use]
    pub fn build(&self) -> String {
        let mut parts = vec![self.prefix.clone()];

        if let Some(repository) = &self.repository {
            parts.push(repository.clone());
        }

        if let Some(start) = self.start {
            parts.push(start.format("%Y%m%d").to_string());
        }

        if let Some(end) = self.end {
            parts.push(end.format("%Y%m%d").to_string());
        }

        parts.extend(self.extra.iter().map(|(name, value)| format!("{name}_{value}")));
        parts.join("_")
    }
}
