use crate::Result;
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use ohno::bail;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// A repository identified by owner and name.
///
/// Parsed from `owner/name` or from a repository URL such as
/// `https://github.com/owner/name.git`. Extra URL path segments are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName {
    owner: Arc<str>,
    name: Arc<str>,
}

impl RepoName {
    pub fn new(owner: impl AsRef<str>, name: impl AsRef<str>) -> Result<Self> {
        let owner = owner.as_ref().trim();
        let name = name.as_ref().trim().trim_end_matches(".git");

        if owner.is_empty() || name.is_empty() {
            bail!("invalid repository '{owner}/{name}': empty owner or repository name");
        }

        if owner.contains(char::is_whitespace) || name.contains(char::is_whitespace) {
            bail!("invalid repository '{owner}/{name}': names cannot contain whitespace");
        }

        Ok(Self {
            owner: Arc::from(owner),
            name: Arc::from(name),
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();

        if text.contains("://") {
            let Ok(url) = Url::parse(text) else {
                bail!("invalid repository URL '{text}'");
            };
            return Self::from_url(&url);
        }

        let segments: Vec<_> = text.split('/').collect();
        if segments.len() != 2 {
            bail!("invalid repository '{text}': expected the form 'owner/name'");
        }

        Self::new(segments[0], segments[1])
    }

    pub fn from_url(url: &Url) -> Result<Self> {
        let segments: Vec<_> = url.path_segments().map(Iterator::collect).unwrap_or_default();

        if segments.len() < 2 {
            bail!("invalid repository URL format: {url}");
        }

        Self::new(segments[0], segments[1])
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `owner/name` form.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// The `owner_name` form used inside cache keys.
    #[must_use]
    pub fn key_form(&self) -> String {
        format!("{}_{}", self.owner, self.name)
    }
}

impl Display for RepoName {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoName {
    type Err = ohno::AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoName {
    type Error = ohno::AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RepoName> for String {
    fn from(value: RepoName) -> Self {
        value.full_name()
    }
}
