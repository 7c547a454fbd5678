use serde::{Deserialize, Serialize};
use strum::Display;

/// How a developer relates to the organization that owns a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Affiliation {
    /// Member of the owning organization
    Member,

    /// Not a member, but a collaborator on the repository
    OutsideCollaborator,

    /// Neither
    External,
}
