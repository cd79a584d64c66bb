//! Entity type definitions for the schema registry
//!
//! Entity types form a shallow dependency graph rooted at `Issue`.

use std::fmt;

/// A category of remote entity with its own field schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    /// Root entity; every record starts from an issue
    Issue,

    /// Pull request behind an issue
    Pr,

    /// Commit of a pull request
    Commit,

    /// Comment on an issue
    Comment,
}

impl EntityType {
    /// Returns the key used in config files and output records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Pr => "pr",
            Self::Commit => "commit",
            Self::Comment => "comment",
        }
    }

    /// Parses an entity type from its key
    pub fn from_key(s: &str) -> Option<Self> {
        match s {
            "issue" => Some(Self::Issue),
            "pr" => Some(Self::Pr),
            "commit" => Some(Self::Commit),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }

    /// The entity this one is nested under, if any
    pub fn parent(&self) -> Option<Self> {
        match self {
            Self::Issue => None,
            Self::Pr | Self::Comment => Some(Self::Issue),
            Self::Commit => Some(Self::Pr),
        }
    }

    /// Returns all entity types, root first
    pub fn all() -> [Self; 4] {
        [Self::Issue, Self::Pr, Self::Commit, Self::Comment]
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
