use std::fmt;

use crate::db::models::{Comment, Post};
use crate::votes::ledger::{VoteSets, VoterState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    Post,
    Comment,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Post => "post",
            SubjectKind::Comment => "comment",
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            SubjectKind::Post => "posts",
            SubjectKind::Comment => "comments",
        }
    }
}

/// Identifies something that can be voted on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub id: String,
}

impl SubjectRef {
    pub fn post(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Post,
            id: id.into(),
        }
    }

    pub fn comment(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Comment,
            id: id.into(),
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Shared voting capability of posts and comments.
pub trait Votable: Send + Sync {
    fn subject(&self) -> SubjectRef;
    fn author_id(&self) -> &str;
    fn votes(&self) -> &VoteSets;
    /// Optimistic concurrency counter, bumped on every committed vote.
    fn version(&self) -> i64;
    fn is_deleted(&self) -> bool;

    fn score(&self) -> i64 {
        self.votes().score()
    }

    fn voter_state(&self, voter_id: &str) -> VoterState {
        self.votes().state_of(voter_id)
    }
}

impl Votable for Post {
    fn subject(&self) -> SubjectRef {
        SubjectRef::post(&self.id)
    }

    fn author_id(&self) -> &str {
        &self.author_id
    }

    fn votes(&self) -> &VoteSets {
        &self.votes
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}

impl Votable for Comment {
    fn subject(&self) -> SubjectRef {
        SubjectRef::comment(&self.id)
    }

    fn author_id(&self) -> &str {
        &self.author_id
    }

    fn votes(&self) -> &VoteSets {
        &self.votes
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}
