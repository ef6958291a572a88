// Vote ledger - pure toggle semantics, no side effects
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid vote direction: {0:?} (expected \"up\" or \"down\")")]
    InvalidDirection(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl FromStr for Direction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(LedgerError::InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a single voter stands on a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoterState {
    Up,
    Down,
    None,
}

/// Up/down voter sets. The score is always derived, never stored alongside
/// in a way that could drift.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSets {
    upvoters: BTreeSet<String>,
    downvoters: BTreeSet<String>,
}

impl VoteSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw sets. A voter listed in both is kept as an upvoter only.
    pub fn from_sets(upvoters: BTreeSet<String>, mut downvoters: BTreeSet<String>) -> Self {
        downvoters.retain(|id| !upvoters.contains(id));
        Self {
            upvoters,
            downvoters,
        }
    }

    pub fn upvoters(&self) -> &BTreeSet<String> {
        &self.upvoters
    }

    pub fn downvoters(&self) -> &BTreeSet<String> {
        &self.downvoters
    }

    pub fn score(&self) -> i64 {
        self.upvoters.len() as i64 - self.downvoters.len() as i64
    }

    pub fn state_of(&self, voter_id: &str) -> VoterState {
        if self.upvoters.contains(voter_id) {
            VoterState::Up
        } else if self.downvoters.contains(voter_id) {
            VoterState::Down
        } else {
            VoterState::None
        }
    }
}

/// Result of one toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    pub votes: VoteSets,
    pub score: i64,
    pub voter_state: VoterState,
    /// Applied to the subject author's karma, not the voter's.
    pub karma_delta: i64,
}

impl VoteOutcome {
    pub fn has_upvoted(&self) -> bool {
        self.voter_state == VoterState::Up
    }

    pub fn has_downvoted(&self) -> bool {
        self.voter_state == VoterState::Down
    }
}

/// Apply a toggle vote.
///
/// Voting in the direction already held removes the vote; voting against a
/// held vote switches it; otherwise the vote is added. The karma delta is the
/// change in the voter's contribution to the score (-2..=2).
pub fn apply_vote(current: &VoteSets, voter_id: &str, direction: Direction) -> VoteOutcome {
    let mut votes = current.clone();
    let before = current.state_of(voter_id);

    let karma_delta = match (direction, before) {
        (Direction::Up, VoterState::Up) => {
            votes.upvoters.remove(voter_id);
            -1
        }
        (Direction::Up, prior) => {
            votes.downvoters.remove(voter_id);
            votes.upvoters.insert(voter_id.to_string());
            if prior == VoterState::Down {
                2
            } else {
                1
            }
        }
        (Direction::Down, VoterState::Down) => {
            votes.downvoters.remove(voter_id);
            1
        }
        (Direction::Down, prior) => {
            votes.upvoters.remove(voter_id);
            votes.downvoters.insert(voter_id.to_string());
            if prior == VoterState::Up {
                -2
            } else {
                -1
            }
        }
    };

    let voter_state = votes.state_of(voter_id);
    let score = votes.score();

    VoteOutcome {
        votes,
        score,
        voter_state,
        karma_delta,
    }
}
