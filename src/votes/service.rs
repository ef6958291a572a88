use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::votes::ledger::{apply_vote, Direction, VoterState};
use crate::votes::repository::VoteRepository;
use crate::votes::subject::SubjectRef;

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("{0} not found")]
    NotFound(SubjectRef),

    #[error("Vote on {subject} kept conflicting after {attempts} attempts")]
    Conflict { subject: SubjectRef, attempts: u32 },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What the voter sees after a toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub score: i64,
    pub has_upvoted: bool,
    pub has_downvoted: bool,
    #[serde(skip)]
    pub karma_delta: i64,
}

/// Read-modify-write one vote, retrying on version conflicts with fresh state.
pub async fn cast_vote<R>(
    repo: &R,
    subject: &SubjectRef,
    voter_id: &str,
    direction: Direction,
    max_attempts: u32,
) -> Result<VoteReceipt, VoteError>
where
    R: VoteRepository + ?Sized,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let current = repo
            .find_votable(subject)
            .await?
            .filter(|v| !v.is_deleted())
            .ok_or_else(|| VoteError::NotFound(subject.clone()))?;

        let outcome = apply_vote(current.votes(), voter_id, direction);

        match repo
            .commit_vote(
                subject,
                current.version(),
                current.author_id(),
                voter_id,
                &outcome,
            )
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    %subject,
                    voter = voter_id,
                    %direction,
                    score = outcome.score,
                    karma_delta = outcome.karma_delta,
                    "Vote committed"
                );
                return Ok(VoteReceipt {
                    score: outcome.score,
                    has_upvoted: outcome.voter_state == VoterState::Up,
                    has_downvoted: outcome.voter_state == VoterState::Down,
                    karma_delta: outcome.karma_delta,
                });
            }
            Err(RepositoryError::Conflict(_)) => {
                tracing::debug!(%subject, attempt, "Vote conflict, retrying with fresh state");
            }
            Err(RepositoryError::NotFound(_)) => {
                return Err(VoteError::NotFound(subject.clone()));
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::warn!(%subject, attempts = max_attempts, "Giving up on contended vote");
    Err(VoteError::Conflict {
        subject: subject.clone(),
        attempts: max_attempts,
    })
}
