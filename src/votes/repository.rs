// Repository pattern - all vote persistence goes through here
use async_trait::async_trait;
use rusqlite::params;
use std::sync::Arc;

use crate::db::{self, queries, RepositoryError};
use crate::state::DbPool;
use crate::votes::ledger::{VoteOutcome, VoterState};
use crate::votes::subject::{SubjectKind, SubjectRef, Votable};

#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Load the current vote state of a post or comment
    async fn find_votable(
        &self,
        subject: &SubjectRef,
    ) -> Result<Option<Box<dyn Votable>>, RepositoryError>;

    /// Atomically persist a toggle: vote row, stored score, version bump and
    /// the author's karma. Fails with `Conflict` if the subject's version is
    /// no longer `expected_version`.
    async fn commit_vote(
        &self,
        subject: &SubjectRef,
        expected_version: i64,
        author_id: &str,
        voter_id: &str,
        outcome: &VoteOutcome,
    ) -> Result<(), RepositoryError>;
}

/// SQLite implementation
pub struct SqliteVoteRepository {
    pool: DbPool,
}

impl SqliteVoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteRepository for SqliteVoteRepository {
    async fn find_votable(
        &self,
        subject: &SubjectRef,
    ) -> Result<Option<Box<dyn Votable>>, RepositoryError> {
        let conn = self.pool.get()?;

        let found: Option<Box<dyn Votable>> = match subject.kind {
            SubjectKind::Post => queries::load_post(&conn, &subject.id)?
                .map(|p| Box::new(p) as Box<dyn Votable>),
            SubjectKind::Comment => queries::load_comment(&conn, &subject.id)?
                .map(|c| Box::new(c) as Box<dyn Votable>),
        };

        Ok(found)
    }

    async fn commit_vote(
        &self,
        subject: &SubjectRef,
        expected_version: i64,
        author_id: &str,
        voter_id: &str,
        outcome: &VoteOutcome,
    ) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<(), RepositoryError> = (|| {
            // 1. Compare-and-swap on the version
            let updated = conn.execute(
                &format!(
                    "UPDATE {} SET score = ?1, version = version + 1, updated_at = ?2
                     WHERE id = ?3 AND version = ?4 AND is_deleted = 0",
                    subject.kind.table()
                ),
                params![
                    outcome.score,
                    db::now_timestamp(),
                    subject.id,
                    expected_version
                ],
            )?;

            if updated == 0 {
                let live: bool = conn.query_row(
                    &format!(
                        "SELECT COUNT(*) > 0 FROM {} WHERE id = ?1 AND is_deleted = 0",
                        subject.kind.table()
                    ),
                    params![subject.id],
                    |r| r.get(0),
                )?;
                return Err(if live {
                    RepositoryError::Conflict(format!("{} changed concurrently", subject))
                } else {
                    RepositoryError::NotFound(subject.to_string())
                });
            }

            // 2. Rewrite this voter's row
            conn.execute(
                "DELETE FROM votes WHERE subject_kind = ?1 AND subject_id = ?2 AND voter_id = ?3",
                params![subject.kind.as_str(), subject.id, voter_id],
            )?;

            let direction = match outcome.voter_state {
                VoterState::Up => Some("up"),
                VoterState::Down => Some("down"),
                VoterState::None => None,
            };
            if let Some(direction) = direction {
                conn.execute(
                    "INSERT INTO votes (subject_kind, subject_id, voter_id, direction)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![subject.kind.as_str(), subject.id, voter_id, direction],
                )?;
            }

            // 3. Author karma
            let credited = conn.execute(
                "UPDATE users SET karma = karma + ?1 WHERE id = ?2",
                params![outcome.karma_delta, author_id],
            )?;
            if credited == 0 {
                return Err(RepositoryError::NotFound(format!("user {}", author_id)));
            }

            Ok(())
        })();

        db::finish_transaction(&conn, result)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynVoteRepository = Arc<dyn VoteRepository>;
