use async_trait::async_trait;
use rusqlite::params;
use std::sync::Arc;

use crate::db::models::Comment;
use crate::db::{self, queries, RepositoryError};
use crate::state::DbPool;
use crate::threads::assembler::CommentRecord;

/// A comment about to be stored, already placed in its thread.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: String,
    pub parent_id: Option<String>,
    pub depth: i64,
    pub author_id: String,
    pub content: String,
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn find_comment(&self, id: &str) -> Result<Option<Comment>, RepositoryError>;

    /// Every comment of a post, deleted ones included, oldest first
    async fn list_comments_for_post(
        &self,
        post_id: &str,
    ) -> Result<Vec<CommentRecord>, RepositoryError>;

    /// Insert the comment and bump the post's comment counter together
    async fn create_comment(&self, new: NewComment) -> Result<CommentRecord, RepositoryError>;

    /// Soft delete. Returns false if there was nothing live to delete.
    async fn delete_comment(&self, id: &str) -> Result<bool, RepositoryError>;
}

pub struct SqliteCommentRepository {
    pool: DbPool,
}

impl SqliteCommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const RECORD_SELECT: &str = "SELECT c.id, c.post_id, c.parent_id, c.depth, c.author_id, u.username,
            c.content, c.score, c.is_deleted, c.created_at
     FROM comments c
     JOIN users u ON u.id = c.author_id";

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_id: row.get(2)?,
        depth: row.get(3)?,
        author_id: row.get(4)?,
        author_username: row.get(5)?,
        content: row.get(6)?,
        score: row.get(7)?,
        is_deleted: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[async_trait]
impl CommentRepository for SqliteCommentRepository {
    async fn find_comment(&self, id: &str) -> Result<Option<Comment>, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(queries::load_comment(&conn, id)?)
    }

    async fn list_comments_for_post(
        &self,
        post_id: &str,
    ) -> Result<Vec<CommentRecord>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.rowid ASC",
            RECORD_SELECT
        ))?;
        let records = stmt
            .query_map(params![post_id], map_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn create_comment(&self, new: NewComment) -> Result<CommentRecord, RepositoryError> {
        let conn = self.pool.get()?;
        let id = db::new_id();
        let now = db::now_timestamp();

        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<(), RepositoryError> = (|| {
            let bumped = conn.execute(
                "UPDATE posts SET comment_count = comment_count + 1
                 WHERE id = ?1 AND is_deleted = 0",
                params![new.post_id],
            )?;
            if bumped == 0 {
                return Err(RepositoryError::NotFound(format!("post {}", new.post_id)));
            }

            conn.execute(
                "INSERT INTO comments (id, post_id, parent_id, author_id, content, depth, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id,
                    new.post_id,
                    new.parent_id,
                    new.author_id,
                    new.content,
                    new.depth,
                    now
                ],
            )?;

            Ok(())
        })();

        db::finish_transaction(&conn, result)?;

        let record = conn.query_row(
            &format!("{} WHERE c.id = ?1", RECORD_SELECT),
            params![id],
            map_record,
        )?;
        Ok(record)
    }

    async fn delete_comment(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE comments SET is_deleted = 1, updated_at = ?1 WHERE id = ?2 AND is_deleted = 0",
            params![db::now_timestamp(), id],
        )?;
        Ok(rows > 0)
    }
}

pub type DynCommentRepository = Arc<dyn CommentRepository>;
