use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::threads::repository::{DynCommentRepository, SqliteCommentRepository};
use crate::votes::repository::{DynVoteRepository, SqliteVoteRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub votes: DynVoteRepository,
    pub comments: DynCommentRepository,
}

impl AppState {
    /// Wire the SQLite repositories onto a pool.
    pub fn new(db: DbPool, config: Config) -> Self {
        Self {
            votes: Arc::new(SqliteVoteRepository::new(db.clone())),
            comments: Arc::new(SqliteCommentRepository::new(db.clone())),
            db,
            config,
        }
    }
}
