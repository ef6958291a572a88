pub mod assembler;
pub mod depth;
pub mod repository;

pub use assembler::{assemble, assemble_checked, CommentNode, CommentRecord};
pub use depth::{resolve_placement, Placement};
pub use repository::{CommentRepository, NewComment, SqliteCommentRepository};

use crate::db::RepositoryError;

/// Place a new comment under its parent (or at the root) and store it.
pub async fn post_comment<R>(
    repo: &R,
    post_id: &str,
    author_id: &str,
    content: String,
    parent_id: Option<&str>,
    max_depth: i64,
) -> Result<CommentRecord, RepositoryError>
where
    R: CommentRepository + ?Sized,
{
    let placement = resolve_placement(repo, post_id, parent_id, max_depth).await;

    let record = repo
        .create_comment(NewComment {
            post_id: post_id.to_string(),
            parent_id: placement.parent_id,
            depth: placement.depth,
            author_id: author_id.to_string(),
            content,
        })
        .await?;

    tracing::debug!(comment = %record.id, post = %post_id, depth = record.depth, "Comment created");
    Ok(record)
}

/// Fetch and assemble the reply tree of a post.
pub async fn load_thread<R>(repo: &R, post_id: &str) -> Result<Vec<CommentNode>, RepositoryError>
where
    R: CommentRepository + ?Sized,
{
    let flat = repo.list_comments_for_post(post_id).await?;
    Ok(assemble(flat))
}
