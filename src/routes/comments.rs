use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::posts::live_post;
use crate::routes::VoteRequest;
use crate::state::AppState;
use crate::threads;
use crate::validation;
use crate::votes::{self, SubjectRef, VoteReceipt};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts/{id}/comments", get(list).post(create))
        .route("/api/comments/{id}", delete(remove))
        .route("/api/comments/{id}/vote", post(vote))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<String>,
}

/// GET /api/posts/{id}/comments
async fn list(State(state): State<AppState>, Path(post_id): Path<String>) -> AppResult<Json<Value>> {
    {
        let conn = state.db.get()?;
        live_post(&conn, &post_id)?;
    }

    let comments = threads::load_thread(state.comments.as_ref(), &post_id).await?;
    Ok(Json(json!({ "comments": comments })))
}

/// POST /api/posts/{id}/comments
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Response> {
    let content = validation::comment_content(&req.content)?;
    let parent_id = req
        .parent_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let comment = threads::post_comment(
        state.comments.as_ref(),
        &post_id,
        &user.id,
        content,
        parent_id,
        state.config.threads.max_depth,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "comment": comment }))).into_response())
}

/// DELETE /api/comments/{id}
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let comment = state
        .comments
        .find_comment(&id)
        .await?
        .filter(|c| !c.is_deleted)
        .ok_or(AppError::NotFound)?;

    if comment.author_id != user.id {
        let conn = state.db.get()?;
        let post = queries::load_post(&conn, &comment.post_id)?.ok_or(AppError::NotFound)?;
        if !queries::is_moderator(&conn, &post.community_id, &user.id)? {
            return Err(AppError::Forbidden);
        }
    }

    if !state.comments.delete_comment(&id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(comment = %id, by = %user.id, "Comment deleted");

    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}

/// POST /api/comments/{id}/vote
async fn vote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<Json<VoteReceipt>> {
    let direction = req.direction()?;
    let receipt = votes::cast_vote(
        state.votes.as_ref(),
        &SubjectRef::comment(id),
        &user.id,
        direction,
        state.config.votes.max_attempts,
    )
    .await?;
    Ok(Json(receipt))
}
