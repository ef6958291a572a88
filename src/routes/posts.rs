use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::models::Post;
use crate::db::{self, queries};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::ranking::{self, SortOrder};
use crate::routes::{offset, VoteRequest};
use crate::state::AppState;
use crate::validation;
use crate::votes::{self, SubjectRef, VoteReceipt, VoterState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list).post(create))
        .route("/api/posts/{id}", get(show).put(update).delete(remove))
        .route("/api/posts/{id}/vote", post(vote))
}

#[derive(Deserialize, Default)]
pub struct PostListParams {
    pub community: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub content: Option<String>,
    pub image: Option<String>,
    pub community_id: String,
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// A post as seen by a particular viewer.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub has_upvoted: bool,
    pub has_downvoted: bool,
}

impl PostView {
    pub fn new(post: Post, viewer_id: Option<&str>) -> Self {
        let state = viewer_id
            .map(|id| post.votes.state_of(id))
            .unwrap_or(VoterState::None);
        Self {
            has_upvoted: state == VoterState::Up,
            has_downvoted: state == VoterState::Down,
            post,
        }
    }
}

/// Which posts a feed draws from.
#[derive(Debug, Default)]
pub struct FeedFilter {
    pub community_id: Option<String>,
    pub search: Option<String>,
}

/// Load one page of live posts in the requested order.
///
/// Hot ordering scores the `hot_window` most recent matches in memory and
/// pages over that ranked window.
pub fn feed(
    conn: &Connection,
    filter: &FeedFilter,
    sort: SortOrder,
    limit: u32,
    offset: u32,
    hot_window: u32,
) -> rusqlite::Result<Vec<Post>> {
    let pattern = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()));

    let order = match sort {
        SortOrder::New | SortOrder::Hot => "p.created_at DESC, p.rowid DESC",
        SortOrder::Top => "p.score DESC, p.created_at DESC, p.rowid DESC",
    };
    let (sql_limit, sql_offset) = match sort {
        SortOrder::Hot => (hot_window.max(limit), 0),
        _ => (limit, offset),
    };

    let mut stmt = conn.prepare(&format!(
        "{} WHERE p.is_deleted = 0
            AND (?1 IS NULL OR p.community_id = ?1)
            AND (?2 IS NULL OR lower(p.title) LIKE ?2 OR lower(coalesce(p.content, '')) LIKE ?2)
         ORDER BY {}
         LIMIT ?3 OFFSET ?4",
        queries::POST_SELECT,
        order
    ))?;
    let mut posts = stmt
        .query_map(
            params![filter.community_id, pattern, sql_limit, sql_offset],
            queries::map_post,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    if sort == SortOrder::Hot {
        ranking::rank_hot(&mut posts, Utc::now());
        posts = posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
    }

    Ok(posts)
}

/// GET /api/posts
async fn list(
    State(state): State<AppState>,
    Query(params): Query<PostListParams>,
) -> AppResult<Json<Value>> {
    let limit = state.config.page_size(params.limit);
    let sort: SortOrder = params.sort.as_deref().unwrap_or("hot").parse().unwrap_or_default();

    let conn = state.db.get()?;
    // An unknown community filter is ignored.
    let community_id = match params.community.as_deref() {
        Some(name) => queries::find_community_by_name(&conn, name)?.map(|c| c.id),
        None => None,
    };
    let filter = FeedFilter {
        community_id,
        search: params.search,
    };

    let posts = feed(
        &conn,
        &filter,
        sort,
        limit,
        offset(params.page, limit),
        state.config.feed.hot_window,
    )?;

    Ok(Json(json!({ "posts": posts })))
}

/// POST /api/posts
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Response> {
    let title = validation::title(&req.title)?;
    let content = validation::post_content(req.content.as_deref())?;
    let image = validation::url("Image", req.image.as_deref())?;

    let conn = state.db.get()?;
    let community =
        queries::find_community_by_id(&conn, &req.community_id)?.ok_or(AppError::NotFound)?;
    if !queries::is_member(&conn, &community.id, &user.id)? {
        return Err(AppError::Forbidden);
    }

    let id = db::new_id();
    let now = db::now_timestamp();
    conn.execute(
        "INSERT INTO posts (id, title, content, image, author_id, community_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![id, title, content, image, user.id, community.id, now],
    )?;

    let post = queries::load_post(&conn, &id)?.ok_or(AppError::NotFound)?;
    tracing::info!(post = %id, community = %community.name, author = %user.id, "Post created");

    Ok((StatusCode::CREATED, Json(json!({ "post": post }))).into_response())
}

/// GET /api/posts/{id}
async fn show(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let post = live_post(&conn, &id)?;
    let view = PostView::new(post, viewer.as_ref().map(|u| u.id.as_str()));
    Ok(Json(json!({ "post": view })))
}

/// PUT /api/posts/{id}
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let post = live_post(&conn, &id)?;
    if post.author_id != user.id {
        return Err(AppError::Forbidden);
    }

    let title = match req.title.as_deref() {
        Some(raw) => validation::title(raw)?,
        None => post.title,
    };
    let content = match req.content.as_deref() {
        Some(raw) => validation::post_content(Some(raw))?,
        None => post.content,
    };

    conn.execute(
        "UPDATE posts SET title = ?1, content = ?2, updated_at = ?3 WHERE id = ?4",
        params![title, content, db::now_timestamp(), id],
    )?;

    let updated = queries::load_post(&conn, &id)?.ok_or(AppError::NotFound)?;
    Ok(Json(json!({ "post": updated })))
}

/// DELETE /api/posts/{id}
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let post = live_post(&conn, &id)?;

    if post.author_id != user.id && !queries::is_moderator(&conn, &post.community_id, &user.id)? {
        return Err(AppError::Forbidden);
    }

    conn.execute(
        "UPDATE posts SET is_deleted = 1, updated_at = ?1 WHERE id = ?2",
        params![db::now_timestamp(), id],
    )?;
    tracing::info!(post = %id, by = %user.id, "Post deleted");

    Ok(Json(json!({ "message": "Post deleted successfully" })))
}

/// POST /api/posts/{id}/vote
async fn vote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<Json<VoteReceipt>> {
    let direction = req.direction()?;
    let receipt = votes::cast_vote(
        state.votes.as_ref(),
        &SubjectRef::post(id),
        &user.id,
        direction,
        state.config.votes.max_attempts,
    )
    .await?;
    Ok(Json(receipt))
}

/// Fetch a post that exists and has not been deleted.
pub(crate) fn live_post(conn: &Connection, id: &str) -> AppResult<Post> {
    queries::load_post(conn, id)?
        .filter(|p| !p.is_deleted)
        .ok_or(AppError::NotFound)
}
