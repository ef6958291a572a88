use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::{self, queries};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::offset;
use crate::state::AppState;
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/communities", get(list).post(create))
        .route("/api/communities/{name}", get(show).put(update))
        .route("/api/communities/{name}/join", post(join).delete(leave))
}

#[derive(Deserialize, Default)]
pub struct ListParams {
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommunityRequest {
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[serde(default)]
    pub rules: Vec<String>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommunityRequest {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub rules: Option<Vec<String>>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
}

/// GET /api/communities
async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Value>> {
    let limit = state.config.page_size(params.limit);
    let offset = offset(params.page, limit);
    let pattern = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()));

    let conn = state.db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM communities
         WHERE ?1 IS NULL
            OR lower(name) LIKE ?1
            OR lower(display_name) LIKE ?1
            OR lower(description) LIKE ?1
         ORDER BY member_count DESC, created_at DESC
         LIMIT ?2 OFFSET ?3",
        queries::COMMUNITY_COLUMNS
    ))?;
    let communities = stmt
        .query_map(params![pattern, limit, offset], queries::map_community)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(json!({ "communities": communities })))
}

/// POST /api/communities
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateCommunityRequest>,
) -> AppResult<Response> {
    let name = validation::community_name(&req.name)?;
    let display_name = validation::display_name(&req.display_name)?;
    let description = validation::description(&req.description)?;
    let rules = validation::rules(&req.rules)?;
    let avatar = validation::url("Avatar", req.avatar.as_deref())?;
    let banner = validation::url("Banner", req.banner.as_deref())?;

    let id = db::new_id();
    let now = db::now_timestamp();
    let rules_json = serde_json::to_string(&rules)?;

    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;
    let created = queries::insert_community(
        &tx,
        &queries::NewCommunity {
            id: &id,
            name: &name,
            display_name: &display_name,
            description: &description,
            avatar: avatar.as_deref(),
            banner: banner.as_deref(),
            creator_id: &user.id,
            rules_json: &rules_json,
            is_private: req.is_private,
            created_at: &now,
        },
    )?;
    if !created {
        return Err(AppError::BadRequest(
            "Community with this name already exists".into(),
        ));
    }
    queries::add_member(&tx, &id, &user.id, true)?;
    tx.commit()?;

    let community = queries::find_community_by_id(&conn, &id)?.ok_or(AppError::NotFound)?;
    tracing::info!(community = %name, creator = %user.id, "Community created");

    Ok((StatusCode::CREATED, Json(json!({ "community": community }))).into_response())
}

/// GET /api/communities/{name}
async fn show(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(name): Path<String>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let community = queries::find_community_by_name(&conn, &name)?.ok_or(AppError::NotFound)?;
    let moderators = queries::moderators(&conn, &community.id)?;

    let (is_member, is_moderator) = match viewer {
        Some(ref user) => (
            queries::is_member(&conn, &community.id, &user.id)?,
            queries::is_moderator(&conn, &community.id, &user.id)?,
        ),
        None => (false, false),
    };

    Ok(Json(json!({
        "community": community,
        "moderators": moderators,
        "isMember": is_member,
        "isModerator": is_moderator,
    })))
}

/// PUT /api/communities/{name}
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<UpdateCommunityRequest>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let community = queries::find_community_by_name(&conn, &name)?.ok_or(AppError::NotFound)?;

    if !queries::is_moderator(&conn, &community.id, &user.id)? {
        return Err(AppError::Forbidden);
    }

    let display_name = match req.display_name.as_deref() {
        Some(raw) => validation::display_name(raw)?,
        None => community.display_name,
    };
    let description = match req.description.as_deref() {
        Some(raw) => validation::description(raw)?,
        None => community.description,
    };
    let rules = match req.rules.as_deref() {
        Some(raw) => validation::rules(raw)?,
        None => community.rules,
    };
    let avatar = match req.avatar.as_deref() {
        Some(raw) => validation::url("Avatar", Some(raw))?,
        None => community.avatar,
    };
    let banner = match req.banner.as_deref() {
        Some(raw) => validation::url("Banner", Some(raw))?,
        None => community.banner,
    };

    conn.execute(
        "UPDATE communities
         SET display_name = ?1, description = ?2, rules_json = ?3, avatar = ?4, banner = ?5,
             updated_at = ?6
         WHERE id = ?7",
        params![
            display_name,
            description,
            serde_json::to_string(&rules)?,
            avatar,
            banner,
            db::now_timestamp(),
            community.id
        ],
    )?;

    let updated =
        queries::find_community_by_id(&conn, &community.id)?.ok_or(AppError::NotFound)?;
    Ok(Json(json!({ "community": updated })))
}

/// POST /api/communities/{name}/join
async fn join(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db.get()?;
    let community = queries::find_community_by_name(&conn, &name)?.ok_or(AppError::NotFound)?;

    if queries::is_banned(&conn, &community.id, &user.id)? {
        return Err(AppError::Forbidden);
    }

    let tx = conn.transaction()?;
    if !queries::add_member(&tx, &community.id, &user.id, false)? {
        return Err(AppError::BadRequest("Already a member".into()));
    }
    tx.execute(
        "UPDATE communities SET member_count = member_count + 1 WHERE id = ?1",
        params![community.id],
    )?;
    tx.commit()?;

    tracing::debug!(community = %community.name, user = %user.id, "Joined community");
    Ok(Json(json!({ "message": "Joined community" })))
}

/// DELETE /api/communities/{name}/join
async fn leave(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db.get()?;
    let community = queries::find_community_by_name(&conn, &name)?.ok_or(AppError::NotFound)?;

    let tx = conn.transaction()?;
    let removed = tx.execute(
        "DELETE FROM community_members WHERE community_id = ?1 AND user_id = ?2",
        params![community.id, user.id],
    )?;
    if removed > 0 {
        tx.execute(
            "UPDATE communities SET member_count = MAX(member_count - 1, 0) WHERE id = ?1",
            params![community.id],
        )?;
    }
    tx.commit()?;

    Ok(Json(json!({ "message": "Left community" })))
}
