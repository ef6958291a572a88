use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users/me", put(update_me))
        .route("/api/users/{username}", get(profile))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// GET /api/users/{username}
async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let user = queries::find_user_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    let post_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE author_id = ?1 AND is_deleted = 0",
        params![user.id],
        |r| r.get(0),
    )?;

    Ok(Json(json!({ "user": user, "postCount": post_count })))
}

/// PUT /api/users/me
async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<Value>> {
    let display_name = validation::display_name(&req.display_name)?;
    let bio = validation::bio(req.bio.as_deref())?;
    let avatar = validation::url("Avatar", req.avatar.as_deref())?;

    let conn = state.db.get()?;
    conn.execute(
        "UPDATE users SET display_name = ?1, bio = ?2, avatar = ?3 WHERE id = ?4",
        params![display_name, bio, avatar, user.id],
    )?;

    let updated = queries::find_user_by_id(&conn, &user.id)?.ok_or(AppError::NotFound)?;
    tracing::debug!(user = %user.id, "Profile updated");

    Ok(Json(json!({ "user": updated })))
}
