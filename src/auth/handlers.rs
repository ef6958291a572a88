use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{password, session};
use crate::db::{self, queries};
use crate::error::{AppError, AppResult};
use crate::extractors::session_token;
use crate::state::AppState;
use crate::validation;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// -- Handlers --

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Response> {
    let email = validation::email(&req.email)?;
    let username = validation::username(&req.username)?;
    let display_name = validation::display_name(&req.display_name)?;
    let plaintext = validation::password(&req.password)?;

    {
        let conn = state.db.get()?;
        if queries::find_user_by_email(&conn, &email)?.is_some() {
            return Err(AppError::BadRequest(
                "User with this email already exists".into(),
            ));
        }
        if queries::find_user_by_username(&conn, &username)?.is_some() {
            return Err(AppError::BadRequest("Username is already taken".into()));
        }
    }

    let hash = password::hash_password(plaintext, state.config.auth.bcrypt_cost).await?;

    let user_id = db::new_id();
    let conn = state.db.get()?;
    let created = queries::insert_user(
        &conn,
        &queries::NewUser {
            id: &user_id,
            email: &email,
            username: &username,
            display_name: &display_name,
            password_hash: &hash,
            created_at: &db::now_timestamp(),
        },
    )?;
    // Lost a race with a concurrent signup for the same email or username
    if !created {
        if queries::find_user_by_email(&conn, &email)?.is_some() {
            return Err(AppError::BadRequest(
                "User with this email already exists".into(),
            ));
        }
        return Err(AppError::BadRequest("Username is already taken".into()));
    }

    tracing::info!(user = %user_id, username = %username, "User signed up");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": {
                "id": user_id,
                "email": email,
                "username": username,
                "displayName": display_name,
            }
        })),
    )
        .into_response())
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".into()));
    }

    let user = {
        let conn = state.db.get()?;
        queries::find_user_by_email(&conn, &email)?
    };
    let Some(user) = user else {
        return Err(AppError::Unauthorized);
    };
    let Some(hash) = user.password_hash.clone() else {
        return Err(AppError::Unauthorized);
    };

    if !password::verify_password(req.password, hash).await? {
        tracing::debug!(user = %user.id, "Rejected login");
        return Err(AppError::Unauthorized);
    }

    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, &user.id, hours)?;
    let cookie = session::session_cookie(&state.config.auth.cookie_name, &token, hours);

    tracing::info!(user = %user.id, "User logged in");

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "user": user })),
    )
        .into_response())
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = session_token(&headers, cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, session::clear_session_cookie(cookie_name))]),
        Json(json!({ "message": "Logged out" })),
    )
        .into_response())
}
