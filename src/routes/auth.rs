use axum::extract::State;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use crate::{
    audit::{self, ClientInfo},
    auth::{load_identity, password, AuthenticatedUser},
    error::{AppError, AppResult},
    extract::Json,
    models::User,
    schema::users,
    state::AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginUser {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name_ar: String,
    pub full_name_en: String,
    pub role: String,
    /// Resolved server-side and returned at login so clients never maintain
    /// their own role-to-permission table.
    pub permissions: BTreeSet<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: LoginUser,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }

    let mut conn = state.db()?;

    let user: Option<User> = users::table
        .filter(users::username.eq(&payload.username))
        .filter(users::deleted_at.is_null())
        .first(&mut conn)
        .optional()?;

    let Some(user) = user else {
        return Err(AppError::unauthorized());
    };

    if !user.is_active {
        return Err(AppError::unauthorized());
    }

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    let now = Utc::now().naive_utc();
    diesel::update(users::table.find(user.id))
        .set((users::last_login.eq(now), users::updated_at.eq(now)))
        .execute(&mut conn)?;

    let identity = load_identity(&mut conn, user.id)?.ok_or_else(AppError::unauthorized)?;

    audit::record(
        &mut conn,
        user.id,
        "login",
        "auth",
        Some(user.id),
        None,
        &client,
    );

    let access_token = state
        .jwt
        .generate_access_token(user.id)
        .map_err(AppError::from)?;
    let refresh_token = state
        .jwt
        .generate_refresh_token(user.id)
        .map_err(AppError::from)?;

    info!(user_id = user.id, username = %user.username, "user logged in");

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_expiry_seconds(),
        user: LoginUser {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name_ar: user.full_name_ar,
            full_name_en: user.full_name_en,
            role: identity.role,
            permissions: identity.permissions,
        },
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let claims = state
        .jwt
        .verify_refresh_token(&payload.refresh_token)
        .map_err(|_| AppError::unauthorized())?;

    let mut conn = state.db()?;
    let user: Option<User> = users::table
        .filter(users::id.eq(claims.sub))
        .filter(users::is_active.eq(true))
        .filter(users::deleted_at.is_null())
        .first(&mut conn)
        .optional()?;

    if user.is_none() {
        return Err(AppError::unauthorized());
    }

    let access_token = state
        .jwt
        .generate_access_token(claims.sub)
        .map_err(AppError::from)?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_expiry_seconds(),
    }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}
