use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::{Deserialize, Serialize};

use crate::{
    audit::{self, ClientInfo},
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    extract::Json,
    models::{NewUser, Role, User},
    pagination::{PageParams, Paginated, DEFAULT_PAGE_SIZE},
    schema::{roles, users},
    state::AppState,
};

use super::to_iso;

#[derive(Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role_id: Option<i32>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name_ar: String,
    pub full_name_en: String,
    pub role_id: i32,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name_ar: Option<String>,
    pub full_name_en: Option<String>,
    pub role_id: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = users)]
struct UserChangeset {
    username: Option<String>,
    email: Option<String>,
    password_hash: Option<String>,
    full_name_ar: Option<String>,
    full_name_en: Option<String>,
    role_id: Option<i32>,
    is_active: Option<bool>,
    updated_at: Option<chrono::NaiveDateTime>,
}

#[derive(Serialize, Clone)]
pub struct RoleResponse {
    pub id: i32,
    pub name: String,
    pub name_ar: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
            name_ar: role.name_ar,
            description: role.description,
            description_ar: role.description_ar,
        }
    }
}

/// The abbreviated shape embedded in correspondence, reply, and audit
/// responses.
#[derive(Serialize, Clone)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub full_name_ar: String,
    pub full_name_en: String,
}

/// Full user payload; the password hash is never serialized.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name_ar: String,
    pub full_name_en: String,
    pub role_id: i32,
    pub role: RoleResponse,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn to_user_response(user: User, role: Role) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        full_name_ar: user.full_name_ar,
        full_name_en: user.full_name_en,
        role_id: user.role_id,
        role: RoleResponse::from(role),
        is_active: user.is_active,
        last_login: user.last_login.map(to_iso),
        created_at: to_iso(user.created_at),
        updated_at: to_iso(user.updated_at),
    }
}

fn filtered(params: &UserListQuery) -> users::BoxedQuery<'static, Sqlite> {
    let mut query = users::table.into_boxed().filter(users::deleted_at.is_null());

    if let Some(role_id) = params.role_id {
        query = query.filter(users::role_id.eq(role_id));
    }
    if let Some(is_active) = params.is_active {
        query = query.filter(users::is_active.eq(is_active));
    }
    if let Some(search) = params
        .search
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{search}%");
        query = query.filter(
            users::username
                .like(pattern.clone())
                .or(users::email.like(pattern.clone()))
                .or(users::full_name_ar.like(pattern.clone()))
                .or(users::full_name_en.like(pattern)),
        );
    }

    query
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<UserListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Paginated<UserResponse>>> {
    user.require_permission("user:read")?;

    let page = PageParams::new(params.page, params.limit, DEFAULT_PAGE_SIZE);
    let mut conn = state.db()?;

    let total: i64 = filtered(&params).count().get_result(&mut conn)?;
    let rows: Vec<User> = filtered(&params)
        .order(users::created_at.desc())
        .then_order_by(users::id.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(&mut conn)?;

    let mut role_ids: Vec<i32> = rows.iter().map(|user| user.role_id).collect();
    role_ids.sort();
    role_ids.dedup();
    let roles_map: HashMap<i32, Role> = roles::table
        .filter(roles::id.eq_any(&role_ids))
        .load::<Role>(&mut conn)?
        .into_iter()
        .map(|role| (role.id, role))
        .collect();

    let mut data = Vec::with_capacity(rows.len());
    for row in rows {
        let role = roles_map
            .get(&row.role_id)
            .cloned()
            .ok_or_else(|| AppError::internal("user references a missing role"))?;
        data.push(to_user_response(row, role));
    }
    Ok(Json(Paginated::new(data, total, page)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<Json<UserResponse>> {
    user.require_permission("user:read")?;

    let mut conn = state.db()?;
    let (target, role) = find_user_with_role(&mut conn, user_id)?;
    Ok(Json(to_user_response(target, role)))
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    client: ClientInfo,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    user.require_permission("user:create")?;

    let username = validated_username(&payload.username)?;
    let email = validated_email(&payload.email)?;
    validate_password(&payload.password)?;
    let full_name_ar = validated_full_name(&payload.full_name_ar, "full_name_ar")?;
    let full_name_en = validated_full_name(&payload.full_name_en, "full_name_en")?;

    let mut conn = state.db()?;
    ensure_role_exists(&mut conn, payload.role_id)?;

    let password_hash = password::hash_password(&payload.password).map_err(AppError::from)?;

    let created: User = match diesel::insert_into(users::table)
        .values(&NewUser {
            username,
            email,
            password_hash,
            full_name_ar,
            full_name_en,
            role_id: payload.role_id,
            is_active: true,
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
    {
        Ok(row) => row,
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request("username or email already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    audit::record(
        &mut conn,
        user.user_id,
        "create",
        "user",
        Some(created.id),
        None,
        &client,
    );

    let (created, role) = find_user_with_role(&mut conn, created.id)?;
    Ok((StatusCode::CREATED, Json(to_user_response(created, role))))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    user.require_permission("user:update")?;

    let mut conn = state.db()?;
    find_user_with_role(&mut conn, user_id)?;

    let mut changeset = UserChangeset {
        updated_at: Some(Utc::now().naive_utc()),
        ..UserChangeset::default()
    };
    if let Some(ref username) = payload.username {
        changeset.username = Some(validated_username(username)?);
    }
    if let Some(ref email) = payload.email {
        changeset.email = Some(validated_email(email)?);
    }
    if let Some(ref password) = payload.password {
        validate_password(password)?;
        changeset.password_hash = Some(password::hash_password(password).map_err(AppError::from)?);
    }
    if let Some(ref full_name_ar) = payload.full_name_ar {
        changeset.full_name_ar = Some(validated_full_name(full_name_ar, "full_name_ar")?);
    }
    if let Some(ref full_name_en) = payload.full_name_en {
        changeset.full_name_en = Some(validated_full_name(full_name_en, "full_name_en")?);
    }
    if let Some(role_id) = payload.role_id {
        ensure_role_exists(&mut conn, role_id)?;
        changeset.role_id = Some(role_id);
    }
    changeset.is_active = payload.is_active;

    match diesel::update(users::table.find(user_id))
        .set(&changeset)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request("username or email already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    audit::record(
        &mut conn,
        user.user_id,
        "update",
        "user",
        Some(user_id),
        None,
        &client,
    );

    let (updated, role) = find_user_with_role(&mut conn, user_id)?;
    Ok(Json(to_user_response(updated, role)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
) -> AppResult<impl IntoResponse> {
    user.require_permission("user:delete")?;

    let mut conn = state.db()?;
    find_user_with_role(&mut conn, user_id)?;

    let now = Utc::now().naive_utc();
    diesel::update(users::table.find(user_id))
        .set((users::deleted_at.eq(Some(now)), users::updated_at.eq(now)))
        .execute(&mut conn)?;

    audit::record(
        &mut conn,
        user.user_id,
        "delete",
        "user",
        Some(user_id),
        None,
        &client,
    );

    Ok(StatusCode::NO_CONTENT)
}

fn find_user_with_role(conn: &mut SqliteConnection, user_id: i32) -> AppResult<(User, Role)> {
    users::table
        .inner_join(roles::table)
        .filter(users::id.eq(user_id))
        .filter(users::deleted_at.is_null())
        .select((User::as_select(), Role::as_select()))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

fn ensure_role_exists(conn: &mut SqliteConnection, role_id: i32) -> AppResult<()> {
    let exists: Option<i32> = roles::table
        .filter(roles::id.eq(role_id))
        .select(roles::id)
        .first(conn)
        .optional()?;
    if exists.is_none() {
        return Err(AppError::bad_request("role does not exist"));
    }
    Ok(())
}

fn validated_username(value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    let length = trimmed.chars().count();
    if !(3..=50).contains(&length) {
        return Err(AppError::bad_request(
            "username must be between 3 and 50 characters",
        ));
    }
    Ok(trimmed.to_string())
}

fn validated_email(value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    let valid = trimmed
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::bad_request("email must be a valid address"));
    }
    Ok(trimmed.to_string())
}

fn validate_password(value: &str) -> AppResult<()> {
    if value.chars().count() < 6 {
        return Err(AppError::bad_request(
            "password must be at least 6 characters",
        ));
    }
    Ok(())
}

fn validated_full_name(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > 200 {
        return Err(AppError::bad_request(format!(
            "{field} must be at most 200 characters"
        )));
    }
    Ok(trimmed.to_string())
}
