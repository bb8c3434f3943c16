use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::{Deserialize, Serialize};

use crate::{
    audit::{self, ClientInfo},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::Json,
    models::{Entity, NewEntity},
    pagination::{PageParams, Paginated, DEFAULT_PAGE_SIZE},
    schema::entities,
    state::AppState,
};

use super::to_iso;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Subsidiary,
    Presidency,
    Government,
    External,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Subsidiary => "subsidiary",
            EntityKind::Presidency => "presidency",
            EntityKind::Government => "government",
            EntityKind::External => "external",
        }
    }
}

#[derive(Deserialize)]
pub struct EntityListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<EntityKind>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateEntityRequest {
    pub name_ar: String,
    pub name_en: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateEntityRequest {
    pub name_ar: Option<String>,
    pub name_en: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<EntityKind>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = entities)]
struct EntityChangeset {
    name_ar: Option<String>,
    name_en: Option<String>,
    kind: Option<String>,
    contact_person: Option<String>,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    address: Option<String>,
    is_active: Option<bool>,
    updated_at: Option<chrono::NaiveDateTime>,
}

#[derive(Serialize, Clone)]
pub struct EntityResponse {
    pub id: i32,
    pub name_ar: String,
    pub name_en: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Entity> for EntityResponse {
    fn from(entity: Entity) -> Self {
        Self {
            id: entity.id,
            name_ar: entity.name_ar,
            name_en: entity.name_en,
            kind: entity.kind,
            contact_person: entity.contact_person,
            contact_email: entity.contact_email,
            contact_phone: entity.contact_phone,
            address: entity.address,
            is_active: entity.is_active,
            created_at: to_iso(entity.created_at),
            updated_at: to_iso(entity.updated_at),
        }
    }
}

fn filtered(params: &EntityListQuery) -> entities::BoxedQuery<'static, Sqlite> {
    let mut query = entities::table
        .into_boxed()
        .filter(entities::deleted_at.is_null());

    if let Some(kind) = params.kind {
        query = query.filter(entities::kind.eq(kind.as_str()));
    }
    if let Some(is_active) = params.is_active {
        query = query.filter(entities::is_active.eq(is_active));
    }
    if let Some(search) = params
        .search
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{search}%");
        query = query.filter(
            entities::name_ar
                .like(pattern.clone())
                .or(entities::name_en.like(pattern)),
        );
    }

    query
}

pub async fn list_entities(
    State(state): State<AppState>,
    Query(params): Query<EntityListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Paginated<EntityResponse>>> {
    user.require_permission("entity:read")?;

    let page = PageParams::new(params.page, params.limit, DEFAULT_PAGE_SIZE);
    let mut conn = state.db()?;

    let total: i64 = filtered(&params).count().get_result(&mut conn)?;
    let rows: Vec<Entity> = filtered(&params)
        .order(entities::name_ar.asc())
        .then_order_by(entities::id.asc())
        .limit(page.limit)
        .offset(page.offset())
        .load(&mut conn)?;

    let data = rows.into_iter().map(EntityResponse::from).collect();
    Ok(Json(Paginated::new(data, total, page)))
}

pub async fn get_entity(
    State(state): State<AppState>,
    Path(entity_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<Json<EntityResponse>> {
    user.require_permission("entity:read")?;

    let mut conn = state.db()?;
    let entity = find_entity(&mut conn, entity_id)?;
    Ok(Json(EntityResponse::from(entity)))
}

pub async fn create_entity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    client: ClientInfo,
    Json(payload): Json<CreateEntityRequest>,
) -> AppResult<(StatusCode, Json<EntityResponse>)> {
    user.require_permission("entity:create")?;

    let name_ar = validated_name(&payload.name_ar, "name_ar")?;
    let name_en = validated_name(&payload.name_en, "name_en")?;
    if let Some(email) = payload.contact_email.as_deref() {
        validate_email(email)?;
    }

    let mut conn = state.db()?;
    let entity: Entity = diesel::insert_into(entities::table)
        .values(&NewEntity {
            name_ar,
            name_en,
            kind: payload.kind.as_str().to_string(),
            contact_person: payload.contact_person,
            contact_email: payload.contact_email,
            contact_phone: payload.contact_phone,
            address: payload.address,
            is_active: true,
        })
        .returning(Entity::as_returning())
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        user.user_id,
        "create",
        "entity",
        Some(entity.id),
        None,
        &client,
    );

    Ok((StatusCode::CREATED, Json(EntityResponse::from(entity))))
}

pub async fn update_entity(
    State(state): State<AppState>,
    Path(entity_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
    Json(payload): Json<UpdateEntityRequest>,
) -> AppResult<Json<EntityResponse>> {
    user.require_permission("entity:update")?;

    let mut conn = state.db()?;
    find_entity(&mut conn, entity_id)?;

    let mut changeset = EntityChangeset {
        updated_at: Some(Utc::now().naive_utc()),
        ..EntityChangeset::default()
    };
    if let Some(ref name_ar) = payload.name_ar {
        changeset.name_ar = Some(validated_name(name_ar, "name_ar")?);
    }
    if let Some(ref name_en) = payload.name_en {
        changeset.name_en = Some(validated_name(name_en, "name_en")?);
    }
    if let Some(kind) = payload.kind {
        changeset.kind = Some(kind.as_str().to_string());
    }
    if let Some(email) = payload.contact_email.as_deref() {
        validate_email(email)?;
    }
    changeset.contact_person = payload.contact_person;
    changeset.contact_email = payload.contact_email;
    changeset.contact_phone = payload.contact_phone;
    changeset.address = payload.address;
    changeset.is_active = payload.is_active;

    diesel::update(entities::table.find(entity_id))
        .set(&changeset)
        .execute(&mut conn)?;

    audit::record(
        &mut conn,
        user.user_id,
        "update",
        "entity",
        Some(entity_id),
        None,
        &client,
    );

    let updated = find_entity(&mut conn, entity_id)?;
    Ok(Json(EntityResponse::from(updated)))
}

pub async fn delete_entity(
    State(state): State<AppState>,
    Path(entity_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
) -> AppResult<impl IntoResponse> {
    user.require_permission("entity:delete")?;

    let mut conn = state.db()?;
    find_entity(&mut conn, entity_id)?;

    let now = Utc::now().naive_utc();
    diesel::update(entities::table.find(entity_id))
        .set((
            entities::deleted_at.eq(Some(now)),
            entities::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    audit::record(
        &mut conn,
        user.user_id,
        "delete",
        "entity",
        Some(entity_id),
        None,
        &client,
    );

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn find_entity(conn: &mut SqliteConnection, entity_id: i32) -> AppResult<Entity> {
    entities::table
        .filter(entities::id.eq(entity_id))
        .filter(entities::deleted_at.is_null())
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

fn validated_name(value: &str, field: &str) -> AppResult<String> {
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

fn validate_email(email: &str) -> AppResult<()> {
    let trimmed = email.trim();
    let valid = trimmed
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::bad_request("contact_email must be a valid email"));
    }
    Ok(())
}
