use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    audit::{self, ClientInfo},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::Json,
    models::{
        Attachment, Correspondence, CorrespondenceReply, Entity, NewCorrespondence,
        NewCorrespondenceReply, StatusHistory,
    },
    pagination::{PageParams, Paginated, DEFAULT_PAGE_SIZE},
    schema::{attachments, correspondence_replies, correspondences, entities, status_history, users},
    state::AppState,
    workflow::{
        append_status_history, generate_reference_number, CorrespondenceKind,
        CorrespondenceStatus, ReviewStatus, REPLY_ADDED_NOTE, STATUS_NONE,
    },
};

use super::entities::EntityResponse;
use super::to_iso;
use super::users::UserSummary;

const REFERENCE_NUMBER_ATTEMPTS: u32 = 5;
const MAX_SUBJECT_LENGTH: usize = 500;

#[derive(Deserialize)]
pub struct CorrespondenceListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<CorrespondenceKind>,
    pub status: Option<CorrespondenceStatus>,
    pub review_status: Option<ReviewStatus>,
    pub search: Option<String>,
    pub sender_entity_id: Option<i32>,
    pub receiver_entity_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct CreateCorrespondenceRequest {
    #[serde(rename = "type")]
    pub kind: CorrespondenceKind,
    pub subject: String,
    pub description: String,
    pub sender_entity_id: i32,
    pub receiver_entity_id: i32,
    pub correspondence_date: DateTime<Utc>,
    pub current_status: Option<CorrespondenceStatus>,
}

#[derive(Deserialize)]
pub struct UpdateCorrespondenceRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub sender_entity_id: Option<i32>,
    pub receiver_entity_id: Option<i32>,
    pub correspondence_date: Option<DateTime<Utc>>,
    pub current_status: Option<CorrespondenceStatus>,
    pub review_status: Option<ReviewStatus>,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub subject: String,
    pub body: String,
    pub parent_reply_id: Option<i32>,
}

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: CorrespondenceStatus,
    pub notes: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = correspondences)]
struct CorrespondenceChangeset {
    subject: Option<String>,
    description: Option<String>,
    sender_entity_id: Option<i32>,
    receiver_entity_id: Option<i32>,
    correspondence_date: Option<chrono::NaiveDateTime>,
    current_status: Option<String>,
    review_status: Option<String>,
    updated_at: Option<chrono::NaiveDateTime>,
}

#[derive(Serialize)]
pub struct CorrespondenceResponse {
    pub id: i32,
    pub reference_number: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub subject: String,
    pub description: String,
    pub sender_entity_id: i32,
    pub receiver_entity_id: i32,
    pub correspondence_date: String,
    pub review_status: String,
    pub current_status: String,
    pub created_by: i32,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_entity: Option<EntityResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_entity: Option<EntityResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserSummary>,
}

#[derive(Serialize)]
pub struct CorrespondenceDetailResponse {
    #[serde(flatten)]
    pub correspondence: CorrespondenceResponse,
    pub attachments: Vec<AttachmentSummary>,
    pub replies: Vec<ReplyResponse>,
    pub status_history: Vec<StatusHistoryResponse>,
}

#[derive(Serialize)]
pub struct AttachmentSummary {
    pub id: i32,
    pub correspondence_id: i32,
    pub file_name: String,
    pub original_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by: i32,
    pub created_at: String,
}

impl From<Attachment> for AttachmentSummary {
    fn from(attachment: Attachment) -> Self {
        Self {
            id: attachment.id,
            correspondence_id: attachment.correspondence_id,
            file_name: attachment.file_name,
            original_name: attachment.original_name,
            file_path: attachment.file_path,
            file_size: attachment.file_size,
            mime_type: attachment.mime_type,
            uploaded_by: attachment.uploaded_by,
            created_at: to_iso(attachment.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct ReplyResponse {
    pub id: i32,
    pub correspondence_id: i32,
    pub parent_reply_id: Option<i32>,
    pub subject: String,
    pub body: String,
    pub created_by: i32,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserSummary>,
}

#[derive(Serialize)]
pub struct StatusHistoryResponse {
    pub id: i32,
    pub correspondence_id: i32,
    pub old_status: String,
    pub new_status: String,
    pub changed_by: i32,
    pub notes: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by_user: Option<UserSummary>,
}

fn filtered(params: &CorrespondenceListQuery) -> correspondences::BoxedQuery<'static, Sqlite> {
    let mut query = correspondences::table
        .into_boxed()
        .filter(correspondences::deleted_at.is_null());

    if let Some(kind) = params.kind {
        query = query.filter(correspondences::kind.eq(kind.as_str()));
    }
    if let Some(status) = params.status {
        query = query.filter(correspondences::current_status.eq(status.as_str()));
    }
    if let Some(review_status) = params.review_status {
        query = query.filter(correspondences::review_status.eq(review_status.as_str()));
    }
    if let Some(sender_entity_id) = params.sender_entity_id {
        query = query.filter(correspondences::sender_entity_id.eq(sender_entity_id));
    }
    if let Some(receiver_entity_id) = params.receiver_entity_id {
        query = query.filter(correspondences::receiver_entity_id.eq(receiver_entity_id));
    }
    if let Some(search) = params
        .search
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        // SQLite LIKE is case-insensitive for ASCII, matching the source's
        // substring search semantics.
        let pattern = format!("%{search}%");
        query = query.filter(
            correspondences::subject
                .like(pattern.clone())
                .or(correspondences::description.like(pattern.clone()))
                .or(correspondences::reference_number.like(pattern)),
        );
    }
    if let Some(start_date) = params.start_date {
        let start = start_date.and_hms_opt(0, 0, 0).expect("valid midnight");
        query = query.filter(correspondences::correspondence_date.ge(start));
    }
    if let Some(end_date) = params.end_date {
        // Inclusive upper bound: everything up to the end of the named day.
        let end = end_date.and_hms_opt(23, 59, 59).expect("valid end of day");
        query = query.filter(correspondences::correspondence_date.le(end));
    }

    query
}

pub async fn list_correspondences(
    State(state): State<AppState>,
    Query(params): Query<CorrespondenceListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Paginated<CorrespondenceResponse>>> {
    user.require_permission("correspondence:read")?;

    let page = PageParams::new(params.page, params.limit, DEFAULT_PAGE_SIZE);
    let mut conn = state.db()?;

    let total: i64 = filtered(&params).count().get_result(&mut conn)?;
    let rows: Vec<Correspondence> = filtered(&params)
        .order(correspondences::created_at.desc())
        .then_order_by(correspondences::id.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(&mut conn)?;

    let data = build_responses(&mut conn, rows)?;
    Ok(Json(Paginated::new(data, total, page)))
}

pub async fn get_correspondence(
    State(state): State<AppState>,
    Path(correspondence_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<Json<CorrespondenceDetailResponse>> {
    user.require_permission("correspondence:read")?;

    let mut conn = state.db()?;
    let correspondence = find_correspondence(&mut conn, correspondence_id)?;

    let attachment_rows: Vec<Attachment> = attachments::table
        .filter(attachments::correspondence_id.eq(correspondence_id))
        .order(attachments::created_at.asc())
        .load(&mut conn)?;

    let reply_rows: Vec<CorrespondenceReply> = correspondence_replies::table
        .filter(correspondence_replies::correspondence_id.eq(correspondence_id))
        .order(correspondence_replies::created_at.asc())
        .load(&mut conn)?;

    let history_rows: Vec<StatusHistory> = status_history::table
        .filter(status_history::correspondence_id.eq(correspondence_id))
        .order(status_history::created_at.asc())
        .then_order_by(status_history::id.asc())
        .load(&mut conn)?;

    let mut user_ids: Vec<i32> = reply_rows.iter().map(|reply| reply.created_by).collect();
    user_ids.extend(history_rows.iter().map(|entry| entry.changed_by));
    let users_map = load_user_summaries(&mut conn, &user_ids)?;

    let replies = reply_rows
        .into_iter()
        .map(|reply| ReplyResponse {
            id: reply.id,
            correspondence_id: reply.correspondence_id,
            parent_reply_id: reply.parent_reply_id,
            subject: reply.subject,
            body: reply.body,
            created_by: reply.created_by,
            created_at: to_iso(reply.created_at),
            creator: users_map.get(&reply.created_by).cloned(),
        })
        .collect();

    let status_entries = history_rows
        .into_iter()
        .map(|entry| StatusHistoryResponse {
            id: entry.id,
            correspondence_id: entry.correspondence_id,
            old_status: entry.old_status,
            new_status: entry.new_status,
            changed_by: entry.changed_by,
            notes: entry.notes,
            created_at: to_iso(entry.created_at),
            changed_by_user: users_map.get(&entry.changed_by).cloned(),
        })
        .collect();

    let base = build_responses(&mut conn, vec![correspondence])?
        .pop()
        .ok_or_else(AppError::not_found)?;

    Ok(Json(CorrespondenceDetailResponse {
        correspondence: base,
        attachments: attachment_rows
            .into_iter()
            .map(AttachmentSummary::from)
            .collect(),
        replies,
        status_history: status_entries,
    }))
}

pub async fn create_correspondence(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    client: ClientInfo,
    Json(payload): Json<CreateCorrespondenceRequest>,
) -> AppResult<(StatusCode, Json<CorrespondenceResponse>)> {
    user.require_permission("correspondence:create")?;

    let subject = validated_subject(&payload.subject)?;
    let description = validated_description(&payload.description)?;

    let mut conn = state.db()?;
    ensure_entity_exists(&mut conn, payload.sender_entity_id, "sender entity")?;
    ensure_entity_exists(&mut conn, payload.receiver_entity_id, "receiver entity")?;

    let initial_status = payload.current_status.unwrap_or(CorrespondenceStatus::Draft);

    // The 4-digit random suffix can collide; retry against the unique index
    // a few times before giving up.
    let mut attempts = 0;
    let correspondence: Correspondence = loop {
        attempts += 1;
        let new_row = NewCorrespondence {
            reference_number: generate_reference_number(payload.kind),
            kind: payload.kind.as_str().to_string(),
            subject: subject.clone(),
            description: description.clone(),
            sender_entity_id: payload.sender_entity_id,
            receiver_entity_id: payload.receiver_entity_id,
            correspondence_date: payload.correspondence_date.naive_utc(),
            review_status: ReviewStatus::NotReviewed.as_str().to_string(),
            current_status: initial_status.as_str().to_string(),
            created_by: user.user_id,
        };

        match diesel::insert_into(correspondences::table)
            .values(&new_row)
            .returning(Correspondence::as_returning())
            .get_result(&mut conn)
        {
            Ok(row) => break row,
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
                if attempts < REFERENCE_NUMBER_ATTEMPTS =>
            {
                continue;
            }
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                return Err(AppError::bad_request(
                    "could not allocate a unique reference number",
                ));
            }
            Err(err) => return Err(AppError::from(err)),
        }
    };

    append_status_history(
        &mut conn,
        correspondence.id,
        STATUS_NONE,
        initial_status.as_str(),
        user.user_id,
        None,
    )?;

    audit::record(
        &mut conn,
        user.user_id,
        "create",
        "correspondence",
        Some(correspondence.id),
        None,
        &client,
    );

    info!(
        correspondence_id = correspondence.id,
        reference_number = %correspondence.reference_number,
        "correspondence created"
    );

    let response = build_responses(&mut conn, vec![correspondence])?
        .pop()
        .ok_or_else(AppError::not_found)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_correspondence(
    State(state): State<AppState>,
    Path(correspondence_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
    Json(payload): Json<UpdateCorrespondenceRequest>,
) -> AppResult<Json<CorrespondenceResponse>> {
    user.require_permission("correspondence:update")?;

    let mut conn = state.db()?;
    let existing = find_correspondence(&mut conn, correspondence_id)?;
    let old_status = existing.current_status.clone();

    let mut changeset = CorrespondenceChangeset {
        updated_at: Some(Utc::now().naive_utc()),
        ..CorrespondenceChangeset::default()
    };
    if let Some(ref subject) = payload.subject {
        changeset.subject = Some(validated_subject(subject)?);
    }
    if let Some(ref description) = payload.description {
        changeset.description = Some(validated_description(description)?);
    }
    if let Some(sender_entity_id) = payload.sender_entity_id {
        ensure_entity_exists(&mut conn, sender_entity_id, "sender entity")?;
        changeset.sender_entity_id = Some(sender_entity_id);
    }
    if let Some(receiver_entity_id) = payload.receiver_entity_id {
        ensure_entity_exists(&mut conn, receiver_entity_id, "receiver entity")?;
        changeset.receiver_entity_id = Some(receiver_entity_id);
    }
    if let Some(correspondence_date) = payload.correspondence_date {
        changeset.correspondence_date = Some(correspondence_date.naive_utc());
    }
    if let Some(status) = payload.current_status {
        changeset.current_status = Some(status.as_str().to_string());
    }
    if let Some(review_status) = payload.review_status {
        changeset.review_status = Some(review_status.as_str().to_string());
    }

    diesel::update(correspondences::table.find(correspondence_id))
        .set(&changeset)
        .execute(&mut conn)?;

    // A bulk update only records a transition when the status actually moved.
    if let Some(status) = payload.current_status {
        if status.as_str() != old_status {
            append_status_history(
                &mut conn,
                correspondence_id,
                &old_status,
                status.as_str(),
                user.user_id,
                None,
            )?;
        }
    }

    audit::record(
        &mut conn,
        user.user_id,
        "update",
        "correspondence",
        Some(correspondence_id),
        None,
        &client,
    );

    let updated = find_correspondence(&mut conn, correspondence_id)?;
    let response = build_responses(&mut conn, vec![updated])?
        .pop()
        .ok_or_else(AppError::not_found)?;
    Ok(Json(response))
}

pub async fn delete_correspondence(
    State(state): State<AppState>,
    Path(correspondence_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
) -> AppResult<impl IntoResponse> {
    user.require_permission("correspondence:delete")?;

    let mut conn = state.db()?;
    find_correspondence(&mut conn, correspondence_id)?;

    let now = Utc::now().naive_utc();
    diesel::update(correspondences::table.find(correspondence_id))
        .set((
            correspondences::deleted_at.eq(Some(now)),
            correspondences::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    audit::record(
        &mut conn,
        user.user_id,
        "delete",
        "correspondence",
        Some(correspondence_id),
        None,
        &client,
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_reply(
    State(state): State<AppState>,
    Path(correspondence_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
    Json(payload): Json<ReplyRequest>,
) -> AppResult<(StatusCode, Json<ReplyResponse>)> {
    user.require_permission("correspondence:update")?;

    let subject = validated_subject(&payload.subject)?;
    let body = {
        let trimmed = payload.body.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("body must not be empty"));
        }
        trimmed.to_string()
    };

    let mut conn = state.db()?;
    let correspondence = find_correspondence(&mut conn, correspondence_id)?;
    let prior_status = correspondence.current_status.clone();

    if let Some(parent_reply_id) = payload.parent_reply_id {
        let parent: Option<CorrespondenceReply> = correspondence_replies::table
            .find(parent_reply_id)
            .first(&mut conn)
            .optional()?;
        match parent {
            Some(parent) if parent.correspondence_id == correspondence_id => {}
            _ => {
                return Err(AppError::bad_request(
                    "parent reply does not belong to this correspondence",
                ));
            }
        }
    }

    let reply: CorrespondenceReply = diesel::insert_into(correspondence_replies::table)
        .values(&NewCorrespondenceReply {
            correspondence_id,
            parent_reply_id: payload.parent_reply_id,
            subject,
            body,
            created_by: user.user_id,
        })
        .returning(CorrespondenceReply::as_returning())
        .get_result(&mut conn)?;

    // Replying always forces the correspondence into `replied`, whatever the
    // prior state, and the ledger records that prior state.
    let now = Utc::now().naive_utc();
    diesel::update(correspondences::table.find(correspondence_id))
        .set((
            correspondences::current_status.eq(CorrespondenceStatus::Replied.as_str()),
            correspondences::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    append_status_history(
        &mut conn,
        correspondence_id,
        &prior_status,
        CorrespondenceStatus::Replied.as_str(),
        user.user_id,
        Some(REPLY_ADDED_NOTE.to_string()),
    )?;

    audit::record(
        &mut conn,
        user.user_id,
        "create",
        "reply",
        Some(reply.id),
        None,
        &client,
    );

    let users_map = load_user_summaries(&mut conn, &[reply.created_by])?;
    let creator = users_map.get(&reply.created_by).cloned();

    Ok((
        StatusCode::CREATED,
        Json(ReplyResponse {
            id: reply.id,
            correspondence_id: reply.correspondence_id,
            parent_reply_id: reply.parent_reply_id,
            subject: reply.subject,
            body: reply.body,
            created_by: reply.created_by,
            created_at: to_iso(reply.created_at),
            creator,
        }),
    ))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(correspondence_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
    Json(payload): Json<StatusUpdateRequest>,
) -> AppResult<Json<CorrespondenceResponse>> {
    user.require_permission("correspondence:update")?;

    let mut conn = state.db()?;
    let existing = find_correspondence(&mut conn, correspondence_id)?;
    let old_status = existing.current_status.clone();

    let now = Utc::now().naive_utc();
    diesel::update(correspondences::table.find(correspondence_id))
        .set((
            correspondences::current_status.eq(payload.status.as_str()),
            correspondences::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    // Unlike the bulk update path, the dedicated status endpoint appends a
    // ledger row unconditionally, even for old == new.
    append_status_history(
        &mut conn,
        correspondence_id,
        &old_status,
        payload.status.as_str(),
        user.user_id,
        payload.notes,
    )?;

    audit::record(
        &mut conn,
        user.user_id,
        "update_status",
        "correspondence",
        Some(correspondence_id),
        None,
        &client,
    );

    let updated = find_correspondence(&mut conn, correspondence_id)?;
    let response = build_responses(&mut conn, vec![updated])?
        .pop()
        .ok_or_else(AppError::not_found)?;
    Ok(Json(response))
}

pub async fn review_correspondence(
    State(state): State<AppState>,
    Path(correspondence_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
) -> AppResult<Json<CorrespondenceResponse>> {
    user.require_permission("correspondence:review")?;

    let mut conn = state.db()?;
    find_correspondence(&mut conn, correspondence_id)?;

    let now = Utc::now().naive_utc();
    diesel::update(correspondences::table.find(correspondence_id))
        .set((
            correspondences::review_status.eq(ReviewStatus::Reviewed.as_str()),
            correspondences::reviewed_by.eq(Some(user.user_id)),
            correspondences::reviewed_at.eq(Some(now)),
            correspondences::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    audit::record(
        &mut conn,
        user.user_id,
        "review",
        "correspondence",
        Some(correspondence_id),
        None,
        &client,
    );

    let updated = find_correspondence(&mut conn, correspondence_id)?;
    let response = build_responses(&mut conn, vec![updated])?
        .pop()
        .ok_or_else(AppError::not_found)?;
    Ok(Json(response))
}

pub(crate) fn find_correspondence(
    conn: &mut SqliteConnection,
    correspondence_id: i32,
) -> AppResult<Correspondence> {
    correspondences::table
        .filter(correspondences::id.eq(correspondence_id))
        .filter(correspondences::deleted_at.is_null())
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

fn ensure_entity_exists(
    conn: &mut SqliteConnection,
    entity_id: i32,
    label: &str,
) -> AppResult<()> {
    let exists: Option<i32> = entities::table
        .filter(entities::id.eq(entity_id))
        .filter(entities::deleted_at.is_null())
        .select(entities::id)
        .first(conn)
        .optional()?;
    if exists.is_none() {
        return Err(AppError::new(
            StatusCode::NOT_FOUND,
            format!("{label} not found"),
        ));
    }
    Ok(())
}

fn build_responses(
    conn: &mut SqliteConnection,
    rows: Vec<Correspondence>,
) -> AppResult<Vec<CorrespondenceResponse>> {
    let mut entity_ids: Vec<i32> = Vec::with_capacity(rows.len() * 2);
    let mut creator_ids: Vec<i32> = Vec::with_capacity(rows.len());
    for row in &rows {
        entity_ids.push(row.sender_entity_id);
        entity_ids.push(row.receiver_entity_id);
        creator_ids.push(row.created_by);
    }

    let entities_map = load_entities(conn, &entity_ids)?;
    let users_map = load_user_summaries(conn, &creator_ids)?;

    Ok(rows
        .into_iter()
        .map(|row| CorrespondenceResponse {
            sender_entity: entities_map.get(&row.sender_entity_id).cloned(),
            receiver_entity: entities_map.get(&row.receiver_entity_id).cloned(),
            creator: users_map.get(&row.created_by).cloned(),
            id: row.id,
            reference_number: row.reference_number,
            kind: row.kind,
            subject: row.subject,
            description: row.description,
            sender_entity_id: row.sender_entity_id,
            receiver_entity_id: row.receiver_entity_id,
            correspondence_date: to_iso(row.correspondence_date),
            review_status: row.review_status,
            current_status: row.current_status,
            created_by: row.created_by,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at.map(to_iso),
            created_at: to_iso(row.created_at),
            updated_at: to_iso(row.updated_at),
        })
        .collect())
}

fn load_entities(
    conn: &mut SqliteConnection,
    entity_ids: &[i32],
) -> AppResult<HashMap<i32, EntityResponse>> {
    if entity_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut ids = entity_ids.to_vec();
    ids.sort();
    ids.dedup();

    let rows: Vec<Entity> = entities::table
        .filter(entities::id.eq_any(&ids))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|entity| (entity.id, EntityResponse::from(entity)))
        .collect())
}

pub(crate) fn load_user_summaries(
    conn: &mut SqliteConnection,
    user_ids: &[i32],
) -> AppResult<HashMap<i32, UserSummary>> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut ids = user_ids.to_vec();
    ids.sort();
    ids.dedup();

    let rows: Vec<(i32, String, String, String)> = users::table
        .filter(users::id.eq_any(&ids))
        .select((
            users::id,
            users::username,
            users::full_name_ar,
            users::full_name_en,
        ))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(id, username, full_name_ar, full_name_en)| {
            (
                id,
                UserSummary {
                    id,
                    username,
                    full_name_ar,
                    full_name_en,
                },
            )
        })
        .collect())
}

fn validated_subject(value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request("subject must not be empty"));
    }
    if trimmed.chars().count() > MAX_SUBJECT_LENGTH {
        return Err(AppError::bad_request(
            "subject must be at most 500 characters",
        ));
    }
    Ok(trimmed.to_string())
}

fn validated_description(value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request("description must not be empty"));
    }
    Ok(trimmed.to_string())
}
