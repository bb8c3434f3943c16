use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::AuditLog,
    pagination::{PageParams, Paginated},
    schema::audit_logs,
    state::AppState,
};

use super::correspondences::load_user_summaries;
use super::to_iso;
use super::users::UserSummary;

const AUDIT_PAGE_SIZE: i64 = 20;

#[derive(Deserialize)]
pub struct AuditLogListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub user_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct AuditLogResponse {
    pub id: i32,
    pub user_id: i32,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<i32>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

fn to_response(entry: AuditLog, user: Option<UserSummary>) -> AuditLogResponse {
    AuditLogResponse {
        id: entry.id,
        user_id: entry.user_id,
        action: entry.action,
        resource: entry.resource,
        resource_id: entry.resource_id,
        details: entry.details,
        ip_address: entry.ip_address,
        user_agent: entry.user_agent,
        created_at: to_iso(entry.created_at),
        user,
    }
}

fn filtered(params: &AuditLogListQuery) -> audit_logs::BoxedQuery<'static, Sqlite> {
    let mut query = audit_logs::table.into_boxed();

    if let Some(action) = params
        .action
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        query = query.filter(audit_logs::action.eq(action.to_string()));
    }
    if let Some(resource) = params
        .resource
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        query = query.filter(audit_logs::resource.eq(resource.to_string()));
    }
    if let Some(user_id) = params.user_id {
        query = query.filter(audit_logs::user_id.eq(user_id));
    }
    if let Some(start_date) = params.start_date {
        let start = start_date.and_hms_opt(0, 0, 0).expect("valid midnight");
        query = query.filter(audit_logs::created_at.ge(start));
    }
    if let Some(end_date) = params.end_date {
        let end = end_date.and_hms_opt(23, 59, 59).expect("valid end of day");
        query = query.filter(audit_logs::created_at.le(end));
    }

    query
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<AuditLogListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Paginated<AuditLogResponse>>> {
    user.require_role(&["admin"])?;

    let page = PageParams::new(params.page, params.limit, AUDIT_PAGE_SIZE);
    let mut conn = state.db()?;

    let total: i64 = filtered(&params).count().get_result(&mut conn)?;
    let rows: Vec<AuditLog> = filtered(&params)
        .order(audit_logs::created_at.desc())
        .then_order_by(audit_logs::id.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(&mut conn)?;

    let user_ids: Vec<i32> = rows.iter().map(|entry| entry.user_id).collect();
    let users_map = load_user_summaries(&mut conn, &user_ids)?;

    let data = rows
        .into_iter()
        .map(|entry| {
            let user = users_map.get(&entry.user_id).cloned();
            to_response(entry, user)
        })
        .collect();
    Ok(Json(Paginated::new(data, total, page)))
}

pub async fn get_audit_log(
    State(state): State<AppState>,
    Path(audit_log_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<Json<AuditLogResponse>> {
    user.require_role(&["admin"])?;

    let mut conn = state.db()?;
    let entry: AuditLog = audit_logs::table
        .find(audit_log_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let users_map = load_user_summaries(&mut conn, &[entry.user_id])?;
    let user = users_map.get(&entry.user_id).cloned();
    Ok(Json(to_response(entry, user)))
}
