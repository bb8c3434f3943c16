use axum::{extract::State, Json};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use crate::{
    auth::AuthenticatedUser,
    error::AppResult,
    schema::{correspondences, entities, users},
    state::AppState,
    workflow::CorrespondenceStatus,
};

#[derive(Serialize)]
pub struct StatusBreakdown {
    pub draft: i64,
    pub sent: i64,
    pub received: i64,
    pub under_review: i64,
    pub replied: i64,
    pub closed: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_correspondences: i64,
    pub incoming_count: i64,
    pub outgoing_count: i64,
    pub pending_review: i64,
    pub under_review: i64,
    pub total_entities: i64,
    pub total_users: i64,
    pub this_month_count: i64,
    pub this_week_count: i64,
    pub today_count: i64,
    pub completed_count: i64,
    pub draft_count: i64,
    pub replied_count: i64,
    pub status_breakdown: StatusBreakdown,
    pub completion_rate: f64,
}

pub async fn get_stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<DashboardStats>> {
    let mut conn = state.db()?;

    let total_correspondences = live_correspondences().count().get_result(&mut conn)?;
    let incoming_count = live_correspondences()
        .filter(correspondences::kind.eq("incoming"))
        .count()
        .get_result(&mut conn)?;
    let outgoing_count = live_correspondences()
        .filter(correspondences::kind.eq("outgoing"))
        .count()
        .get_result(&mut conn)?;
    let pending_review = live_correspondences()
        .filter(correspondences::review_status.eq("not_reviewed"))
        .count()
        .get_result(&mut conn)?;

    let status_breakdown = StatusBreakdown {
        draft: status_count(&mut conn, CorrespondenceStatus::Draft)?,
        sent: status_count(&mut conn, CorrespondenceStatus::Sent)?,
        received: status_count(&mut conn, CorrespondenceStatus::Received)?,
        under_review: status_count(&mut conn, CorrespondenceStatus::UnderReview)?,
        replied: status_count(&mut conn, CorrespondenceStatus::Replied)?,
        closed: status_count(&mut conn, CorrespondenceStatus::Closed)?,
    };

    let total_entities = entities::table
        .filter(entities::deleted_at.is_null())
        .filter(entities::is_active.eq(true))
        .count()
        .get_result(&mut conn)?;
    let total_users = users::table
        .filter(users::deleted_at.is_null())
        .filter(users::is_active.eq(true))
        .count()
        .get_result(&mut conn)?;

    // Period boundaries are local wall-clock midnights translated to the
    // UTC timestamps stored in the database.
    let today = Local::now().date_naive();
    let today_start = local_day_start_utc(today);
    let week_start = local_day_start_utc(today - Duration::days(7));
    let month_start = local_day_start_utc(today.with_day(1).expect("valid first of month"));

    let today_count = created_since(&mut conn, today_start)?;
    let this_week_count = created_since(&mut conn, week_start)?;
    let this_month_count = created_since(&mut conn, month_start)?;

    let completed_count = status_breakdown.closed;
    let draft_count = status_breakdown.draft;
    let replied_count = status_breakdown.replied;
    let completion_rate = completion_rate(completed_count, total_correspondences);

    Ok(Json(DashboardStats {
        total_correspondences,
        incoming_count,
        outgoing_count,
        pending_review,
        under_review: status_breakdown.under_review,
        total_entities,
        total_users,
        this_month_count,
        this_week_count,
        today_count,
        completed_count,
        draft_count,
        replied_count,
        status_breakdown,
        completion_rate,
    }))
}

type LiveCorrespondences = diesel::dsl::Filter<
    correspondences::table,
    diesel::dsl::IsNull<correspondences::deleted_at>,
>;

fn live_correspondences() -> LiveCorrespondences {
    correspondences::table.filter(correspondences::deleted_at.is_null())
}

fn status_count(conn: &mut SqliteConnection, status: CorrespondenceStatus) -> QueryResult<i64> {
    live_correspondences()
        .filter(correspondences::current_status.eq(status.as_str()))
        .count()
        .get_result(conn)
}

fn created_since(conn: &mut SqliteConnection, start: NaiveDateTime) -> QueryResult<i64> {
    live_correspondences()
        .filter(correspondences::created_at.ge(start))
        .count()
        .get_result(conn)
}

fn local_day_start_utc(date: NaiveDate) -> NaiveDateTime {
    let midnight = date.and_hms_opt(0, 0, 0).expect("valid midnight");
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.naive_utc())
        .unwrap_or(midnight)
}

/// Percentage of closed correspondences, rounded to one decimal place.
fn completion_rate(closed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (closed as f64 / total as f64 * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::completion_rate;

    #[test]
    fn completion_rate_rounds_to_one_decimal() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(0, 10), 0.0);
        assert_eq!(completion_rate(10, 10), 100.0);
        assert_eq!(completion_rate(1, 3), 33.3);
        assert_eq!(completion_rate(2, 3), 66.7);
    }
}
