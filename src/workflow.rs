use chrono::{Datelike, Local};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::NewStatusHistory;
use crate::schema::status_history;

/// Synthetic old-status recorded for the transition written at creation.
pub const STATUS_NONE: &str = "none";

/// Note attached to the forced transition when a reply is added.
pub const REPLY_ADDED_NOTE: &str = "Reply added";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrespondenceKind {
    Incoming,
    Outgoing,
}

impl CorrespondenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrespondenceKind::Incoming => "incoming",
            CorrespondenceKind::Outgoing => "outgoing",
        }
    }

    pub fn reference_prefix(&self) -> char {
        match self {
            CorrespondenceKind::Incoming => 'W',
            CorrespondenceKind::Outgoing => 'S',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrespondenceStatus {
    Draft,
    Sent,
    Received,
    UnderReview,
    Replied,
    Closed,
}

impl CorrespondenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrespondenceStatus::Draft => "draft",
            CorrespondenceStatus::Sent => "sent",
            CorrespondenceStatus::Received => "received",
            CorrespondenceStatus::UnderReview => "under_review",
            CorrespondenceStatus::Replied => "replied",
            CorrespondenceStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Reviewed,
    NotReviewed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Reviewed => "reviewed",
            ReviewStatus::NotReviewed => "not_reviewed",
        }
    }
}

/// Direction prefix, four-digit year, zero-padded four-digit random suffix,
/// e.g. `W20250042`. Collisions are possible; the caller retries generation
/// when the unique index rejects the insert.
pub fn generate_reference_number(kind: CorrespondenceKind) -> String {
    let year = Local::now().year();
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("{}{}{:04}", kind.reference_prefix(), year, suffix)
}

/// Every accepted transition funnels through here so the ledger stays
/// append-only and gains exactly one row per transition.
pub fn append_status_history(
    conn: &mut SqliteConnection,
    correspondence_id: i32,
    old_status: &str,
    new_status: &str,
    changed_by: i32,
    notes: Option<String>,
) -> QueryResult<usize> {
    diesel::insert_into(status_history::table)
        .values(&NewStatusHistory {
            correspondence_id,
            old_status: old_status.to_string(),
            new_status: new_status.to_string(),
            changed_by,
            notes,
        })
        .execute(conn)
}

#[cfg(test)]
mod tests {
    use super::{generate_reference_number, CorrespondenceKind, CorrespondenceStatus};

    #[test]
    fn reference_number_has_prefix_year_and_suffix() {
        let incoming = generate_reference_number(CorrespondenceKind::Incoming);
        assert_eq!(incoming.len(), 9);
        assert!(incoming.starts_with('W'));
        assert!(incoming[1..].chars().all(|ch| ch.is_ascii_digit()));

        let outgoing = generate_reference_number(CorrespondenceKind::Outgoing);
        assert!(outgoing.starts_with('S'));
    }

    #[test]
    fn status_names_match_the_stored_representation() {
        assert_eq!(CorrespondenceStatus::UnderReview.as_str(), "under_review");
        let parsed: CorrespondenceStatus = serde_json::from_str("\"under_review\"").unwrap();
        assert_eq!(parsed, CorrespondenceStatus::UnderReview);
        assert!(serde_json::from_str::<CorrespondenceStatus>("\"bogus\"").is_err());
    }
}
