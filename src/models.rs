use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = roles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Role {
    pub id: i32,
    pub name: String,
    pub name_ar: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = roles)]
pub struct NewRole<'a> {
    pub name: &'a str,
    pub name_ar: &'a str,
    pub description: Option<&'a str>,
    pub description_ar: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = permissions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Permission {
    pub id: i32,
    pub name: String,
    pub name_ar: String,
    pub resource: String,
    pub action: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = permissions)]
pub struct NewPermission<'a> {
    pub name: &'a str,
    pub name_ar: &'a str,
    pub resource: &'a str,
    pub action: &'a str,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = role_permissions)]
pub struct NewRolePermission {
    pub role_id: i32,
    pub permission_id: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = users)]
#[diesel(belongs_to(Role))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name_ar: String,
    pub full_name_en: String,
    pub role_id: i32,
    pub is_active: bool,
    pub last_login: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name_ar: String,
    pub full_name_en: String,
    pub role_id: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = entities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Entity {
    pub id: i32,
    pub name_ar: String,
    pub name_en: String,
    pub kind: String,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = entities)]
pub struct NewEntity {
    pub name_ar: String,
    pub name_en: String,
    pub kind: String,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = correspondences)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Correspondence {
    pub id: i32,
    pub reference_number: String,
    pub kind: String,
    pub subject: String,
    pub description: String,
    pub sender_entity_id: i32,
    pub receiver_entity_id: i32,
    pub correspondence_date: NaiveDateTime,
    pub review_status: String,
    pub current_status: String,
    pub created_by: i32,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = correspondences)]
pub struct NewCorrespondence {
    pub reference_number: String,
    pub kind: String,
    pub subject: String,
    pub description: String,
    pub sender_entity_id: i32,
    pub receiver_entity_id: i32,
    pub correspondence_date: NaiveDateTime,
    pub review_status: String,
    pub current_status: String,
    pub created_by: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = correspondence_replies)]
#[diesel(belongs_to(Correspondence))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CorrespondenceReply {
    pub id: i32,
    pub correspondence_id: i32,
    pub parent_reply_id: Option<i32>,
    pub subject: String,
    pub body: String,
    pub created_by: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = correspondence_replies)]
pub struct NewCorrespondenceReply {
    pub correspondence_id: i32,
    pub parent_reply_id: Option<i32>,
    pub subject: String,
    pub body: String,
    pub created_by: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = attachments)]
#[diesel(belongs_to(Correspondence))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Attachment {
    pub id: i32,
    pub correspondence_id: i32,
    pub file_name: String,
    pub original_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = attachments)]
pub struct NewAttachment {
    pub correspondence_id: i32,
    pub file_name: String,
    pub original_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = status_history)]
#[diesel(belongs_to(Correspondence))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StatusHistory {
    pub id: i32,
    pub correspondence_id: i32,
    pub old_status: String,
    pub new_status: String,
    pub changed_by: i32,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = status_history)]
pub struct NewStatusHistory {
    pub correspondence_id: i32,
    pub old_status: String,
    pub new_status: String,
    pub changed_by: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = audit_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuditLog {
    pub id: i32,
    pub user_id: i32,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<i32>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLog {
    pub user_id: i32,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<i32>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
