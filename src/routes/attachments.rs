use std::path::Path as FsPath;

use axum::extract::{Multipart, Path, State};
use axum::http::{
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    HeaderMap, HeaderValue, StatusCode,
};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use rand::Rng;
use tracing::{error, info, warn};

use crate::{
    audit::{self, ClientInfo},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{Attachment, NewAttachment},
    schema::attachments,
    state::AppState,
    storage::normalize_relative_path,
    workflow::CorrespondenceKind,
};

use super::correspondences::{find_correspondence, AttachmentSummary};

const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/jpeg",
    "image/png",
];

pub async fn upload_attachment(
    State(state): State<AppState>,
    Path(correspondence_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<AttachmentSummary>)> {
    user.require_permission("correspondence:update")?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut direction: Option<CorrespondenceKind> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                original_name = field.file_name().map(|n| n.to_string());
                content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                file_bytes = Some(data.to_vec());
            }
            Some("type") => {
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid type field: {err}"))
                })?;
                direction = match value.trim() {
                    "" => None,
                    "incoming" => Some(CorrespondenceKind::Incoming),
                    "outgoing" => Some(CorrespondenceKind::Outgoing),
                    other => {
                        return Err(AppError::bad_request(format!(
                            "invalid attachment direction '{other}'"
                        )));
                    }
                };
            }
            _ => {}
        }
    }

    let file_bytes = file_bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if file_bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    let original_name =
        original_name.ok_or_else(|| AppError::bad_request("filename is required"))?;

    if file_bytes.len() as u64 > state.config.upload_max_size {
        return Err(AppError::bad_request(format!(
            "file exceeds the maximum upload size of {} bytes",
            state.config.upload_max_size
        )));
    }

    let mime_type = content_type.unwrap_or_else(|| {
        mime_guess::from_path(&original_name)
            .first_or_octet_stream()
            .to_string()
    });
    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(AppError::bad_request(
            "invalid file type. Only PDF, Word, JPG, and PNG files are allowed",
        ));
    }

    {
        let mut conn = state.db()?;
        find_correspondence(&mut conn, correspondence_id)?;
    }

    // Direction is taken from the request; the owning correspondence's own
    // type is not consulted here.
    let direction = direction.unwrap_or(CorrespondenceKind::Incoming);
    let file_name = generate_file_name(&original_name);
    let relative_path = normalize_relative_path(&format!("{}/{}", direction.as_str(), file_name))
        .map_err(|err| AppError::internal(format!("generated path rejected: {err}")))?;

    state
        .storage
        .save(&relative_path, file_bytes.clone())
        .await
        .map_err(|err| {
            error!(error = %err, path = %relative_path, "failed to store attachment");
            AppError::internal(format!("failed to store attachment: {err}"))
        })?;

    let mut conn = state.db()?;
    let attachment: Attachment = diesel::insert_into(attachments::table)
        .values(&NewAttachment {
            correspondence_id,
            file_name,
            original_name,
            file_path: relative_path,
            file_size: file_bytes.len() as i64,
            mime_type,
            uploaded_by: user.user_id,
        })
        .returning(Attachment::as_returning())
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        user.user_id,
        "upload",
        "attachment",
        Some(attachment.id),
        None,
        &client,
    );

    info!(
        attachment_id = attachment.id,
        correspondence_id,
        original_name = %attachment.original_name,
        "attachment uploaded"
    );

    Ok((StatusCode::CREATED, Json(AttachmentSummary::from(attachment))))
}

pub async fn download_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    user.require_permission("correspondence:read")?;

    let mut conn = state.db()?;
    let attachment: Attachment = attachments::table
        .find(attachment_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    drop(conn);

    let relative_path = normalize_relative_path(&attachment.file_path)
        .map_err(|_| AppError::bad_request("stored attachment path is invalid"))?;

    // The row and the file can diverge; a missing file is a 404, not a 500.
    let bytes = state
        .storage
        .read(&relative_path)
        .await
        .map_err(|err| AppError::internal(format!("failed to read attachment: {err}")))?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "file not found"))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&attachment.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&attachment_content_disposition(&attachment.original_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok((headers, bytes))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<i32>,
    user: AuthenticatedUser,
    client: ClientInfo,
) -> AppResult<impl IntoResponse> {
    user.require_permission("correspondence:delete")?;

    let attachment: Attachment = {
        let mut conn = state.db()?;
        attachments::table
            .find(attachment_id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(AppError::not_found)?
    };

    // Disk removal is best-effort; the row goes away regardless so state can
    // only diverge in the recoverable direction.
    match normalize_relative_path(&attachment.file_path) {
        Ok(relative_path) => {
            if let Err(err) = state.storage.remove(&relative_path).await {
                warn!(
                    attachment_id,
                    error = %err,
                    "failed to remove attachment file, deleting row anyway"
                );
            }
        }
        Err(err) => {
            warn!(attachment_id, error = %err, "stored attachment path is invalid, skipping disk removal");
        }
    }

    let mut conn = state.db()?;
    diesel::delete(attachments::table.find(attachment_id)).execute(&mut conn)?;

    audit::record(
        &mut conn,
        user.user_id,
        "delete",
        "attachment",
        Some(attachment_id),
        None,
        &client,
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Millisecond timestamp plus a random suffix, with the original extension
/// retained (sanitized to alphanumerics) so viewers can infer the format.
fn generate_file_name(original_name: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let extension: String = FsPath::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.chars()
                .filter(|ch| ch.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    format!("{millis}-{suffix}{extension}")
}

/// ASCII-safe quoted fallback plus an RFC 5987 `filename*` that round-trips
/// non-ASCII original names.
fn attachment_content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_ascii_graphic() || ch == ' ' => ch,
            _ => '_',
        })
        .collect();

    let encoded = percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::{attachment_content_disposition, generate_file_name};

    #[test]
    fn generated_names_keep_a_sanitized_extension() {
        let name = generate_file_name("quarterly report.PDF");
        assert!(name.ends_with(".PDF"));
        let stem = name.trim_end_matches(".PDF");
        assert!(stem.contains('-'));

        let name = generate_file_name("no-extension");
        assert!(!name.contains('.'));

        let name = generate_file_name("weird.p:df");
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn content_disposition_is_ascii_and_roundtrips_utf8() {
        let header = attachment_content_disposition("تقرير.pdf");
        assert!(header.is_ascii());
        assert!(header.starts_with("attachment; filename=\""));
        assert!(header.contains("filename*=UTF-8''%D8%AA"));
    }

    #[test]
    fn content_disposition_escapes_quotes() {
        let header = attachment_content_disposition("a\"b.pdf");
        assert!(header.contains("filename=\"a_b.pdf\""));
    }
}
