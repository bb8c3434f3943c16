use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tracing::warn;

use crate::models::NewAuditLog;
use crate::schema::audit_logs;

/// Caller metadata attached to audit rows. Extraction never fails; absent
/// headers simply leave the columns null.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip_address = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|value| value.trim().to_string());
        let user_agent = parts
            .headers
            .get("user-agent")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        Ok(Self {
            ip_address,
            user_agent,
        })
    }
}

/// Best-effort: a failed audit insert is logged server-side and never
/// propagated, so it cannot fail the operation being audited.
pub fn record(
    conn: &mut SqliteConnection,
    user_id: i32,
    action: &str,
    resource: &str,
    resource_id: Option<i32>,
    details: Option<String>,
    client: &ClientInfo,
) {
    let row = NewAuditLog {
        user_id,
        action: action.to_string(),
        resource: resource.to_string(),
        resource_id,
        details,
        ip_address: client.ip_address.clone(),
        user_agent: client.user_agent.clone(),
    };

    if let Err(err) = diesel::insert_into(audit_logs::table)
        .values(&row)
        .execute(conn)
    {
        warn!(error = %err, action, resource, "failed to record audit log entry");
    }
}
