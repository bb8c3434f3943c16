pub mod jwt;
pub mod password;

use std::collections::BTreeSet;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::{Role, User},
    schema::{permissions, role_permissions, roles, users},
    state::AppState,
};

pub const ADMIN_ROLE: &str = "admin";

/// Identity resolved from a bearer token: the user row joined with its role
/// and the permission names granted to that role.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub role: String,
    pub permissions: BTreeSet<String>,
}

impl AuthenticatedUser {
    /// Role names are canonically lowercase; comparisons stay
    /// case-insensitive so a capitalized role in older data keeps working.
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case(ADMIN_ROLE)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_admin() || self.permissions.contains(permission)
    }

    pub fn require_permission(&self, permission: &str) -> AppResult<()> {
        if self.has_permission(permission) {
            return Ok(());
        }
        Err(AppError::forbidden("insufficient permissions"))
    }

    pub fn require_role(&self, allowed: &[&str]) -> AppResult<()> {
        if allowed
            .iter()
            .any(|role| self.role.eq_ignore_ascii_case(role))
        {
            return Ok(());
        }
        Err(AppError::forbidden("insufficient role privileges"))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_access_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        let mut conn = state.db()?;
        load_identity(&mut conn, claims.sub)?.ok_or_else(AppError::unauthorized)
    }
}

pub fn load_identity(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> AppResult<Option<AuthenticatedUser>> {
    let row: Option<(User, Role)> = users::table
        .inner_join(roles::table)
        .filter(users::id.eq(user_id))
        .filter(users::is_active.eq(true))
        .filter(users::deleted_at.is_null())
        .select((User::as_select(), Role::as_select()))
        .first(conn)
        .optional()?;

    let Some((user, role)) = row else {
        return Ok(None);
    };

    let granted: Vec<String> = role_permissions::table
        .inner_join(permissions::table)
        .filter(role_permissions::role_id.eq(role.id))
        .select(permissions::name)
        .load(conn)?;

    Ok(Some(AuthenticatedUser {
        user_id: user.id,
        username: user.username,
        email: user.email,
        role: role.name,
        permissions: granted.into_iter().collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::AuthenticatedUser;
    use std::collections::BTreeSet;

    fn user(role: &str, permissions: &[&str]) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: 1,
            username: "test".to_string(),
            email: "test@example.com".to_string(),
            role: role.to_string(),
            permissions: permissions
                .iter()
                .map(|p| p.to_string())
                .collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn admin_passes_any_permission_check() {
        let admin = user("admin", &[]);
        assert!(admin.has_permission("entity:delete"));
        assert!(admin.require_permission("correspondence:review").is_ok());
    }

    #[test]
    fn admin_role_comparison_ignores_case() {
        let admin = user("Admin", &[]);
        assert!(admin.is_admin());
        assert!(admin.require_role(&["admin"]).is_ok());
    }

    #[test]
    fn granted_permission_passes_and_missing_fails() {
        let viewer = user("viewer", &["correspondence:read"]);
        assert!(viewer.require_permission("correspondence:read").is_ok());
        assert!(viewer.require_permission("entity:delete").is_err());
    }

    #[test]
    fn role_allow_list_rejects_outsiders() {
        let employee = user("employee", &[]);
        assert!(employee.require_role(&["admin"]).is_err());
    }
}
