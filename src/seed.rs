use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tracing::info;

use crate::auth::password;
use crate::models::{NewPermission, NewRole, NewRolePermission, NewUser};
use crate::schema::{permissions, role_permissions, roles, users};

const ROLES: &[(&str, &str, &str, &str)] = &[
    (
        "admin",
        "مدير",
        "Full system administrator",
        "مدير النظام الكامل",
    ),
    (
        "reviewer",
        "مراجع",
        "Can review and approve correspondences",
        "يمكنه مراجعة والموافقة على المكاتبات",
    ),
    (
        "employee",
        "موظف",
        "Can create and manage correspondences",
        "يمكنه إنشاء وإدارة المكاتبات",
    ),
    ("viewer", "مشاهد", "Read-only access", "صلاحية القراءة فقط"),
];

const PERMISSIONS: &[(&str, &str)] = &[
    ("correspondence:create", "إنشاء مكاتبة"),
    ("correspondence:read", "قراءة مكاتبة"),
    ("correspondence:update", "تعديل مكاتبة"),
    ("correspondence:delete", "حذف مكاتبة"),
    ("correspondence:review", "مراجعة مكاتبة"),
    ("user:create", "إنشاء مستخدم"),
    ("user:read", "قراءة مستخدم"),
    ("user:update", "تعديل مستخدم"),
    ("user:delete", "حذف مستخدم"),
    ("entity:create", "إنشاء جهة"),
    ("entity:read", "قراءة جهة"),
    ("entity:update", "تعديل جهة"),
    ("entity:delete", "حذف جهة"),
    ("report:read", "قراءة التقارير"),
];

const REVIEWER_GRANTS: &[&str] = &[
    "correspondence:read",
    "correspondence:review",
    "report:read",
    "entity:read",
];

const EMPLOYEE_GRANTS: &[&str] = &[
    "correspondence:create",
    "correspondence:read",
    "correspondence:update",
    "entity:read",
];

const VIEWER_GRANTS: &[&str] = &["correspondence:read", "entity:read"];

/// Idempotent reference-data seeding: roles, permissions, and the per-role
/// grants. A bootstrap admin account is created only when the users table is
/// empty.
pub fn run(conn: &mut SqliteConnection, admin_password: &str) -> Result<()> {
    for &(name, name_ar, description, description_ar) in ROLES {
        diesel::insert_or_ignore_into(roles::table)
            .values(&NewRole {
                name,
                name_ar,
                description: Some(description),
                description_ar: Some(description_ar),
            })
            .execute(conn)
            .with_context(|| format!("failed to seed role {name}"))?;
    }

    for &(name, name_ar) in PERMISSIONS {
        let (resource, action) = name
            .split_once(':')
            .context("permission names use resource:action form")?;
        diesel::insert_or_ignore_into(permissions::table)
            .values(&NewPermission {
                name,
                name_ar,
                resource,
                action,
            })
            .execute(conn)
            .with_context(|| format!("failed to seed permission {name}"))?;
    }

    let all_permissions: Vec<String> = PERMISSIONS.iter().map(|(name, _)| name.to_string()).collect();
    grant(conn, "admin", &all_permissions)?;
    grant(conn, "reviewer", REVIEWER_GRANTS)?;
    grant(conn, "employee", EMPLOYEE_GRANTS)?;
    grant(conn, "viewer", VIEWER_GRANTS)?;

    bootstrap_admin(conn, admin_password)?;

    Ok(())
}

fn grant<S: AsRef<str>>(conn: &mut SqliteConnection, role: &str, grants: &[S]) -> Result<()> {
    let role_id: i32 = roles::table
        .filter(roles::name.eq(role))
        .select(roles::id)
        .first(conn)
        .with_context(|| format!("role {role} missing after seeding"))?;

    for permission in grants {
        let permission = permission.as_ref();
        let permission_id: i32 = permissions::table
            .filter(permissions::name.eq(permission))
            .select(permissions::id)
            .first(conn)
            .with_context(|| format!("permission {permission} missing after seeding"))?;

        diesel::insert_or_ignore_into(role_permissions::table)
            .values(&NewRolePermission {
                role_id,
                permission_id,
            })
            .execute(conn)
            .with_context(|| format!("failed to grant {permission} to {role}"))?;
    }

    Ok(())
}

fn bootstrap_admin(conn: &mut SqliteConnection, admin_password: &str) -> Result<()> {
    let user_count: i64 = users::table.count().get_result(conn)?;
    if user_count > 0 {
        return Ok(());
    }

    let role_id: i32 = roles::table
        .filter(roles::name.eq("admin"))
        .select(roles::id)
        .first(conn)?;

    let password_hash = password::hash_password(admin_password)?;
    diesel::insert_into(users::table)
        .values(&NewUser {
            username: "admin".to_string(),
            email: "admin@tarasul.local".to_string(),
            password_hash,
            full_name_ar: "مدير النظام".to_string(),
            full_name_en: "System Administrator".to_string(),
            role_id,
            is_active: true,
        })
        .execute(conn)?;

    info!("bootstrapped default admin account");
    Ok(())
}
