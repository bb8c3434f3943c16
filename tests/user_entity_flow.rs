mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_to_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn entity_crud_roundtrip() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("alice", "s3cret", "admin").await?;
    let token = app.login_token("alice", "s3cret").await?;

    let response = app
        .post_json(
            "/api/v1/entities",
            &json!({
                "name_ar": "وزارة المالية",
                "name_en": "Ministry of Finance",
                "type": "government",
                "contact_email": "info@mof.example.gov",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let entity = body_to_json(response.into_body()).await?;
    let id = entity["id"].as_i64().unwrap();
    assert_eq!(entity["type"], "government");
    assert_eq!(entity["is_active"], true);

    let response = app
        .get("/api/v1/entities?search=Finance", Some(&token))
        .await?;
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["name_en"], "Ministry of Finance");

    let response = app
        .put_json(
            &format!("/api/v1/entities/{id}"),
            &json!({ "is_active": false, "contact_person": "Budget office" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_to_json(response.into_body()).await?;
    assert_eq!(updated["is_active"], false);
    assert_eq!(updated["contact_person"], "Budget office");

    let response = app
        .delete(&format!("/api/v1/entities/{id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/v1/entities/{id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn entity_validation_rejects_bad_payloads() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("alice", "s3cret", "admin").await?;
    let token = app.login_token("alice", "s3cret").await?;

    let response = app
        .post_json(
            "/api/v1/entities",
            &json!({ "name_ar": " ", "name_en": "X", "type": "government" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/api/v1/entities",
            &json!({ "name_ar": "جهة", "name_en": "X", "type": "galaxy" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/api/v1/entities",
            &json!({
                "name_ar": "جهة",
                "name_en": "X",
                "type": "external",
                "contact_email": "not-an-email",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn user_crud_roundtrip_and_password_change() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("root", "s3cret", "admin").await?;
    let token = app.login_token("root", "s3cret").await?;

    let role_id = app
        .with_conn(|conn| {
            use diesel::prelude::*;
            use tarasul::schema::roles;
            roles::table
                .filter(roles::name.eq("employee"))
                .select(roles::id)
                .first::<i32>(conn)
                .map_err(Into::into)
        })
        .await?;

    let response = app
        .post_json(
            "/api/v1/users",
            &json!({
                "username": "clerk1",
                "email": "clerk1@example.com",
                "password": "initial1",
                "full_name_ar": "موظف أول",
                "full_name_en": "First Clerk",
                "role_id": role_id,
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_to_json(response.into_body()).await?;
    let user_id = created["id"].as_i64().unwrap();
    assert_eq!(created["role"]["name"], "employee");
    assert!(created.get("password_hash").is_none());

    // Duplicate username is a conflict surfaced as 400.
    let response = app
        .post_json(
            "/api/v1/users",
            &json!({
                "username": "clerk1",
                "email": "other@example.com",
                "password": "initial1",
                "full_name_ar": "موظف",
                "full_name_en": "Clerk",
                "role_id": role_id,
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.login_token("clerk1", "initial1").await?;

    let response = app
        .put_json(
            &format!("/api/v1/users/{user_id}"),
            &json!({ "password": "rotated1" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(app.login_token("clerk1", "initial1").await.is_err());
    app.login_token("clerk1", "rotated1").await?;

    let response = app
        .delete(&format!("/api/v1/users/{user_id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Soft-deleted accounts cannot authenticate.
    assert!(app.login_token("clerk1", "rotated1").await.is_err());
    Ok(())
}

#[tokio::test]
async fn user_create_validates_role_and_password() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("root", "s3cret", "admin").await?;
    let token = app.login_token("root", "s3cret").await?;

    let response = app
        .post_json(
            "/api/v1/users",
            &json!({
                "username": "clerk2",
                "email": "clerk2@example.com",
                "password": "short",
                "full_name_ar": "موظف",
                "full_name_en": "Clerk",
                "role_id": 1,
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/api/v1/users",
            &json!({
                "username": "clerk2",
                "email": "clerk2@example.com",
                "password": "longenough",
                "full_name_ar": "موظف",
                "full_name_en": "Clerk",
                "role_id": 9999,
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn audit_logs_are_admin_only_and_capture_logins() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("root", "s3cret", "admin").await?;
    app.insert_user("clerk", "s3cret", "employee").await?;

    let admin_token = app.login_token("root", "s3cret").await?;
    let clerk_token = app.login_token("clerk", "s3cret").await?;

    let response = app.get("/api/v1/audit-logs", Some(&clerk_token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/api/v1/audit-logs", Some(&admin_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["pagination"]["limit"], 20);
    let logins = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|entry| entry["action"] == "login")
        .count();
    assert_eq!(logins, 2);

    let response = app
        .get("/api/v1/audit-logs?action=login", Some(&admin_token))
        .await?;
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["pagination"]["total"], 2);
    Ok(())
}

#[tokio::test]
async fn dashboard_stats_reflect_the_store() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("alice", "s3cret", "admin").await?;
    let token = app.login_token("alice", "s3cret").await?;

    let response = app
        .post_json(
            "/api/v1/entities",
            &json!({ "name_ar": "جهة", "name_en": "Sender", "type": "government" }),
            Some(&token),
        )
        .await?;
    let sender = body_to_json(response.into_body()).await?["id"]
        .as_i64()
        .unwrap();
    let response = app
        .post_json(
            "/api/v1/entities",
            &json!({ "name_ar": "جهة أخرى", "name_en": "Receiver", "type": "external" }),
            Some(&token),
        )
        .await?;
    let receiver = body_to_json(response.into_body()).await?["id"]
        .as_i64()
        .unwrap();

    let mut last_id = 0;
    for i in 0..4 {
        let response = app
            .post_json(
                "/api/v1/correspondences",
                &json!({
                    "type": if i % 2 == 0 { "incoming" } else { "outgoing" },
                    "subject": format!("Letter {i}"),
                    "description": "stats",
                    "sender_entity_id": sender,
                    "receiver_entity_id": receiver,
                    "correspondence_date": "2025-06-01T09:00:00Z",
                }),
                Some(&token),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        last_id = body_to_json(response.into_body()).await?["id"]
            .as_i64()
            .unwrap();
    }

    let response = app
        .patch_json(
            &format!("/api/v1/correspondences/{last_id}/status"),
            &json!({ "status": "closed" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/api/v1/dashboard/stats", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_to_json(response.into_body()).await?;

    assert_eq!(stats["totalCorrespondences"], 4);
    assert_eq!(stats["incomingCount"], 2);
    assert_eq!(stats["outgoingCount"], 2);
    assert_eq!(stats["pendingReview"], 4);
    assert_eq!(stats["completedCount"], 1);
    assert_eq!(stats["statusBreakdown"]["draft"], 3);
    assert_eq!(stats["statusBreakdown"]["closed"], 1);
    assert_eq!(stats["completionRate"], 25.0);
    assert_eq!(stats["totalEntities"], 2);
    assert_eq!(stats["todayCount"], 4);
    Ok(())
}
