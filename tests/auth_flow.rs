mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_to_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn login_and_me_roundtrip() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("alice", "s3cret", "admin").await?;

    let token = app.login_token("alice", "s3cret").await?;

    let response = app.get("/api/v1/auth/me", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let user = body_to_json(response.into_body()).await?;

    assert_eq!(user["username"], "alice");
    assert_eq!(user["role"], "admin");
    assert!(user["permissions"]
        .as_array()
        .is_some_and(|permissions| !permissions.is_empty()));
    Ok(())
}

#[tokio::test]
async fn login_returns_resolved_permissions() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("vera", "s3cret", "viewer").await?;

    let response = app
        .post_json(
            "/api/v1/auth/login",
            &json!({ "username": "vera", "password": "s3cret" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;

    let permissions: Vec<&str> = body["user"]["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert_eq!(permissions, vec!["correspondence:read", "entity:read"]);
    Ok(())
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("alice", "s3cret", "admin").await?;

    let response = app
        .post_json(
            "/api/v1/auth/login",
            &json!({ "username": "alice", "password": "wrong" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_to_json(response.into_body()).await?;
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn inactive_user_cannot_login_or_use_existing_token() -> Result<()> {
    let app = TestApp::new().await?;
    let user_id = app.insert_user("bob", "s3cret", "employee").await?;

    let token = app.login_token("bob", "s3cret").await?;
    app.deactivate_user(user_id).await?;

    let response = app
        .post_json(
            "/api/v1/auth/login",
            &json!({ "username": "bob", "password": "s3cret" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A still-valid token no longer resolves once the account is disabled.
    let response = app.get("/api/v1/auth/me", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn protected_routes_reject_missing_and_garbled_tokens() -> Result<()> {
    let app = TestApp::new().await?;

    let response = app.get("/api/v1/correspondences", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .get("/api/v1/correspondences", Some("not-a-token"))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refresh_token_is_not_accepted_on_protected_routes() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("alice", "s3cret", "admin").await?;

    let tokens = app.login("alice", "s3cret").await?;
    let response = app
        .get("/api/v1/auth/me", Some(&tokens.refresh_token))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refresh_flow_issues_a_working_access_token() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_user("alice", "s3cret", "admin").await?;

    let tokens = app.login("alice", "s3cret").await?;

    let response = app
        .post_json(
            "/api/v1/auth/refresh",
            &json!({ "refresh_token": tokens.refresh_token }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let response = app.get("/api/v1/auth/me", Some(&access_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    // Access tokens do not drive the refresh endpoint.
    let response = app
        .post_json(
            "/api/v1/auth/refresh",
            &json!({ "refresh_token": tokens.access_token }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn health_check_is_unauthenticated() -> Result<()> {
    let app = TestApp::new().await?;
    let response = app.get("/api/v1/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
