// Not every integration-test binary exercises every helper.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use http_body_util::BodyExt;
use serde::Serialize;
use tarasul::auth::jwt::JwtService;
use tarasul::auth::password;
use tarasul::config::AppConfig;
use tarasul::db;
use tarasul::models::NewUser;
use tarasul::routes;
use tarasul::seed;
use tarasul::state::AppState;
use tarasul::storage::{AttachmentStore, LocalStorage};
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestApp {
    pub state: AppState,
    pub upload_dir: PathBuf,
    router: Router,
    _workspace: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let workspace = tempfile::tempdir().context("failed to create test workspace")?;
        let database_path = workspace.path().join("tarasul-test.db");
        let upload_dir = workspace.path().join("uploads");

        let config = AppConfig {
            database_url: database_path.to_string_lossy().into_owned(),
            database_max_pool_size: 2,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_access_expiry_minutes: 15,
            jwt_refresh_expiry_days: 7,
            upload_dir: upload_dir.to_string_lossy().into_owned(),
            upload_max_size: 256 * 1024,
            cors_allowed_origin: None,
            admin_password: "admin123".to_string(),
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        {
            let mut conn = pool.get().context("failed to acquire connection")?;
            db::run_migrations(&mut conn)?;
            seed::run(&mut conn, &config.admin_password)?;
        }

        let storage: Arc<dyn AttachmentStore> = Arc::new(LocalStorage::new(&upload_dir)?);
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, storage, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            upload_dir,
            router,
            _workspace: workspace,
        })
    }

    pub async fn insert_user(&self, username: &str, pass: &str, role: &str) -> Result<i32> {
        let username = username.to_string();
        let pass = pass.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            use tarasul::schema::{roles, users};

            let role_id: i32 = roles::table
                .filter(roles::name.eq(&role))
                .select(roles::id)
                .first(conn)
                .with_context(|| format!("role {role} is not seeded"))?;

            let password_hash = password::hash_password(&pass)?;
            let user: tarasul::models::User = diesel::insert_into(users::table)
                .values(&NewUser {
                    username,
                    email: format!("{}@example.com", unique_suffix()),
                    password_hash,
                    full_name_ar: "مستخدم اختبار".to_string(),
                    full_name_en: "Test User".to_string(),
                    role_id,
                    is_active: true,
                })
                .returning(tarasul::models::User::as_returning())
                .get_result(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    pub async fn deactivate_user(&self, user_id: i32) -> Result<()> {
        self.with_conn(move |conn| {
            use tarasul::schema::users;
            diesel::update(users::table.find(user_id))
                .set(users::is_active.eq(false))
                .execute(conn)
                .context("failed to deactivate user")?;
            Ok(())
        })
        .await
    }

    pub async fn login_token(&self, username: &str, pass: &str) -> Result<String> {
        let parsed = self.login(username, pass).await?;
        Ok(parsed.access_token)
    }

    pub async fn login(&self, username: &str, pass: &str) -> Result<LoginTokens> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/v1/auth/login",
                &LoginPayload {
                    username,
                    password: pass,
                },
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        let parsed: LoginTokens = serde_json::from_slice(&body)?;
        Ok(parsed)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.request(Method::DELETE, path, None, token).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.request(Method::POST, path, Some(body), token).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.request(Method::PUT, path, Some(body), token).await
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.request(Method::PATCH, path, Some(body), token).await
    }

    pub async fn upload_attachment(
        &self,
        correspondence_id: i32,
        filename: &str,
        content_type: &str,
        data: &[u8],
        direction: Option<&str>,
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = "test-boundary-7f92c1d4";
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        body.extend(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend(data);
        body.extend(b"\r\n");

        if let Some(direction) = direction {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(b"Content-Disposition: form-data; name=\"type\"\r\n\r\n");
            body.extend(direction.as_bytes());
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/attachments/{correspondence_id}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;

        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

#[derive(serde::Deserialize)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_to_json(body: Body) -> Result<serde_json::Value> {
    let bytes = body_to_vec(body).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Unique-enough suffix for generated test emails.
fn unique_suffix() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("user{n}-{}", std::process::id())
}
