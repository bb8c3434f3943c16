use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod attachments;
pub mod audit_logs;
pub mod auth;
pub mod correspondences;
pub mod dashboard;
pub mod entities;
pub mod health;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    // Multipart framing adds overhead on top of the configured file size cap.
    let body_limit = state.config.upload_max_size as usize + 1024 * 1024;

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/me", get(auth::me));

    let correspondence_routes = Router::new()
        .route(
            "/",
            get(correspondences::list_correspondences).post(correspondences::create_correspondence),
        )
        .route(
            "/:id",
            get(correspondences::get_correspondence)
                .put(correspondences::update_correspondence)
                .delete(correspondences::delete_correspondence),
        )
        .route("/:id/reply", post(correspondences::add_reply))
        .route("/:id/status", patch(correspondences::update_status))
        .route("/:id/review", post(correspondences::review_correspondence));

    let attachment_routes = Router::new()
        .route(
            "/:id",
            post(attachments::upload_attachment).delete(attachments::delete_attachment),
        )
        .route("/:id/download", get(attachments::download_attachment));

    let entity_routes = Router::new()
        .route(
            "/",
            get(entities::list_entities).post(entities::create_entity),
        )
        .route(
            "/:id",
            get(entities::get_entity)
                .put(entities::update_entity)
                .delete(entities::delete_entity),
        );

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        );

    let dashboard_routes = Router::new().route("/stats", get(dashboard::get_stats));

    let audit_routes = Router::new()
        .route("/", get(audit_logs::list_audit_logs))
        .route("/:id", get(audit_logs::get_audit_log));

    Router::new()
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/correspondences", correspondence_routes)
        .nest("/api/v1/attachments", attachment_routes)
        .nest("/api/v1/entities", entity_routes)
        .nest("/api/v1/users", user_routes)
        .nest("/api/v1/dashboard", dashboard_routes)
        .nest("/api/v1/audit-logs", audit_routes)
        .route("/api/v1/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
