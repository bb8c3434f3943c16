use std::sync::Arc;

use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::sqlite::SqliteConnection;

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::SqlitePool,
    error::{AppError, AppResult},
    storage::AttachmentStore,
};

type SqlitePooledConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn AttachmentStore>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        config: AppConfig,
        storage: Arc<dyn AttachmentStore>,
        jwt: JwtService,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            storage,
            jwt,
        }
    }

    pub fn db(&self) -> AppResult<SqlitePooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
