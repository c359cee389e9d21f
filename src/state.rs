use crate::bot::notify::Notifier;
use sqlx::PgPool;
use std::sync::Arc;

pub struct AppState {
    pub pool: PgPool,
    pub notifier: Arc<dyn Notifier>,
}

pub type SharedState = Arc<AppState>;
