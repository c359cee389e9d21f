mod analytics;
mod bot;
mod db;
mod domain;
mod state;
mod web;

use crate::bot::notify::TelegramNotifier;
use crate::state::SharedState;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")?;
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;

    let notifier = Arc::new(TelegramNotifier::from_env()?);
    let shared: SharedState = Arc::new(state::AppState { pool, notifier });

    // Daily reminder sweep at 10:00 for every active survey with open responses.
    let scheduler = JobScheduler::new().await?;
    let shared_for_reminders = shared.clone();
    scheduler
        .add(Job::new_async("0 0 10 * * *", move |_uuid, _l| {
            let state = shared_for_reminders.clone();
            Box::pin(async move {
                tracing::info!("Starting daily reminder sweep...");
                if let Err(e) = send_daily_reminders(&state).await {
                    tracing::error!("Daily reminder sweep failed: {}", e);
                }
            })
        })?)
        .await?;
    scheduler.start().await?;
    tracing::info!("Scheduler started: daily reminders at 10:00");

    let app = Router::new()
        .merge(web::routes(shared.clone()))
        .layer(TraceLayer::new_for_http());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
        let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        format!("0.0.0.0:{}", port)
    });
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn send_daily_reminders(state: &SharedState) -> anyhow::Result<()> {
    let surveys = db::list_surveys(&state.pool, true).await?;
    for survey in surveys {
        let (sent, failed) = web::outreach::remind_open_responses(state, &survey).await?;
        if sent > 0 || failed > 0 {
            tracing::info!(
                "Survey '{}': {} reminders sent, {} failed",
                survey.title,
                sent,
                failed
            );
        }
    }
    Ok(())
}
