pub mod employees;
pub mod outreach;
pub mod responses;
pub mod surveys;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    let survey_routes = surveys::router(state.clone())
        .merge(responses::router(state.clone()))
        .merge(outreach::router(state.clone()));
    Router::new()
        .route("/health", get(health))
        .nest("/api/surveys", survey_routes)
        .nest("/api/responses", responses::response_router(state.clone()))
        .nest("/api/employees", employees::router(state))
}
