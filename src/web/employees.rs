use crate::analytics::results::{self, ResponseView};
use crate::db;
use crate::domain::employee::Employee;
use crate::domain::response::ResponseStatus;
use crate::domain::survey::Survey;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct EmployeePayload {
    pub full_name: String,
    pub position: Option<String>,
    pub department: Option<String>,
    pub telegram_id: Option<i64>,
    pub telegram_username: Option<String>,
    pub start_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub active_only: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_employees).post(create_employee))
        .route(
            "/:id",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/:id/responses", get(employee_responses))
        .route("/telegram/:telegram_id", get(get_employee_by_telegram))
        .with_state(state)
}

fn build_employee(employee_id: Uuid, payload: EmployeePayload) -> Employee {
    let now = Utc::now();
    Employee {
        id: employee_id,
        full_name: payload.full_name,
        position: payload.position,
        department: payload.department,
        telegram_id: payload.telegram_id,
        telegram_username: payload.telegram_username,
        start_date: payload.start_date,
        is_active: payload.is_active,
        created_at: now,
        updated_at: now,
    }
}

async fn list_employees(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Employee>>, StatusCode> {
    let employees = db::list_employees(&state.pool, params.active_only)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list employees: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(employees))
}

async fn get_employee(
    State(state): State<SharedState>,
    Path(employee_id): Path<Uuid>,
) -> Result<Json<Employee>, StatusCode> {
    let employee = db::get_employee(&state.pool, employee_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load employee {}: {}", employee_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(employee))
}

#[derive(Debug, Serialize)]
struct EmployeeHistoryEntry {
    survey_id: Uuid,
    survey_title: String,
    status: ResponseStatus,
    #[serde(flatten)]
    view: ResponseView,
}

/// Every response the employee has, joined with its survey so option ids
/// resolve to the current option text.
async fn employee_responses(
    State(state): State<SharedState>,
    Path(employee_id): Path<Uuid>,
) -> Result<Json<Vec<EmployeeHistoryEntry>>, StatusCode> {
    let employee = db::get_employee(&state.pool, employee_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load employee {}: {}", employee_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let responses = db::list_responses_for_employee(&state.pool, employee_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list responses for employee {}: {}", employee_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let roster = std::slice::from_ref(&employee);
    let mut surveys: HashMap<Uuid, Survey> = HashMap::new();
    let mut history = Vec::with_capacity(responses.len());
    for response in &responses {
        if !surveys.contains_key(&response.survey_id) {
            let survey = db::get_survey(&state.pool, response.survey_id)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to load survey {}: {}", response.survey_id, e);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?;
            // A response whose survey has been deleted since is skipped.
            let Some(survey) = survey else {
                continue;
            };
            surveys.insert(survey.id, survey);
        }
        let survey = &surveys[&response.survey_id];
        history.push(EmployeeHistoryEntry {
            survey_id: survey.id,
            survey_title: survey.title.clone(),
            status: response.status,
            view: results::view_response(survey, response, roster),
        });
    }
    Ok(Json(history))
}

async fn get_employee_by_telegram(
    State(state): State<SharedState>,
    Path(telegram_id): Path<i64>,
) -> Result<Json<Employee>, StatusCode> {
    let employee = db::find_employee_by_telegram(&state.pool, telegram_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up telegram id {}: {}", telegram_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(employee))
}

async fn create_employee(
    State(state): State<SharedState>,
    Json(payload): Json<EmployeePayload>,
) -> Result<(StatusCode, Json<Employee>), StatusCode> {
    if payload.full_name.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let employee = build_employee(Uuid::new_v4(), payload);
    db::insert_employee(&state.pool, &employee).await.map_err(|e| {
        tracing::error!("Failed to create employee: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok((StatusCode::CREATED, Json(employee)))
}

async fn update_employee(
    State(state): State<SharedState>,
    Path(employee_id): Path<Uuid>,
    Json(payload): Json<EmployeePayload>,
) -> Result<Json<Employee>, StatusCode> {
    if payload.full_name.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let employee = build_employee(employee_id, payload);
    let found = db::update_employee(&state.pool, &employee).await.map_err(|e| {
        tracing::error!("Failed to update employee {}: {}", employee_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if !found {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(employee))
}

async fn delete_employee(
    State(state): State<SharedState>,
    Path(employee_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let deleted = db::delete_employee(&state.pool, employee_id).await.map_err(|e| {
        tracing::error!("Failed to delete employee {}: {}", employee_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
