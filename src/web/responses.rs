use crate::analytics::results::{self, QuestionAnalytics, ResponseView};
use crate::db;
use crate::domain::response::{Answer, ResponseStatus, SurveyResponse};
use crate::domain::submission::{self, SubmissionIssue};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SubmitPayload {
    pub employee_id: Uuid,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Serialize)]
struct SubmitOutcome {
    response_id: Uuid,
    status: ResponseStatus,
    issues: Vec<SubmissionIssue>,
}

#[derive(Debug, Serialize)]
struct RejectedSubmission {
    error: &'static str,
    issues: Vec<SubmissionIssue>,
}

#[derive(Debug, Serialize)]
struct ResultsPayload {
    survey_id: Uuid,
    survey_title: String,
    total_responses: usize,
    completion_rate: f64,
    responses: Vec<ResponseView>,
}

#[derive(Debug, Serialize)]
struct AnalyticsPayload {
    survey_id: Uuid,
    survey_title: String,
    total_responses: usize,
    completion_rate: f64,
    questions: Vec<QuestionAnalytics>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:id/responses", get(list_responses).post(submit_answers))
        .route("/:id/results", get(survey_results))
        .route("/:id/analytics", get(survey_analytics))
        .with_state(state)
}

/// Direct response reads, nested under /api/responses.
pub fn response_router(state: SharedState) -> Router {
    Router::new()
        .route("/:id", get(get_response))
        .with_state(state)
}

async fn get_response(
    State(state): State<SharedState>,
    Path(response_id): Path<Uuid>,
) -> Result<Json<SurveyResponse>, StatusCode> {
    let response = db::get_response(&state.pool, response_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load response {}: {}", response_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(response))
}

async fn list_responses(
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
) -> Result<Json<Vec<SurveyResponse>>, StatusCode> {
    let responses = db::list_responses(&state.pool, survey_id).await.map_err(|e| {
        tracing::error!("Failed to list responses for survey {}: {}", survey_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(responses))
}

/// Accepts a batch of answers for an invited employee. Structural failures
/// reject the submission outright; content issues are persisted anyway and
/// echoed back so the respondent can finish later. The response flips to
/// completed exactly when the validator passes over the merged answer set.
async fn submit_answers(
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
    Json(payload): Json<SubmitPayload>,
) -> Result<Response, StatusCode> {
    let survey = db::get_survey(&state.pool, survey_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load survey {}: {}", survey_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let response = db::find_response(&state.pool, survey_id, payload.employee_id)
        .await
        .map_err(|e| {
            tracing::error!(
                "Failed to load response for employee {}: {}",
                payload.employee_id,
                e
            );
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    // Completed responses are immutable.
    if response.is_completed() {
        return Err(StatusCode::CONFLICT);
    }

    let merged = merge_answers(&response.answers, &payload.answers);

    match submission::validate_answer_set(&survey, &merged) {
        Err(rejection) if rejection.is_structural() => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(RejectedSubmission {
                    error: "submission references entities outside this survey",
                    issues: rejection.issues,
                }),
            )
                .into_response());
        }
        outcome => {
            db::upsert_answers(&state.pool, response.id, &payload.answers)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to save answers for response {}: {}", response.id, e);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?;

            let (status, completed_at, issues) = match outcome {
                Ok(()) => (ResponseStatus::Completed, Some(Utc::now()), Vec::new()),
                Err(rejection) => (ResponseStatus::InProgress, None, rejection.issues),
            };
            db::set_response_status(&state.pool, response.id, status, completed_at)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to update response {}: {}", response.id, e);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?;

            if status == ResponseStatus::Completed {
                tracing::info!(
                    "Response {} completed for survey {}",
                    response.id,
                    survey_id
                );
            }

            Ok(Json(SubmitOutcome {
                response_id: response.id,
                status,
                issues,
            })
            .into_response())
        }
    }
}

/// Stored answers plus the incoming batch, incoming winning per question.
fn merge_answers(existing: &[Answer], incoming: &[Answer]) -> Vec<Answer> {
    let mut merged: Vec<Answer> = existing
        .iter()
        .filter(|answer| !incoming.iter().any(|i| i.question_id == answer.question_id))
        .cloned()
        .collect();
    merged.extend(incoming.iter().cloned());
    merged
}

async fn load_aggregate(
    state: &SharedState,
    survey_id: Uuid,
) -> Result<results::SurveyResults, StatusCode> {
    let survey = db::get_survey(&state.pool, survey_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load survey {}: {}", survey_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    let responses = db::list_responses(&state.pool, survey_id).await.map_err(|e| {
        tracing::error!("Failed to list responses for survey {}: {}", survey_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let roster = db::list_employees(&state.pool, false).await.map_err(|e| {
        tracing::error!("Failed to list employees: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(results::aggregate(&survey, &responses, &roster))
}

async fn survey_results(
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
) -> Result<Json<ResultsPayload>, StatusCode> {
    let results = load_aggregate(&state, survey_id).await?;
    Ok(Json(ResultsPayload {
        survey_id: results.survey_id,
        survey_title: results.survey_title,
        total_responses: results.total_responses,
        completion_rate: results.completion_rate,
        responses: results.responses,
    }))
}

async fn survey_analytics(
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
) -> Result<Json<AnalyticsPayload>, StatusCode> {
    let results = load_aggregate(&state, survey_id).await?;
    Ok(Json(AnalyticsPayload {
        survey_id: results.survey_id,
        survey_title: results.survey_title,
        total_responses: results.total_responses,
        completion_rate: results.completion_rate,
        questions: results.questions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::response::AnswerValue;

    fn answer(question_id: Uuid, text: &str) -> Answer {
        Answer {
            question_id,
            value: AnswerValue::Text(text.to_string()),
        }
    }

    #[test]
    fn merge_prefers_incoming_answers() {
        let q1 = Uuid::new_v4();
        let q2 = Uuid::new_v4();
        let existing = vec![answer(q1, "old"), answer(q2, "kept")];
        let incoming = vec![answer(q1, "new")];
        let merged = merge_answers(&existing, &incoming);
        assert_eq!(merged.len(), 2);
        let updated = merged.iter().find(|a| a.question_id == q1).unwrap();
        assert_eq!(updated.value, AnswerValue::Text("new".to_string()));
    }
}
