use crate::db;
use crate::domain::survey::{ChoiceOption, Question, QuestionKind, QuestionType, Survey};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct OptionPayload {
    pub option_text: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionPayload {
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default)]
    pub options: Vec<OptionPayload>,
}

#[derive(Debug, Deserialize)]
pub struct SurveyPayload {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_days_after_start")]
    pub days_after_start: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub questions: Vec<QuestionPayload>,
}

fn default_true() -> bool {
    true
}

fn default_days_after_start() -> i32 {
    90
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Serialize)]
struct ValidationErrors {
    errors: Vec<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_surveys).post(create_survey))
        .route(
            "/:id",
            get(get_survey).put(update_survey).delete(delete_survey),
        )
        .with_state(state)
}

/// Question order comes from list position; option ids are minted here so
/// the domain invariants can be checked on a complete value before anything
/// is written.
fn build_survey(survey_id: Uuid, payload: SurveyPayload) -> Survey {
    let now = Utc::now();
    let questions = payload
        .questions
        .into_iter()
        .enumerate()
        .map(|(index, question)| {
            let options: Vec<ChoiceOption> = question
                .options
                .into_iter()
                .enumerate()
                .map(|(i, option)| ChoiceOption {
                    id: Uuid::new_v4(),
                    text: option.option_text,
                    order_index: i as i32,
                })
                .collect();
            let kind = match question.question_type {
                QuestionType::Text => QuestionKind::Text,
                QuestionType::SingleChoice => QuestionKind::SingleChoice { options },
                QuestionType::MultipleChoice => QuestionKind::MultipleChoice { options },
            };
            Question {
                id: Uuid::new_v4(),
                text: question.question_text,
                is_required: question.is_required,
                order_index: index as i32,
                kind,
            }
        })
        .collect();

    Survey {
        id: survey_id,
        title: payload.title,
        description: payload.description,
        days_after_start: payload.days_after_start,
        is_active: payload.is_active,
        questions,
        created_at: now,
        updated_at: now,
    }
}

fn validation_errors(survey: &Survey) -> Vec<String> {
    let mut errors = Vec::new();
    if survey.title.trim().is_empty() {
        errors.push("title must not be empty".to_string());
    }
    if survey.days_after_start < 0 {
        errors.push("days_after_start must be >= 0".to_string());
    }
    if let Err(problems) = survey.validate() {
        errors.extend(problems.iter().map(|p| p.to_string()));
    }
    errors
}

async fn list_surveys(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Survey>>, StatusCode> {
    let surveys = db::list_surveys(&state.pool, params.active_only)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list surveys: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(surveys))
}

async fn get_survey(
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
) -> Result<Json<Survey>, StatusCode> {
    let survey = db::get_survey(&state.pool, survey_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load survey {}: {}", survey_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(survey))
}

async fn create_survey(
    State(state): State<SharedState>,
    Json(payload): Json<SurveyPayload>,
) -> Result<Response, StatusCode> {
    let survey = build_survey(Uuid::new_v4(), payload);
    let errors = validation_errors(&survey);
    if !errors.is_empty() {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(ValidationErrors { errors }))
            .into_response());
    }
    db::insert_survey(&state.pool, &survey).await.map_err(|e| {
        tracing::error!("Failed to create survey: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    tracing::info!("Created survey {} ({:?})", survey.id, survey.title);
    Ok((StatusCode::CREATED, Json(survey)).into_response())
}

async fn update_survey(
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
    Json(payload): Json<SurveyPayload>,
) -> Result<Response, StatusCode> {
    let survey = build_survey(survey_id, payload);
    let errors = validation_errors(&survey);
    if !errors.is_empty() {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(ValidationErrors { errors }))
            .into_response());
    }
    let found = db::update_survey(&state.pool, &survey).await.map_err(|e| {
        tracing::error!("Failed to update survey {}: {}", survey_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if !found {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(survey).into_response())
}

async fn delete_survey(
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let deleted = db::delete_survey(&state.pool, survey_id).await.map_err(|e| {
        tracing::error!("Failed to delete survey {}: {}", survey_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(questions: Vec<QuestionPayload>) -> SurveyPayload {
        SurveyPayload {
            title: "Onboarding check".to_string(),
            description: None,
            days_after_start: 90,
            is_active: true,
            questions,
        }
    }

    #[test]
    fn build_survey_orders_questions_by_position() {
        let survey = build_survey(
            Uuid::new_v4(),
            payload(vec![
                QuestionPayload {
                    question_text: "First".to_string(),
                    question_type: QuestionType::Text,
                    is_required: true,
                    options: vec![],
                },
                QuestionPayload {
                    question_text: "Second".to_string(),
                    question_type: QuestionType::Text,
                    is_required: false,
                    options: vec![],
                },
            ]),
        );
        assert_eq!(survey.questions[0].order_index, 0);
        assert_eq!(survey.questions[1].order_index, 1);
        assert!(validation_errors(&survey).is_empty());
    }

    #[test]
    fn under_populated_choice_question_blocks_save() {
        let survey = build_survey(
            Uuid::new_v4(),
            payload(vec![QuestionPayload {
                question_text: "Pick one".to_string(),
                question_type: QuestionType::SingleChoice,
                is_required: true,
                options: vec![OptionPayload {
                    option_text: "Only".to_string(),
                }],
            }]),
        );
        let errors = validation_errors(&survey);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("at least 2 options"));
    }

    #[test]
    fn negative_threshold_is_reported() {
        let mut p = payload(vec![QuestionPayload {
            question_text: "Q".to_string(),
            question_type: QuestionType::Text,
            is_required: true,
            options: vec![],
        }]);
        p.days_after_start = -1;
        let survey = build_survey(Uuid::new_v4(), p);
        assert!(validation_errors(&survey)
            .iter()
            .any(|e| e.contains("days_after_start")));
    }
}
