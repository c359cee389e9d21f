use crate::bot::notify::{DeliveryOutcome, Notifier, OutreachKind};
use crate::db;
use crate::domain::eligibility::{self, EligibilityReport};
use crate::domain::employee::Employee;
use crate::domain::response::ResponseStatus;
use crate::domain::survey::Survey;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct EligibleParams {
    /// Evaluation date, defaults to today. Lets operators preview who
    /// becomes eligible on a future date.
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct EligiblePayload {
    survey_id: Uuid,
    days_after_start: i32,
    reference_date: NaiveDate,
    total: usize,
    #[serde(flatten)]
    report: EligibilityReport,
}

#[derive(Debug, Deserialize)]
pub struct InvitePayload {
    pub employee_id: Uuid,
}

#[derive(Debug, Serialize)]
struct InviteOutcome {
    response_id: Uuid,
    delivery: DeliveryOutcome,
}

#[derive(Debug, Serialize)]
struct RemindOutcome {
    sent: u32,
    failed: u32,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:id/eligible", get(eligible_employees))
        .route("/:id/invite", post(invite_employee))
        .route("/:id/remind", post(remind_survey))
        .with_state(state)
}

async fn eligible_employees(
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
    Query(params): Query<EligibleParams>,
) -> Result<Json<EligiblePayload>, StatusCode> {
    let survey = db::get_survey(&state.pool, survey_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load survey {}: {}", survey_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let reference_date = params.on.unwrap_or_else(|| Utc::now().date_naive());
    let report = eligibility_report(&state, &survey, reference_date).await?;

    Ok(Json(EligiblePayload {
        survey_id,
        days_after_start: survey.days_after_start,
        reference_date,
        total: report.eligible.len(),
        report,
    }))
}

async fn eligibility_report(
    state: &SharedState,
    survey: &Survey,
    reference_date: NaiveDate,
) -> Result<EligibilityReport, StatusCode> {
    let employees = db::list_employees(&state.pool, true).await.map_err(|e| {
        tracing::error!("Failed to list employees: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let responses = db::list_responses(&state.pool, survey.id).await.map_err(|e| {
        tracing::error!("Failed to list responses for survey {}: {}", survey.id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(eligibility::evaluate(
        survey,
        &employees,
        &responses,
        reference_date,
    ))
}

/// Creates the response record for an eligible employee and sends the
/// invitation. The response row exists even when delivery fails, so a
/// retry takes the reminder path instead of inviting twice.
async fn invite_employee(
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
    Json(payload): Json<InvitePayload>,
) -> Result<Response, StatusCode> {
    let survey = db::get_survey(&state.pool, survey_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load survey {}: {}", survey_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let reference_date = Utc::now().date_naive();
    let report = eligibility_report(&state, &survey, reference_date).await?;
    if !report
        .eligible
        .iter()
        .any(|e| e.employee_id == payload.employee_id)
    {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let employee = db::get_employee(&state.pool, payload.employee_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load employee {}: {}", payload.employee_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let response = db::insert_response(&state.pool, survey_id, payload.employee_id)
        .await
        .map_err(|e| {
            // A concurrent invite losing the race trips the one-response
            // unique constraint; that is a conflict, not a server fault.
            if is_unique_violation(&e) {
                return StatusCode::CONFLICT;
            }
            tracing::error!(
                "Failed to create response for employee {}: {}",
                payload.employee_id,
                e
            );
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let delivery = state
        .notifier
        .deliver(&employee, &survey, OutreachKind::Invite)
        .await;
    if let DeliveryOutcome::Failed { reason } = &delivery {
        tracing::warn!(
            "Invite delivery failed for employee {}: {}",
            employee.id,
            reason
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(InviteOutcome {
            response_id: response.id,
            delivery,
        }),
    )
        .into_response())
}

async fn remind_survey(
    State(state): State<SharedState>,
    Path(survey_id): Path<Uuid>,
) -> Result<Json<RemindOutcome>, StatusCode> {
    let survey = db::get_survey(&state.pool, survey_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load survey {}: {}", survey_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let (sent, failed) = remind_open_responses(&state, &survey).await.map_err(|e| {
        tracing::error!("Reminder run failed for survey {}: {}", survey_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(RemindOutcome { sent, failed }))
}

/// Sends a reminder to every employee with an open response on the survey.
/// Shared between the admin endpoint and the daily scheduler.
pub async fn remind_open_responses(
    state: &SharedState,
    survey: &Survey,
) -> anyhow::Result<(u32, u32)> {
    let responses = db::list_responses(&state.pool, survey.id).await?;
    let mut targets = Vec::new();
    let mut missing = 0u32;

    for response in responses {
        if response.status == ResponseStatus::Completed {
            continue;
        }
        match db::get_employee(&state.pool, response.employee_id).await? {
            Some(employee) => targets.push(employee),
            None => missing += 1,
        }
    }

    let (sent, failed) = deliver_reminders(state.notifier.as_ref(), survey, &targets).await;
    tracing::info!(
        "Reminders for survey {}: {} sent, {} failed",
        survey.id,
        sent,
        failed + missing
    );
    Ok((sent, failed + missing))
}

async fn deliver_reminders(
    notifier: &dyn Notifier,
    survey: &Survey,
    targets: &[Employee],
) -> (u32, u32) {
    let mut sent = 0u32;
    let mut failed = 0u32;

    for employee in targets {
        // Departed employees keep their open response but are never nudged.
        if !employee.is_active {
            continue;
        }
        match notifier
            .deliver(employee, survey, OutreachKind::Reminder)
            .await
        {
            DeliveryOutcome::Sent => sent += 1,
            DeliveryOutcome::Failed { reason } => {
                tracing::warn!(
                    "Reminder delivery failed for employee {}: {}",
                    employee.id,
                    reason
                );
                failed += 1;
            }
        }
        // Stay under Telegram's per-bot send rate.
        tokio::time::sleep(Duration::from_millis(35)).await;
    }

    (sent, failed)
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::notify::testing::RecordingNotifier;
    use chrono::Utc;

    fn survey() -> Survey {
        Survey {
            id: Uuid::new_v4(),
            title: "Onboarding check".to_string(),
            description: None,
            days_after_start: 90,
            is_active: true,
            questions: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn employee(name: &str, is_active: bool) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            position: None,
            department: None,
            telegram_id: Some(1),
            telegram_username: None,
            start_date: None,
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn reminders_skip_deactivated_employees() {
        let notifier = RecordingNotifier::new();
        let survey = survey();
        let active = employee("Ann", true);
        let departed = employee("Ben", false);
        let targets = vec![departed.clone(), active.clone()];

        let (sent, failed) = deliver_reminders(&notifier, &survey, &targets).await;

        assert_eq!((sent, failed), (1, 0));
        let recorded = notifier.sent.lock().unwrap();
        assert_eq!(*recorded, vec![(active.id, survey.id, OutreachKind::Reminder)]);
    }

    #[tokio::test]
    async fn failed_deliveries_are_counted_not_dropped() {
        let mut notifier = RecordingNotifier::new();
        notifier.fail_all = true;
        let survey = survey();
        let targets = vec![employee("Ann", true), employee("Ben", true)];

        let (sent, failed) = deliver_reminders(&notifier, &survey, &targets).await;

        assert_eq!((sent, failed), (0, 2));
    }

    #[test]
    fn arbitrary_errors_are_not_unique_violations() {
        let err = anyhow::anyhow!("connection reset");
        assert!(!is_unique_violation(&err));
        let wrapped = anyhow::Error::from(sqlx::Error::RowNotFound);
        assert!(!is_unique_violation(&wrapped));
    }
}
