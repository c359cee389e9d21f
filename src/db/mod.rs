use crate::domain::employee::Employee;
use crate::domain::response::{Answer, AnswerValue, ResponseStatus, SurveyResponse};
use crate::domain::survey::{ChoiceOption, Question, QuestionKind, QuestionType, Survey};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct SurveyRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    days_after_start: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    question_text: String,
    question_type: String,
    is_required: bool,
    order_index: i32,
}

#[derive(Debug, FromRow)]
struct OptionRow {
    id: Uuid,
    question_id: Uuid,
    option_text: String,
    order_index: i32,
}

#[derive(Debug, FromRow)]
struct ResponseRow {
    id: Uuid,
    survey_id: Uuid,
    employee_id: Uuid,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct AnswerRow {
    response_id: Uuid,
    question_id: Uuid,
    answer_text: Option<String>,
    answer_options: Option<Vec<Uuid>>,
}

fn build_question(row: QuestionRow, options: Vec<ChoiceOption>) -> Result<Question> {
    let question_type = QuestionType::try_from(row.question_type.as_str()).map_err(|_| {
        anyhow!(
            "unknown question type {:?} for question {}",
            row.question_type,
            row.id
        )
    })?;
    let kind = match question_type {
        QuestionType::Text => QuestionKind::Text,
        QuestionType::SingleChoice => QuestionKind::SingleChoice { options },
        QuestionType::MultipleChoice => QuestionKind::MultipleChoice { options },
    };
    Ok(Question {
        id: row.id,
        text: row.question_text,
        is_required: row.is_required,
        order_index: row.order_index,
        kind,
    })
}

/// Stored answers keep text and option ids in separate columns; the domain
/// shape is a tagged value. Option ids win when both are present.
fn build_answer(row: AnswerRow) -> Answer {
    let value = match row.answer_options {
        Some(options) => AnswerValue::Options(options),
        None => AnswerValue::Text(row.answer_text.unwrap_or_default()),
    };
    Answer {
        question_id: row.question_id,
        value,
    }
}

fn build_response(row: ResponseRow, answers: Vec<Answer>) -> Result<SurveyResponse> {
    let status = ResponseStatus::try_from(row.status.as_str()).map_err(|_| {
        anyhow!(
            "unknown response status {:?} for response {}",
            row.status,
            row.id
        )
    })?;
    Ok(SurveyResponse {
        id: row.id,
        survey_id: row.survey_id,
        employee_id: row.employee_id,
        status,
        started_at: row.started_at,
        completed_at: row.completed_at,
        answers,
    })
}

async fn load_questions(pool: &PgPool, survey_id: Uuid) -> Result<Vec<Question>> {
    let question_rows = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT id, question_text, question_type, is_required, order_index
        FROM questions
        WHERE survey_id = $1
        ORDER BY order_index
        "#,
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    let option_rows = sqlx::query_as::<_, OptionRow>(
        r#"
        SELECT o.id, o.question_id, o.option_text, o.order_index
        FROM question_options o
        JOIN questions q ON q.id = o.question_id
        WHERE q.survey_id = $1
        ORDER BY o.order_index
        "#,
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    let mut options_by_question: HashMap<Uuid, Vec<ChoiceOption>> = HashMap::new();
    for row in option_rows {
        options_by_question
            .entry(row.question_id)
            .or_default()
            .push(ChoiceOption {
                id: row.id,
                text: row.option_text,
                order_index: row.order_index,
            });
    }

    question_rows
        .into_iter()
        .map(|row| {
            let options = options_by_question.remove(&row.id).unwrap_or_default();
            build_question(row, options)
        })
        .collect()
}

async fn build_survey(pool: &PgPool, row: SurveyRow) -> Result<Survey> {
    let questions = load_questions(pool, row.id).await?;
    Ok(Survey {
        id: row.id,
        title: row.title,
        description: row.description,
        days_after_start: row.days_after_start,
        is_active: row.is_active,
        questions,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub async fn list_surveys(pool: &PgPool, active_only: bool) -> Result<Vec<Survey>> {
    let rows = sqlx::query_as::<_, SurveyRow>(
        r#"
        SELECT id, title, description, days_after_start, is_active, created_at, updated_at
        FROM surveys
        WHERE is_active = true OR $1 = false
        ORDER BY created_at
        "#,
    )
    .bind(active_only)
    .fetch_all(pool)
    .await?;

    let mut surveys = Vec::with_capacity(rows.len());
    for row in rows {
        surveys.push(build_survey(pool, row).await?);
    }
    Ok(surveys)
}

pub async fn get_survey(pool: &PgPool, survey_id: Uuid) -> Result<Option<Survey>> {
    let row = sqlx::query_as::<_, SurveyRow>(
        r#"
        SELECT id, title, description, days_after_start, is_active, created_at, updated_at
        FROM surveys
        WHERE id = $1
        "#,
    )
    .bind(survey_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(build_survey(pool, row).await?)),
        None => Ok(None),
    }
}

async fn insert_questions(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    survey_id: Uuid,
    questions: &[Question],
) -> Result<()> {
    for question in questions {
        sqlx::query(
            r#"
            INSERT INTO questions (id, survey_id, question_text, question_type, is_required, order_index)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(question.id)
        .bind(survey_id)
        .bind(&question.text)
        .bind(question.question_type().as_str())
        .bind(question.is_required)
        .bind(question.order_index)
        .execute(&mut **tx)
        .await?;

        for option in question.kind.options() {
            sqlx::query(
                r#"
                INSERT INTO question_options (id, question_id, option_text, order_index)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(option.id)
            .bind(question.id)
            .bind(&option.text)
            .bind(option.order_index)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

pub async fn insert_survey(pool: &PgPool, survey: &Survey) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO surveys (id, title, description, days_after_start, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(survey.id)
    .bind(&survey.title)
    .bind(&survey.description)
    .bind(survey.days_after_start)
    .bind(survey.is_active)
    .bind(survey.created_at)
    .bind(survey.updated_at)
    .execute(&mut *tx)
    .await?;

    insert_questions(&mut tx, survey.id, &survey.questions).await?;
    tx.commit().await?;
    Ok(())
}

/// Survey edits rewrite the question list as a whole unit; stored questions
/// and options are replaced by the submitted set.
pub async fn update_survey(pool: &PgPool, survey: &Survey) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        r#"
        UPDATE surveys
        SET title = $2, description = $3, days_after_start = $4, is_active = $5, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(survey.id)
    .bind(&survey.title)
    .bind(&survey.description)
    .bind(survey.days_after_start)
    .bind(survey.is_active)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM questions WHERE survey_id = $1")
        .bind(survey.id)
        .execute(&mut *tx)
        .await?;

    insert_questions(&mut tx, survey.id, &survey.questions).await?;
    tx.commit().await?;
    Ok(true)
}

pub async fn delete_survey(pool: &PgPool, survey_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM surveys WHERE id = $1")
        .bind(survey_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_employees(pool: &PgPool, active_only: bool) -> Result<Vec<Employee>> {
    let employees = sqlx::query_as::<_, Employee>(
        r#"
        SELECT id, full_name, position, department, telegram_id, telegram_username,
               start_date, is_active, created_at, updated_at
        FROM employees
        WHERE is_active = true OR $1 = false
        ORDER BY full_name
        "#,
    )
    .bind(active_only)
    .fetch_all(pool)
    .await?;
    Ok(employees)
}

pub async fn get_employee(pool: &PgPool, employee_id: Uuid) -> Result<Option<Employee>> {
    let employee = sqlx::query_as::<_, Employee>(
        r#"
        SELECT id, full_name, position, department, telegram_id, telegram_username,
               start_date, is_active, created_at, updated_at
        FROM employees
        WHERE id = $1
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;
    Ok(employee)
}

pub async fn find_employee_by_telegram(
    pool: &PgPool,
    telegram_id: i64,
) -> Result<Option<Employee>> {
    let employee = sqlx::query_as::<_, Employee>(
        r#"
        SELECT id, full_name, position, department, telegram_id, telegram_username,
               start_date, is_active, created_at, updated_at
        FROM employees
        WHERE telegram_id = $1
        "#,
    )
    .bind(telegram_id)
    .fetch_optional(pool)
    .await?;
    Ok(employee)
}

pub async fn insert_employee(pool: &PgPool, employee: &Employee) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO employees (id, full_name, position, department, telegram_id, telegram_username,
                               start_date, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(employee.id)
    .bind(&employee.full_name)
    .bind(&employee.position)
    .bind(&employee.department)
    .bind(employee.telegram_id)
    .bind(&employee.telegram_username)
    .bind(employee.start_date)
    .bind(employee.is_active)
    .bind(employee.created_at)
    .bind(employee.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_employee(pool: &PgPool, employee: &Employee) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE employees
        SET full_name = $2, position = $3, department = $4, telegram_id = $5,
            telegram_username = $6, start_date = $7, is_active = $8, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(employee.id)
    .bind(&employee.full_name)
    .bind(&employee.position)
    .bind(&employee.department)
    .bind(employee.telegram_id)
    .bind(&employee.telegram_username)
    .bind(employee.start_date)
    .bind(employee.is_active)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_employee(pool: &PgPool, employee_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM employees WHERE id = $1")
        .bind(employee_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn assemble_responses(
    response_rows: Vec<ResponseRow>,
    answer_rows: Vec<AnswerRow>,
) -> Result<Vec<SurveyResponse>> {
    let mut answers_by_response: HashMap<Uuid, Vec<Answer>> = HashMap::new();
    for row in answer_rows {
        let response_id = row.response_id;
        answers_by_response
            .entry(response_id)
            .or_default()
            .push(build_answer(row));
    }

    response_rows
        .into_iter()
        .map(|row| {
            let answers = answers_by_response.remove(&row.id).unwrap_or_default();
            build_response(row, answers)
        })
        .collect()
}

pub async fn list_responses(pool: &PgPool, survey_id: Uuid) -> Result<Vec<SurveyResponse>> {
    let response_rows = sqlx::query_as::<_, ResponseRow>(
        r#"
        SELECT id, survey_id, employee_id, status, started_at, completed_at
        FROM survey_responses
        WHERE survey_id = $1
        ORDER BY started_at
        "#,
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    let answer_rows = sqlx::query_as::<_, AnswerRow>(
        r#"
        SELECT a.response_id, a.question_id, a.answer_text, a.answer_options
        FROM answers a
        JOIN survey_responses r ON r.id = a.response_id
        WHERE r.survey_id = $1
        ORDER BY a.created_at
        "#,
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    assemble_responses(response_rows, answer_rows)
}

pub async fn list_responses_for_employee(
    pool: &PgPool,
    employee_id: Uuid,
) -> Result<Vec<SurveyResponse>> {
    let response_rows = sqlx::query_as::<_, ResponseRow>(
        r#"
        SELECT id, survey_id, employee_id, status, started_at, completed_at
        FROM survey_responses
        WHERE employee_id = $1
        ORDER BY started_at
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await?;

    let answer_rows = sqlx::query_as::<_, AnswerRow>(
        r#"
        SELECT a.response_id, a.question_id, a.answer_text, a.answer_options
        FROM answers a
        JOIN survey_responses r ON r.id = a.response_id
        WHERE r.employee_id = $1
        ORDER BY a.created_at
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await?;

    assemble_responses(response_rows, answer_rows)
}

pub async fn get_response(pool: &PgPool, response_id: Uuid) -> Result<Option<SurveyResponse>> {
    let row = sqlx::query_as::<_, ResponseRow>(
        r#"
        SELECT id, survey_id, employee_id, status, started_at, completed_at
        FROM survey_responses
        WHERE id = $1
        "#,
    )
    .bind(response_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let answer_rows = sqlx::query_as::<_, AnswerRow>(
        r#"
        SELECT response_id, question_id, answer_text, answer_options
        FROM answers
        WHERE response_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(row.id)
    .fetch_all(pool)
    .await?;

    let answers = answer_rows.into_iter().map(build_answer).collect();
    Ok(Some(build_response(row, answers)?))
}

pub async fn find_response(
    pool: &PgPool,
    survey_id: Uuid,
    employee_id: Uuid,
) -> Result<Option<SurveyResponse>> {
    let row = sqlx::query_as::<_, ResponseRow>(
        r#"
        SELECT id, survey_id, employee_id, status, started_at, completed_at
        FROM survey_responses
        WHERE survey_id = $1 AND employee_id = $2
        "#,
    )
    .bind(survey_id)
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let answer_rows = sqlx::query_as::<_, AnswerRow>(
        r#"
        SELECT response_id, question_id, answer_text, answer_options
        FROM answers
        WHERE response_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(row.id)
    .fetch_all(pool)
    .await?;

    let answers = answer_rows.into_iter().map(build_answer).collect();
    Ok(Some(build_response(row, answers)?))
}

/// Creates the pending response that marks an employee as contacted for a
/// survey. The unique (survey_id, employee_id) constraint backs the
/// one-response-per-employee rule.
pub async fn insert_response(
    pool: &PgPool,
    survey_id: Uuid,
    employee_id: Uuid,
) -> Result<SurveyResponse> {
    let response = SurveyResponse {
        id: Uuid::new_v4(),
        survey_id,
        employee_id,
        status: ResponseStatus::Pending,
        started_at: Utc::now(),
        completed_at: None,
        answers: Vec::new(),
    };
    sqlx::query(
        r#"
        INSERT INTO survey_responses (id, survey_id, employee_id, status, started_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(response.id)
    .bind(response.survey_id)
    .bind(response.employee_id)
    .bind(response.status.as_str())
    .bind(response.started_at)
    .execute(pool)
    .await?;
    Ok(response)
}

pub async fn upsert_answers(pool: &PgPool, response_id: Uuid, answers: &[Answer]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for answer in answers {
        let (answer_text, answer_options) = match &answer.value {
            AnswerValue::Text(text) => (Some(text.clone()), None),
            AnswerValue::Options(options) => (None, Some(options.clone())),
        };
        sqlx::query(
            r#"
            INSERT INTO answers (id, response_id, question_id, answer_text, answer_options)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (response_id, question_id)
            DO UPDATE SET answer_text = $4, answer_options = $5
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(response_id)
        .bind(answer.question_id)
        .bind(answer_text)
        .bind(answer_options)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn set_response_status(
    pool: &PgPool,
    response_id: Uuid,
    status: ResponseStatus,
    completed_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE survey_responses
        SET status = $2, completed_at = $3
        WHERE id = $1
        "#,
    )
    .bind(response_id)
    .bind(status.as_str())
    .bind(completed_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_row(id: Uuid) -> ResponseRow {
        ResponseRow {
            id,
            survey_id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            status: "in_progress".to_string(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    fn text_row(response_id: Uuid, text: &str) -> AnswerRow {
        AnswerRow {
            response_id,
            question_id: Uuid::new_v4(),
            answer_text: Some(text.to_string()),
            answer_options: None,
        }
    }

    #[test]
    fn answers_land_on_their_own_response() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let rows = vec![response_row(first), response_row(second)];
        let answers = vec![
            text_row(first, "a"),
            text_row(second, "b"),
            text_row(first, "c"),
        ];
        let responses = assemble_responses(rows, answers).unwrap();
        assert_eq!(responses[0].answers.len(), 2);
        assert_eq!(responses[1].answers.len(), 1);
    }

    #[test]
    fn response_without_answers_assembles_empty() {
        let responses = assemble_responses(vec![response_row(Uuid::new_v4())], vec![]).unwrap();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].answers.is_empty());
    }

    #[test]
    fn unknown_status_string_is_an_error() {
        let mut row = response_row(Uuid::new_v4());
        row.status = "archived".to_string();
        assert!(assemble_responses(vec![row], vec![]).is_err());
    }

    #[test]
    fn stored_options_take_precedence_over_text() {
        let option = Uuid::new_v4();
        let answer = build_answer(AnswerRow {
            response_id: Uuid::new_v4(),
            question_id: Uuid::new_v4(),
            answer_text: Some("stale label".to_string()),
            answer_options: Some(vec![option]),
        });
        assert_eq!(answer.value, AnswerValue::Options(vec![option]));
    }
}
