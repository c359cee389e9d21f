use crate::domain::employee::Employee;
use crate::domain::response::{AnswerValue, SurveyResponse};
use crate::domain::survey::{ChoiceOption, Question, QuestionKind, QuestionType, Survey};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmployeeRef {
    pub id: Uuid,
    pub full_name: String,
    pub telegram_username: Option<String>,
}

/// One answer joined with its question, option ids resolved to the current
/// option text. Resolution happens here, at read time, so renamed options
/// never show stale captured text.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnswerView {
    pub question_id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub answer_text: Option<String>,
    pub answer_options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseView {
    pub response_id: Uuid,
    pub employee: EmployeeRef,
    pub completed_at: Option<DateTime<Utc>>,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OptionSlice {
    pub option_id: Uuid,
    pub option_text: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionBreakdown {
    ChoiceDistribution(Vec<OptionSlice>),
    TextAnswers(Vec<String>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuestionAnalytics {
    pub question_id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub total_answers: usize,
    #[serde(flatten)]
    pub breakdown: QuestionBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurveyResults {
    pub survey_id: Uuid,
    pub survey_title: String,
    pub total_responses: usize,
    pub completion_rate: f64,
    pub responses: Vec<ResponseView>,
    pub questions: Vec<QuestionAnalytics>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Aggregates everything the reporting UI needs for one survey: completion
/// rate, per-respondent answer views and per-question distributions. Pure
/// function of its inputs; re-running over the same snapshot yields an
/// identical payload.
pub fn aggregate(
    survey: &Survey,
    responses: &[SurveyResponse],
    roster: &[Employee],
) -> SurveyResults {
    let by_employee: HashMap<Uuid, &Employee> = roster.iter().map(|e| (e.id, e)).collect();

    let mut question_order: Vec<&Question> = survey.questions.iter().collect();
    question_order.sort_by_key(|q| q.order_index);

    let total_responses = responses.len();
    let completed = responses.iter().filter(|r| r.is_completed()).count();
    let completion_rate = if total_responses == 0 {
        0.0
    } else {
        round1(100.0 * completed as f64 / total_responses as f64)
    };

    let response_views = responses
        .iter()
        .map(|response| response_view(response, &question_order, &by_employee))
        .collect();

    let questions = question_order
        .iter()
        .map(|question| question_analytics(question, responses))
        .collect();

    SurveyResults {
        survey_id: survey.id,
        survey_title: survey.title.clone(),
        total_responses,
        completion_rate,
        responses: response_views,
        questions,
    }
}

/// View of one response outside a full aggregation, used by the employee
/// history endpoint. Same option-text resolution rules as `aggregate`.
pub fn view_response(
    survey: &Survey,
    response: &SurveyResponse,
    roster: &[Employee],
) -> ResponseView {
    let by_employee: HashMap<Uuid, &Employee> = roster.iter().map(|e| (e.id, e)).collect();
    let mut question_order: Vec<&Question> = survey.questions.iter().collect();
    question_order.sort_by_key(|q| q.order_index);
    response_view(response, &question_order, &by_employee)
}

fn response_view(
    response: &SurveyResponse,
    questions: &[&Question],
    roster: &HashMap<Uuid, &Employee>,
) -> ResponseView {
    let employee = match roster.get(&response.employee_id) {
        Some(e) => EmployeeRef {
            id: e.id,
            full_name: e.full_name.clone(),
            telegram_username: e.telegram_username.clone(),
        },
        None => EmployeeRef {
            id: response.employee_id,
            full_name: "Unknown".to_string(),
            telegram_username: None,
        },
    };

    // Answers come out in question order; answers against questions no
    // longer on the survey are dropped from the view.
    let mut answers = Vec::new();
    for question in questions {
        let Some(answer) = response.answers.iter().find(|a| a.question_id == question.id) else {
            continue;
        };
        let (answer_text, answer_options) = match &answer.value {
            AnswerValue::Text(text) => (Some(text.clone()), None),
            AnswerValue::Options(selected) => {
                let texts = selected
                    .iter()
                    .filter_map(|option_id| {
                        question
                            .kind
                            .options()
                            .iter()
                            .find(|o| o.id == *option_id)
                            .map(|o| o.text.clone())
                    })
                    .collect();
                (None, Some(texts))
            }
        };
        answers.push(AnswerView {
            question_id: question.id,
            question_text: question.text.clone(),
            question_type: question.question_type(),
            answer_text,
            answer_options,
        });
    }

    ResponseView {
        response_id: response.id,
        employee,
        completed_at: response.completed_at,
        answers,
    }
}

fn question_analytics(question: &Question, responses: &[SurveyResponse]) -> QuestionAnalytics {
    let answers: Vec<&AnswerValue> = responses
        .iter()
        .flat_map(|r| r.answers.iter())
        .filter(|a| a.question_id == question.id)
        .map(|a| &a.value)
        .collect();
    let total_answers = answers.len();

    let breakdown = match &question.kind {
        QuestionKind::Text => {
            let texts = answers
                .iter()
                .filter_map(|value| match value {
                    AnswerValue::Text(text) => {
                        let trimmed = text.trim();
                        (!trimmed.is_empty()).then(|| trimmed.to_string())
                    }
                    AnswerValue::Options(_) => None,
                })
                .collect();
            QuestionBreakdown::TextAnswers(texts)
        }
        QuestionKind::SingleChoice { options } | QuestionKind::MultipleChoice { options } => {
            // Only option ids that still belong to the question are counted.
            // Answers saved while a response was in progress may carry stray
            // ids; those stay in total_answers but add to no option, so the
            // percentages of a question sum to 100 only over clean data.
            let mut counts: HashMap<Uuid, usize> = HashMap::new();
            for value in &answers {
                if let AnswerValue::Options(selected) = value {
                    for option_id in selected {
                        if options.iter().any(|o| o.id == *option_id) {
                            *counts.entry(*option_id).or_insert(0) += 1;
                        }
                    }
                }
            }
            let mut ordered: Vec<&ChoiceOption> = options.iter().collect();
            ordered.sort_by_key(|o| o.order_index);
            let slices = ordered
                .into_iter()
                .map(|option| {
                    let count = counts.get(&option.id).copied().unwrap_or(0);
                    let percentage = if total_answers == 0 {
                        0.0
                    } else {
                        round1(100.0 * count as f64 / total_answers as f64)
                    };
                    OptionSlice {
                        option_id: option.id,
                        option_text: option.text.clone(),
                        count,
                        percentage,
                    }
                })
                .collect();
            QuestionBreakdown::ChoiceDistribution(slices)
        }
    };

    QuestionAnalytics {
        question_id: question.id,
        question_text: question.text.clone(),
        question_type: question.question_type(),
        total_answers,
        breakdown,
    }
}
