use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    InProgress,
    Completed,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::InProgress => "in_progress",
            ResponseStatus::Completed => "completed",
        }
    }
}

impl TryFrom<&str> for ResponseStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "pending" => Ok(ResponseStatus::Pending),
            "in_progress" => Ok(ResponseStatus::InProgress),
            "completed" => Ok(ResponseStatus::Completed),
            _ => Err(()),
        }
    }
}

/// Answer payload. Option-identity arrays are the canonical reference shape
/// for choice answers; free text is only valid for text questions. The db
/// layer normalizes stored rows into this shape before the core sees them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Options(Vec<Uuid>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub question_id: Uuid,
    #[serde(flatten)]
    pub value: AnswerValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub employee_id: Uuid,
    pub status: ResponseStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub answers: Vec<Answer>,
}

impl SurveyResponse {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}
