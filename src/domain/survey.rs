use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    SingleChoice,
    MultipleChoice,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultipleChoice)
    }
}

impl TryFrom<&str> for QuestionType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "text" => Ok(QuestionType::Text),
            "single_choice" => Ok(QuestionType::SingleChoice),
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceOption {
    pub id: Uuid,
    pub text: String,
    pub order_index: i32,
}

/// Question payload keyed by kind. A text question carries no options by
/// construction; choice questions own their ordered option list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    SingleChoice { options: Vec<ChoiceOption> },
    MultipleChoice { options: Vec<ChoiceOption> },
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::Text => QuestionType::Text,
            QuestionKind::SingleChoice { .. } => QuestionType::SingleChoice,
            QuestionKind::MultipleChoice { .. } => QuestionType::MultipleChoice,
        }
    }

    pub fn options(&self) -> &[ChoiceOption] {
        match self {
            QuestionKind::Text => &[],
            QuestionKind::SingleChoice { options } | QuestionKind::MultipleChoice { options } => {
                options
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub is_required: bool,
    pub order_index: i32,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidQuestion {
    #[error("question text is empty")]
    EmptyText,
    #[error("choice question needs at least 2 options, has {0}")]
    NotEnoughOptions(usize),
    #[error("option text is empty")]
    EmptyOptionText,
    #[error("duplicate option text: {0:?}")]
    DuplicateOptionText(String),
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }

    /// Pure check, no I/O. Returns the first rule the question breaks.
    pub fn validate(&self) -> Result<(), InvalidQuestion> {
        if self.text.trim().is_empty() {
            return Err(InvalidQuestion::EmptyText);
        }
        let options = self.kind.options();
        if self.kind.question_type().is_choice() {
            if options.len() < 2 {
                return Err(InvalidQuestion::NotEnoughOptions(options.len()));
            }
            let mut seen = Vec::with_capacity(options.len());
            for option in options {
                let text = option.text.trim();
                if text.is_empty() {
                    return Err(InvalidQuestion::EmptyOptionText);
                }
                if seen.contains(&text) {
                    return Err(InvalidQuestion::DuplicateOptionText(text.to_string()));
                }
                seen.push(text);
            }
        }
        Ok(())
    }

    /// Changes the question's kind. Choice -> text discards the options;
    /// text -> choice starts with an empty list the caller must populate
    /// before the question validates.
    pub fn retype(mut self, target: QuestionType) -> Question {
        if self.question_type() == target {
            return self;
        }
        let carried = match (&self.kind, target.is_choice()) {
            // Switching between the two choice kinds keeps the options.
            (QuestionKind::SingleChoice { options }, true)
            | (QuestionKind::MultipleChoice { options }, true) => options.clone(),
            _ => Vec::new(),
        };
        self.kind = match target {
            QuestionType::Text => QuestionKind::Text,
            QuestionType::SingleChoice => QuestionKind::SingleChoice { options: carried },
            QuestionType::MultipleChoice => QuestionKind::MultipleChoice { options: carried },
        };
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub days_after_start: i32,
    pub is_active: bool,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidSurvey {
    #[error("survey has no questions")]
    NoQuestions,
    #[error("duplicate question order {0}")]
    DuplicateOrder(i32),
    #[error("question {index}: {reason}")]
    BadQuestion { index: usize, reason: InvalidQuestion },
}

impl Survey {
    pub fn question(&self, question_id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Validates the whole question list. All problems are reported so an
    /// administrator sees every fix needed in one pass.
    pub fn validate(&self) -> Result<(), Vec<InvalidSurvey>> {
        let mut problems = Vec::new();
        if self.questions.is_empty() {
            problems.push(InvalidSurvey::NoQuestions);
        }
        let mut orders: Vec<i32> = Vec::with_capacity(self.questions.len());
        for (index, question) in self.questions.iter().enumerate() {
            if orders.contains(&question.order_index) {
                problems.push(InvalidSurvey::DuplicateOrder(question.order_index));
            }
            orders.push(question.order_index);
            if let Err(reason) = question.validate() {
                problems.push(InvalidSurvey::BadQuestion { index, reason });
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(text: &str, order_index: i32) -> ChoiceOption {
        ChoiceOption {
            id: Uuid::new_v4(),
            text: text.to_string(),
            order_index,
        }
    }

    fn choice_question(options: Vec<ChoiceOption>) -> Question {
        Question {
            id: Uuid::new_v4(),
            text: "How was onboarding?".to_string(),
            is_required: true,
            order_index: 0,
            kind: QuestionKind::SingleChoice { options },
        }
    }

    #[test]
    fn text_question_validates_without_options() {
        let q = Question {
            id: Uuid::new_v4(),
            text: "Anything to add?".to_string(),
            is_required: false,
            order_index: 0,
            kind: QuestionKind::Text,
        };
        assert_eq!(q.validate(), Ok(()));
    }

    #[test]
    fn empty_text_is_rejected() {
        let q = Question {
            id: Uuid::new_v4(),
            text: "   ".to_string(),
            is_required: true,
            order_index: 0,
            kind: QuestionKind::Text,
        };
        assert_eq!(q.validate(), Err(InvalidQuestion::EmptyText));
    }

    #[test]
    fn choice_question_needs_two_options() {
        let q = choice_question(vec![option("Good", 0)]);
        assert_eq!(q.validate(), Err(InvalidQuestion::NotEnoughOptions(1)));
    }

    #[test]
    fn duplicate_option_text_is_rejected() {
        let q = choice_question(vec![option("Good", 0), option("Good", 1)]);
        assert_eq!(
            q.validate(),
            Err(InvalidQuestion::DuplicateOptionText("Good".to_string()))
        );
    }

    #[test]
    fn retype_to_text_drops_options() {
        let q = choice_question(vec![option("Good", 0), option("Bad", 1)]);
        let retyped = q.retype(QuestionType::Text);
        assert_eq!(retyped.kind, QuestionKind::Text);
        assert!(retyped.kind.options().is_empty());
    }

    #[test]
    fn retype_text_to_choice_starts_empty_and_invalid() {
        let q = Question {
            id: Uuid::new_v4(),
            text: "Pick one".to_string(),
            is_required: true,
            order_index: 0,
            kind: QuestionKind::Text,
        };
        let retyped = q.retype(QuestionType::MultipleChoice);
        assert!(retyped.kind.options().is_empty());
        assert_eq!(retyped.validate(), Err(InvalidQuestion::NotEnoughOptions(0)));
    }

    #[test]
    fn retype_between_choice_kinds_keeps_options() {
        let q = choice_question(vec![option("Good", 0), option("Bad", 1)]);
        let retyped = q.retype(QuestionType::MultipleChoice);
        assert_eq!(retyped.kind.options().len(), 2);
    }

    #[test]
    fn survey_reports_every_problem() {
        let survey = Survey {
            id: Uuid::new_v4(),
            title: "Onboarding".to_string(),
            description: None,
            days_after_start: 90,
            is_active: true,
            questions: vec![
                choice_question(vec![option("Good", 0)]),
                Question {
                    order_index: 0,
                    ..choice_question(vec![option("A", 0), option("B", 1)])
                },
            ],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let problems = survey.validate().unwrap_err();
        assert!(problems.contains(&InvalidSurvey::DuplicateOrder(0)));
        assert!(problems.iter().any(|p| matches!(
            p,
            InvalidSurvey::BadQuestion {
                index: 0,
                reason: InvalidQuestion::NotEnoughOptions(1)
            }
        )));
    }

    #[test]
    fn survey_without_questions_is_not_invitable() {
        let survey = Survey {
            id: Uuid::new_v4(),
            title: "Empty".to_string(),
            description: None,
            days_after_start: 0,
            is_active: true,
            questions: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(survey.validate(), Err(vec![InvalidSurvey::NoQuestions]));
    }
}
