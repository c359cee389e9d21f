use crate::domain::response::{Answer, AnswerValue};
use crate::domain::survey::{ChoiceOption, QuestionKind, QuestionType, Survey};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// One thing wrong with one answer. Foreign references are structural and
/// reject the whole submission; everything else is content the respondent
/// can fix.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerIssue {
    /// Answer points at a question outside this survey.
    ForeignQuestion,
    /// Selected option belongs to a different question of the survey.
    ForeignOption { option_id: Uuid },
    /// Selected option id is not known anywhere in the survey.
    UnknownOption { option_id: Uuid },
    DuplicateAnswer,
    MissingRequired,
    EmptyText,
    WrongPayload { expected: QuestionType },
    NotExactlyOne { selected: usize },
    NoSelection,
    DuplicateOption { option_id: Uuid },
}

impl AnswerIssue {
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            AnswerIssue::ForeignQuestion | AnswerIssue::ForeignOption { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmissionIssue {
    pub question_id: Uuid,
    #[serde(flatten)]
    pub issue: AnswerIssue,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmissionRejection {
    pub issues: Vec<SubmissionIssue>,
}

impl SubmissionRejection {
    /// True when any issue is a malformed cross-entity reference. Such
    /// submissions are never partially accepted.
    pub fn is_structural(&self) -> bool {
        self.issues.iter().any(|i| i.issue.is_structural())
    }
}

/// Checks a submitted answer set against the survey's questions. Every
/// question is evaluated; the result carries the complete issue list so a
/// respondent sees all problems at once. `Ok(())` is exactly the condition
/// for a response to count as completed.
pub fn validate_answer_set(survey: &Survey, answers: &[Answer]) -> Result<(), SubmissionRejection> {
    let mut issues = Vec::new();
    let mut answered: HashSet<Uuid> = HashSet::new();

    for answer in answers {
        let Some(question) = survey.question(answer.question_id) else {
            issues.push(SubmissionIssue {
                question_id: answer.question_id,
                issue: AnswerIssue::ForeignQuestion,
            });
            continue;
        };
        if !answered.insert(question.id) {
            issues.push(SubmissionIssue {
                question_id: question.id,
                issue: AnswerIssue::DuplicateAnswer,
            });
            continue;
        }
        check_payload(
            survey,
            question.id,
            &question.kind,
            question.is_required,
            answer,
            &mut issues,
        );
    }

    for question in &survey.questions {
        if question.is_required && !answered.contains(&question.id) {
            issues.push(SubmissionIssue {
                question_id: question.id,
                issue: AnswerIssue::MissingRequired,
            });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(SubmissionRejection { issues })
    }
}

fn check_payload(
    survey: &Survey,
    question_id: Uuid,
    kind: &QuestionKind,
    is_required: bool,
    answer: &Answer,
    issues: &mut Vec<SubmissionIssue>,
) {
    let mut push = |issue: AnswerIssue| {
        issues.push(SubmissionIssue { question_id, issue });
    };

    match (kind, &answer.value) {
        (QuestionKind::Text, AnswerValue::Text(text)) => {
            if is_required && text.trim().is_empty() {
                push(AnswerIssue::EmptyText);
            }
        }
        (QuestionKind::Text, AnswerValue::Options(_)) => {
            push(AnswerIssue::WrongPayload {
                expected: QuestionType::Text,
            });
        }
        (QuestionKind::SingleChoice { options }, AnswerValue::Options(selected)) => {
            if selected.len() != 1 {
                push(AnswerIssue::NotExactlyOne {
                    selected: selected.len(),
                });
            }
            check_option_refs(survey, question_id, options, selected, &mut push);
        }
        (QuestionKind::MultipleChoice { options }, AnswerValue::Options(selected)) => {
            if selected.is_empty() {
                push(AnswerIssue::NoSelection);
            }
            let mut seen = HashSet::new();
            for option_id in selected {
                if !seen.insert(*option_id) {
                    push(AnswerIssue::DuplicateOption {
                        option_id: *option_id,
                    });
                }
            }
            check_option_refs(survey, question_id, options, selected, &mut push);
        }
        (
            QuestionKind::SingleChoice { .. } | QuestionKind::MultipleChoice { .. },
            AnswerValue::Text(_),
        ) => {
            push(AnswerIssue::WrongPayload {
                expected: kind.question_type(),
            });
        }
    }
}

fn check_option_refs(
    survey: &Survey,
    question_id: Uuid,
    options: &[ChoiceOption],
    selected: &[Uuid],
    push: &mut impl FnMut(AnswerIssue),
) {
    for option_id in selected {
        if options.iter().any(|o| o.id == *option_id) {
            continue;
        }
        let owned_elsewhere = survey
            .questions
            .iter()
            .filter(|q| q.id != question_id)
            .any(|q| q.kind.options().iter().any(|o| o.id == *option_id));
        if owned_elsewhere {
            push(AnswerIssue::ForeignOption {
                option_id: *option_id,
            });
        } else {
            push(AnswerIssue::UnknownOption {
                option_id: *option_id,
            });
        }
    }
}
