use crate::domain::employee::Employee;
use crate::domain::response::SurveyResponse;
use crate::domain::survey::Survey;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EligibleEmployee {
    pub employee_id: Uuid,
    pub full_name: String,
    pub telegram_id: Option<i64>,
    pub start_date: NaiveDate,
    pub days_since_start: i64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RosterIssue {
    MissingStartDate,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RosterWarning {
    pub employee_id: Uuid,
    pub full_name: String,
    pub issue: RosterIssue,
}

#[derive(Debug, Clone, Serialize)]
pub struct EligibilityReport {
    pub eligible: Vec<EligibleEmployee>,
    pub warnings: Vec<RosterWarning>,
}

/// Computes which employees may be invited to `survey` as of
/// `reference_date`. The date is a parameter rather than the wall clock so
/// the evaluation is deterministic.
///
/// An employee qualifies when active, with a known start date, tenure of at
/// least `days_after_start` days, and no response for the survey yet (any
/// status counts as already contacted). An inactive survey has no eligible
/// employees at all. Broken roster records are skipped and surfaced as
/// warnings; they never abort the evaluation.
pub fn evaluate(
    survey: &Survey,
    employees: &[Employee],
    existing_responses: &[SurveyResponse],
    reference_date: NaiveDate,
) -> EligibilityReport {
    if !survey.is_active {
        return EligibilityReport {
            eligible: Vec::new(),
            warnings: Vec::new(),
        };
    }

    let contacted: HashSet<Uuid> = existing_responses
        .iter()
        .filter(|r| r.survey_id == survey.id)
        .map(|r| r.employee_id)
        .collect();

    let mut eligible = Vec::new();
    let mut warnings = Vec::new();

    for employee in employees.iter().filter(|e| e.is_active) {
        let Some(start_date) = employee.start_date else {
            warnings.push(RosterWarning {
                employee_id: employee.id,
                full_name: employee.full_name.clone(),
                issue: RosterIssue::MissingStartDate,
            });
            continue;
        };
        let days_since_start = (reference_date - start_date).num_days();
        if days_since_start < i64::from(survey.days_after_start) {
            continue;
        }
        if contacted.contains(&employee.id) {
            continue;
        }
        eligible.push(EligibleEmployee {
            employee_id: employee.id,
            full_name: employee.full_name.clone(),
            telegram_id: employee.telegram_id,
            start_date,
            days_since_start,
        });
    }

    // Employees closest to the threshold surface first; identity breaks ties
    // so the ordering is stable across runs.
    eligible.sort_by(|a, b| {
        a.days_since_start
            .cmp(&b.days_since_start)
            .then(a.employee_id.cmp(&b.employee_id))
    });

    EligibilityReport { eligible, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::response::ResponseStatus;
    use chrono::{Duration, Utc};

    fn survey(days_after_start: i32, is_active: bool) -> Survey {
        Survey {
            id: Uuid::new_v4(),
            title: "Onboarding".to_string(),
            description: None,
            days_after_start,
            is_active,
            questions: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn employee(start_date: Option<NaiveDate>, is_active: bool) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            full_name: "Test Employee".to_string(),
            position: None,
            department: None,
            telegram_id: Some(100),
            telegram_username: None,
            start_date,
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn response_for(survey: &Survey, employee: &Employee) -> SurveyResponse {
        SurveyResponse {
            id: Uuid::new_v4(),
            survey_id: survey.id,
            employee_id: employee.id,
            status: ResponseStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            answers: Vec::new(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn employee_past_threshold_is_eligible() {
        let survey = survey(30, true);
        let employee = employee(Some(today() - Duration::days(45)), true);
        let report = evaluate(&survey, &[employee.clone()], &[], today());
        assert_eq!(report.eligible.len(), 1);
        assert_eq!(report.eligible[0].employee_id, employee.id);
        assert_eq!(report.eligible[0].days_since_start, 45);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn tenure_below_threshold_is_not_eligible() {
        let survey = survey(90, true);
        let employee = employee(Some(today() - Duration::days(45)), true);
        let report = evaluate(&survey, &[employee], &[], today());
        assert!(report.eligible.is_empty());
    }

    #[test]
    fn zero_threshold_includes_everyone_active() {
        let survey = survey(0, true);
        let hired_today = employee(Some(today()), true);
        let report = evaluate(&survey, &[hired_today], &[], today());
        assert_eq!(report.eligible.len(), 1);
        assert_eq!(report.eligible[0].days_since_start, 0);
    }

    #[test]
    fn future_start_date_is_never_eligible() {
        let survey = survey(0, true);
        let not_started = employee(Some(today() + Duration::days(7)), true);
        let report = evaluate(&survey, &[not_started], &[], today());
        assert!(report.eligible.is_empty());
    }

    #[test]
    fn inactive_employee_is_excluded() {
        let survey = survey(0, true);
        let former = employee(Some(today() - Duration::days(400)), false);
        let report = evaluate(&survey, &[former], &[], today());
        assert!(report.eligible.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn inactive_survey_yields_empty_set() {
        let survey = survey(0, false);
        let employee = employee(Some(today() - Duration::days(400)), true);
        let report = evaluate(&survey, &[employee], &[], today());
        assert!(report.eligible.is_empty());
    }

    #[test]
    fn any_existing_response_excludes_the_employee() {
        let survey = survey(30, true);
        let employee = employee(Some(today() - Duration::days(100)), true);
        let existing = response_for(&survey, &employee);
        let report = evaluate(&survey, &[employee], &[existing], today());
        assert!(report.eligible.is_empty());
    }

    #[test]
    fn response_for_another_survey_does_not_exclude() {
        let survey = survey(30, true);
        let other = self::survey(30, true);
        let employee = employee(Some(today() - Duration::days(100)), true);
        let existing = response_for(&other, &employee);
        let report = evaluate(&survey, &[employee], &[existing], today());
        assert_eq!(report.eligible.len(), 1);
    }

    #[test]
    fn missing_start_date_becomes_warning_not_failure() {
        let survey = survey(0, true);
        let broken = employee(None, true);
        let fine = employee(Some(today() - Duration::days(10)), true);
        let report = evaluate(&survey, &[broken.clone(), fine], &[], today());
        assert_eq!(report.eligible.len(), 1);
        assert_eq!(
            report.warnings,
            vec![RosterWarning {
                employee_id: broken.id,
                full_name: broken.full_name,
                issue: RosterIssue::MissingStartDate,
            }]
        );
    }

    #[test]
    fn ordering_is_ascending_tenure_then_id() {
        let survey = survey(0, true);
        let newer = employee(Some(today() - Duration::days(5)), true);
        let older = employee(Some(today() - Duration::days(50)), true);
        let mut tied_a = employee(Some(today() - Duration::days(20)), true);
        let mut tied_b = employee(Some(today() - Duration::days(20)), true);
        tied_a.id = Uuid::from_u128(1);
        tied_b.id = Uuid::from_u128(2);
        let report = evaluate(
            &survey,
            &[older.clone(), tied_b.clone(), tied_a.clone(), newer.clone()],
            &[],
            today(),
        );
        let ids: Vec<Uuid> = report.eligible.iter().map(|e| e.employee_id).collect();
        assert_eq!(ids, vec![newer.id, tied_a.id, tied_b.id, older.id]);
    }

    #[test]
    fn output_ids_are_unique() {
        let survey = survey(0, true);
        let roster: Vec<Employee> = (0..20)
            .map(|i| employee(Some(today() - Duration::days(i % 7)), true))
            .collect();
        let report = evaluate(&survey, &roster, &[], today());
        let ids: HashSet<Uuid> = report.eligible.iter().map(|e| e.employee_id).collect();
        assert_eq!(ids.len(), report.eligible.len());
    }

    #[test]
    fn eligibility_is_monotonic_in_reference_date() {
        let survey = survey(30, true);
        let employee = employee(Some(today() - Duration::days(31)), true);
        let at_first = evaluate(&survey, &[employee.clone()], &[], today());
        assert_eq!(at_first.eligible.len(), 1);
        for weeks in 1..10 {
            let later = today() + Duration::weeks(weeks);
            let report = evaluate(&survey, &[employee.clone()], &[], later);
            assert_eq!(report.eligible.len(), 1, "eligibility lost at +{weeks}w");
        }
    }
}
