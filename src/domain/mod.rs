pub mod eligibility;
pub mod employee;
pub mod response;
pub mod submission;
pub mod survey;
