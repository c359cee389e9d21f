use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Roster record. `start_date` is nullable because imported rosters show up
/// with holes; eligibility evaluation skips such records with a warning
/// instead of failing the whole run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub position: Option<String>,
    pub department: Option<String>,
    pub telegram_id: Option<i64>,
    pub telegram_username: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
