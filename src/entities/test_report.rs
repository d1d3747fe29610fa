//! TestReport entity - Referto di laboratorio

use super::enums::TestReportStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct TestReport {
    pub report_id: i32,
    pub clinic_id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub test_name: String,
    pub category: Option<String>,
    pub test_date: NaiveDate,
    pub results: Json<Vec<TestResult>>,
    pub status: TestReportStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Validate)]
pub struct TestResult {
    #[validate(length(min = 1, max = 100))]
    pub parameter: String,
    #[validate(length(min = 1, max = 100))]
    pub value: String,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    // es. "high", "low", "critical"
    pub flag: Option<String>,
}

impl TestReport {
    /// Parametri fuori range secondo il flag del laboratorio
    pub fn flagged_results(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.flag.is_some())
    }
}
