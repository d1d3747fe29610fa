//! Test report DTOs

use crate::entities::{TestReport, TestReportStatus, TestResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateTestReportDTO {
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    #[validate(length(min = 1, max = 150, message = "Test name is required"))]
    pub test_name: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub test_date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(nested)]
    pub results: Vec<TestResult>,
    pub status: Option<TestReportStatus>,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateTestReportDTO {
    #[validate(length(min = 1, max = 150))]
    pub test_name: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub test_date: Option<NaiveDate>,
    #[validate(nested)]
    pub results: Option<Vec<TestResult>>,
    pub status: Option<TestReportStatus>,
    pub notes: Option<String>,
}

/// Referto con il conteggio dei parametri segnalati dal laboratorio
#[derive(Serialize, Debug)]
pub struct TestReportDTO {
    #[serde(flatten)]
    pub report: TestReport,
    pub flagged_count: usize,
}

impl From<TestReport> for TestReportDTO {
    fn from(report: TestReport) -> Self {
        let flagged_count = report.flagged_results().count();
        Self {
            report,
            flagged_count,
        }
    }
}
