//! Payroll entity - Cedolini del personale

use super::enums::PayrollStatus;
use super::invoice::round_cents;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Payroll {
    pub payroll_id: i32,
    pub clinic_id: i32,
    pub employee_id: i32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_salary: f64,
    pub allowances: f64,
    pub deductions: f64,
    pub net_salary: f64,
    pub status: PayrollStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Netto = base + indennità − trattenute; `None` se negativo
pub fn net_salary(base_salary: f64, allowances: f64, deductions: f64) -> Option<f64> {
    let net = round_cents(base_salary + allowances - deductions);
    (net >= 0.0).then_some(net)
}
