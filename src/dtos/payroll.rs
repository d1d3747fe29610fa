//! Payroll DTOs

use crate::entities::PayrollStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreatePayrollDTO {
    pub employee_id: i32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    #[validate(range(min = 0.0, message = "Base salary cannot be negative"))]
    pub base_salary: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Allowances cannot be negative"))]
    pub allowances: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Deductions cannot be negative"))]
    pub deductions: f64,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdatePayrollDTO {
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    #[validate(range(min = 0.0, message = "Base salary cannot be negative"))]
    pub base_salary: Option<f64>,
    #[validate(range(min = 0.0, message = "Allowances cannot be negative"))]
    pub allowances: Option<f64>,
    #[validate(range(min = 0.0, message = "Deductions cannot be negative"))]
    pub deductions: Option<f64>,
    /// Solo `pending` o `cancelled`; il pagamento passa da `PATCH /{id}/pay`
    pub status: Option<PayrollStatus>,
    pub notes: Option<String>,
}
