//! Expense entity - Spese della clinica

use super::enums::{ExpenseCategory, PaymentMethod};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Expense {
    pub expense_id: i32,
    pub clinic_id: i32,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: f64,
    pub expense_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub vendor: Option<String>,
    pub notes: Option<String>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
