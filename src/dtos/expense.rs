//! Expense DTOs

use crate::entities::{ExpenseCategory, PaymentMethod};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateExpenseDTO {
    pub category: ExpenseCategory,
    #[validate(length(min = 1, max = 255, message = "Description is required"))]
    pub description: String,
    #[validate(range(exclusive_min = 0.0, message = "Amount must be greater than zero"))]
    pub amount: f64,
    pub expense_date: Option<NaiveDate>,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 150))]
    pub vendor: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateExpenseDTO {
    pub category: Option<ExpenseCategory>,
    #[validate(length(min = 1, max = 255))]
    pub description: Option<String>,
    #[validate(range(exclusive_min = 0.0, message = "Amount must be greater than zero"))]
    pub amount: Option<f64>,
    pub expense_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(max = 150))]
    pub vendor: Option<String>,
    pub notes: Option<String>,
}
