//! Billing DTOs - Fatture e pagamenti

use crate::entities::{Invoice, InvoiceItem, InvoiceStatus, PaymentMethod};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateInvoiceDTO {
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    pub appointment_id: Option<i32>,
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "Tax rate must be between 0 and 100"))]
    pub tax_rate: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Discount cannot be negative"))]
    pub discount: f64,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Solo `draft` o `pending` (default)
    pub status: Option<InvoiceStatus>,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateInvoiceDTO {
    pub doctor_id: Option<i32>,
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Option<Vec<InvoiceItem>>,
    #[validate(range(min = 0.0, max = 100.0, message = "Tax rate must be between 0 and 100"))]
    pub tax_rate: Option<f64>,
    #[validate(range(min = 0.0, message = "Discount cannot be negative"))]
    pub discount: Option<f64>,
    pub due_date: Option<NaiveDate>,
    /// Permette di emettere una bozza (draft -> pending)
    pub status: Option<InvoiceStatus>,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreatePaymentDTO {
    #[validate(range(exclusive_min = 0.0, message = "Amount must be greater than zero"))]
    pub amount: f64,
    pub method: PaymentMethod,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Fattura con il saldo ancora da pagare
#[derive(Serialize, Debug)]
pub struct InvoiceDTO {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub balance_due: f64,
}

impl From<Invoice> for InvoiceDTO {
    fn from(invoice: Invoice) -> Self {
        let balance_due = invoice.balance_due();
        Self {
            invoice,
            balance_due,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_must_be_positive() {
        let dto = CreatePaymentDTO {
            amount: 0.0,
            method: PaymentMethod::Cash,
            reference: None,
            paid_at: None,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn tax_rate_over_100_is_rejected() {
        let dto = CreateInvoiceDTO {
            patient_id: 1,
            doctor_id: None,
            appointment_id: None,
            items: vec![InvoiceItem {
                description: "Cleaning".to_string(),
                quantity: 1,
                unit_price: 80.0,
            }],
            tax_rate: 120.0,
            discount: 0.0,
            issue_date: None,
            due_date: None,
            status: None,
            notes: None,
        };
        let errors = dto.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("tax_rate"));
    }
}
