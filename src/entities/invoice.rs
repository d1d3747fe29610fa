//! Invoice & Payment entities - Fatturazione con calcolo dei totali

use super::enums::{InvoiceStatus, PaymentMethod};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Invoice {
    pub invoice_id: i32,
    pub clinic_id: i32,
    pub invoice_number: String,
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    pub appointment_id: Option<i32>,
    pub items: Json<Vec<InvoiceItem>>,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub discount: f64,
    pub total: f64,
    pub amount_paid: f64,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn balance_due(&self) -> f64 {
        round_cents((self.total - self.amount_paid).max(0.0))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Validate)]
pub struct InvoiceItem {
    #[validate(length(min = 1, max = 255, message = "Item description is required"))]
    pub description: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(range(min = 0.0, message = "Unit price cannot be negative"))]
    pub unit_price: f64,
}

impl InvoiceItem {
    pub fn line_total(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

/// Totali calcolati di una fattura
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalsError {
    NoItems,
    DiscountExceedsSubtotal,
}

impl InvoiceTotals {
    /// subtotal = Σ qty·price, tax = (subtotal − discount)·rate/100, total = subtotal − discount + tax
    pub fn compute(items: &[InvoiceItem], tax_rate: f64, discount: f64) -> Result<Self, TotalsError> {
        if items.is_empty() {
            return Err(TotalsError::NoItems);
        }
        let subtotal = round_cents(items.iter().map(InvoiceItem::line_total).sum());
        if discount > subtotal {
            return Err(TotalsError::DiscountExceedsSubtotal);
        }
        let taxable = subtotal - discount;
        let tax_amount = round_cents(taxable * tax_rate / 100.0);
        let total = round_cents(taxable + tax_amount);
        Ok(Self {
            subtotal,
            tax_amount,
            total,
        })
    }
}

/// Stato della fattura dopo aver registrato un pagamento
pub fn status_after_payment(current: InvoiceStatus, total: f64, amount_paid: f64) -> InvoiceStatus {
    if amount_paid + 0.005 >= total {
        InvoiceStatus::Paid
    } else {
        current
    }
}

/// Modifica incompatibile con i pagamenti già registrati
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditConflict {
    /// Il nuovo totale è inferiore a quanto già incassato
    TotalBelowPaid { amount_paid: f64 },
    /// Una fattura con pagamenti non torna in bozza
    DraftWithPayments,
}

/// Stato risultante dopo la modifica di una fattura `draft`/`pending`.
/// Se l'incassato copre il nuovo totale la fattura diventa `paid`.
pub fn status_after_edit(
    requested: InvoiceStatus,
    total: f64,
    amount_paid: f64,
) -> Result<InvoiceStatus, EditConflict> {
    if amount_paid <= 0.0 {
        return Ok(requested);
    }
    if requested == InvoiceStatus::Draft {
        return Err(EditConflict::DraftWithPayments);
    }
    if amount_paid > total + 0.005 {
        return Err(EditConflict::TotalBelowPaid { amount_paid });
    }
    Ok(status_after_payment(requested, total, amount_paid))
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Numero fattura leggibile: INV-YYYYMM-NNNN
pub fn format_invoice_number(issue_date: NaiveDate, sequence: i64) -> String {
    format!("INV-{}-{:04}", issue_date.format("%Y%m"), sequence)
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Payment {
    pub payment_id: i32,
    pub clinic_id: i32,
    pub invoice_id: i32,
    pub patient_id: i32,
    pub amount: f64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub received_by: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i32, unit_price: f64) -> InvoiceItem {
        InvoiceItem {
            description: "Consultation".to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn totals_apply_discount_before_tax() {
        let totals = InvoiceTotals::compute(&[item(2, 50.0), item(1, 20.0)], 10.0, 20.0).unwrap();
        assert_eq!(totals.subtotal, 120.0);
        assert_eq!(totals.tax_amount, 10.0);
        assert_eq!(totals.total, 110.0);
    }

    #[test]
    fn totals_round_to_cents() {
        let totals = InvoiceTotals::compute(&[item(3, 33.333)], 7.5, 0.0).unwrap();
        assert_eq!(totals.subtotal, 100.0);
        assert_eq!(totals.tax_amount, 7.5);
        assert_eq!(totals.total, 107.5);
    }

    #[test]
    fn totals_reject_empty_items() {
        assert_eq!(
            InvoiceTotals::compute(&[], 0.0, 0.0),
            Err(TotalsError::NoItems)
        );
    }

    #[test]
    fn totals_reject_discount_larger_than_subtotal() {
        assert_eq!(
            InvoiceTotals::compute(&[item(1, 10.0)], 0.0, 10.01),
            Err(TotalsError::DiscountExceedsSubtotal)
        );
    }

    #[test]
    fn full_payment_marks_invoice_paid() {
        assert_eq!(
            status_after_payment(InvoiceStatus::Pending, 110.0, 110.0),
            InvoiceStatus::Paid
        );
        assert_eq!(
            status_after_payment(InvoiceStatus::Overdue, 110.0, 110.0),
            InvoiceStatus::Paid
        );
    }

    #[test]
    fn partial_payment_keeps_status() {
        assert_eq!(
            status_after_payment(InvoiceStatus::Overdue, 110.0, 50.0),
            InvoiceStatus::Overdue
        );
    }

    #[test]
    fn edits_without_payments_keep_the_requested_status() {
        assert_eq!(
            status_after_edit(InvoiceStatus::Draft, 30.0, 0.0),
            Ok(InvoiceStatus::Draft)
        );
        assert_eq!(
            status_after_edit(InvoiceStatus::Pending, 30.0, 0.0),
            Ok(InvoiceStatus::Pending)
        );
    }

    #[test]
    fn edits_are_checked_against_the_amount_paid() {
        assert_eq!(
            status_after_edit(InvoiceStatus::Pending, 30.0, 50.0),
            Err(EditConflict::TotalBelowPaid { amount_paid: 50.0 })
        );
        assert_eq!(
            status_after_edit(InvoiceStatus::Draft, 110.0, 50.0),
            Err(EditConflict::DraftWithPayments)
        );
        // l'incassato copre esattamente il nuovo totale
        assert_eq!(
            status_after_edit(InvoiceStatus::Pending, 50.0, 50.0),
            Ok(InvoiceStatus::Paid)
        );
        assert_eq!(
            status_after_edit(InvoiceStatus::Pending, 80.0, 50.0),
            Ok(InvoiceStatus::Pending)
        );
    }

    #[test]
    fn invoice_number_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(format_invoice_number(date, 7), "INV-202603-0007");
    }
}
