//! PaymentRepository - Registrazione dei pagamenti sulle fatture

use super::invoice::InvoiceRepository;
use crate::core::RowFilter;
use crate::dtos::{CreatePaymentDTO, PageRequest, PaymentListQuery};
use crate::entities::invoice::{round_cents, status_after_payment};
use crate::entities::{Invoice, InvoiceStatus, Payment};
use crate::repositories::appointment::{day_end, day_start};
use chrono::Utc;
use sqlx::{Error, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument, warn};

const PAYMENT_COLUMNS: &str = "p.payment_id, p.clinic_id, p.invoice_id, p.patient_id, p.amount, \
                               p.method, p.reference, p.paid_at, p.received_by, p.created_at";

/// Tolleranza sugli arrotondamenti al centesimo
const CENT_TOLERANCE: f64 = 0.005;

/// Esito della registrazione di un pagamento
#[derive(Debug)]
pub enum PaymentOutcome {
    Recorded { payment: Payment, invoice: Invoice },
    /// La fattura è in uno stato che non accetta pagamenti (draft, paid, cancelled)
    InvoiceClosed(InvoiceStatus),
    /// L'importo supera il saldo residuo
    ExceedsBalance { balance_due: f64 },
}

pub struct PaymentRepository {
    connection_pool: MySqlPool,
}

impl PaymentRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    /// Registra il pagamento in un'unica transazione con la riga fattura bloccata:
    /// pagamenti concorrenti sulla stessa fattura non possono superare il totale.
    #[instrument(skip(self, data), fields(clinic_id = %clinic_id, invoice_id = %invoice_id))]
    pub async fn record_payment(
        &self,
        clinic_id: i32,
        invoice_id: i32,
        received_by: i32,
        data: &CreatePaymentDTO,
    ) -> Result<PaymentOutcome, Error> {
        debug!("Recording payment");
        let mut tx = self.connection_pool.begin().await?;

        // 1. Lock della fattura
        let invoice = InvoiceRepository::read_with(&mut tx, clinic_id, invoice_id, true)
            .await?
            .ok_or(Error::RowNotFound)?;

        // 2. Stato e saldo
        if !invoice.status.accepts_payments() {
            warn!("Invoice in status {:?} does not accept payments", invoice.status);
            return Ok(PaymentOutcome::InvoiceClosed(invoice.status));
        }
        let balance_due = invoice.balance_due();
        if data.amount > balance_due + CENT_TOLERANCE {
            warn!("Payment of {} exceeds balance {}", data.amount, balance_due);
            return Ok(PaymentOutcome::ExceedsBalance { balance_due });
        }

        // 3. Pagamento
        let amount = round_cents(data.amount);
        let result = sqlx::query(
            r#"
            INSERT INTO payments (clinic_id, invoice_id, patient_id, amount, method, reference, paid_at, received_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(clinic_id)
        .bind(invoice_id)
        .bind(invoice.patient_id)
        .bind(amount)
        .bind(data.method)
        .bind(&data.reference)
        .bind(data.paid_at.unwrap_or_else(Utc::now))
        .bind(received_by)
        .execute(&mut *tx)
        .await?;
        let payment_id = result.last_insert_id() as i32;

        // 4. Aggiornamento importo pagato e stato
        let amount_paid = round_cents(invoice.amount_paid + amount);
        let status = status_after_payment(invoice.status, invoice.total, amount_paid);
        sqlx::query("UPDATE invoices SET amount_paid = ?, status = ? WHERE invoice_id = ?")
            .bind(amount_paid)
            .bind(status)
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;

        let sql = format!("SELECT {} FROM payments p WHERE p.payment_id = ?", PAYMENT_COLUMNS);
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .fetch_one(&mut *tx)
            .await?;
        let invoice = InvoiceRepository::read_with(&mut tx, clinic_id, invoice_id, false)
            .await?
            .ok_or(Error::RowNotFound)?;
        tx.commit().await?;

        info!("Payment {} recorded, invoice status {:?}", payment_id, invoice.status);
        Ok(PaymentOutcome::Recorded { payment, invoice })
    }

    #[instrument(skip(self), fields(clinic_id = %clinic_id, invoice_id = %invoice_id))]
    pub async fn list_for_invoice(
        &self,
        clinic_id: i32,
        invoice_id: i32,
    ) -> Result<Vec<Payment>, Error> {
        debug!("Listing payments of invoice");
        let sql = format!(
            "SELECT {} FROM payments p WHERE p.clinic_id = ? AND p.invoice_id = ? ORDER BY p.paid_at",
            PAYMENT_COLUMNS
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(clinic_id)
            .bind(invoice_id)
            .fetch_all(&self.connection_pool)
            .await?;

        Ok(payments)
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        filter: &RowFilter,
        query: &PaymentListQuery,
    ) {
        query_builder.push(" INNER JOIN invoices i ON i.invoice_id = p.invoice_id WHERE p.clinic_id = ");
        query_builder.push_bind(clinic_id);
        // il filtro per ruolo si applica al medico della fattura
        filter.push_sql(query_builder, "i.");
        if let Some(from) = query.from {
            query_builder.push(" AND p.paid_at >= ");
            query_builder.push_bind(day_start(from));
        }
        if let Some(end) = query.to.and_then(day_end) {
            query_builder.push(" AND p.paid_at < ");
            query_builder.push_bind(end);
        }
    }

    #[instrument(skip(self, filter, query), fields(clinic_id = %clinic_id))]
    pub async fn list(
        &self,
        clinic_id: i32,
        filter: &RowFilter,
        query: &PaymentListQuery,
        page: PageRequest,
    ) -> Result<(Vec<Payment>, i64), Error> {
        debug!("Listing payments");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM payments p");
        Self::push_list_filters(&mut count_query, clinic_id, filter, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM payments p", PAYMENT_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, filter, query);
        select.push(" ORDER BY p.paid_at DESC LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let payments = select
            .build_query_as::<Payment>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((payments, total))
    }
}
