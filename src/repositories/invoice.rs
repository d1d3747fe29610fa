//! InvoiceRepository - Fatture con numerazione progressiva per clinica e mese

use super::{Create, Read};
use crate::core::RowFilter;
use crate::dtos::{InvoiceListQuery, PageRequest};
use crate::entities::invoice::format_invoice_number;
use crate::entities::{
    EditConflict, Invoice, InvoiceItem, InvoiceStatus, InvoiceTotals, TotalsError, status_after_edit,
};
use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::{Error, MySql, MySqlConnection, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument, warn};

pub(crate) const INVOICE_COLUMNS: &str = "invoice_id, clinic_id, invoice_number, patient_id, doctor_id, \
                                          appointment_id, items, subtotal, tax_rate, tax_amount, \
                                          discount, total, amount_paid, status, issue_date, due_date, \
                                          notes, created_by, created_at, updated_at";

/// Fattura pronta per l'inserimento, con totali già calcolati
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub clinic_id: i32,
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    pub appointment_id: Option<i32>,
    pub items: Vec<InvoiceItem>,
    pub tax_rate: f64,
    pub discount: f64,
    pub totals: InvoiceTotals,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: i32,
}

/// Modifiche ad una fattura modificabile; i totali vengono ricalcolati sulla riga bloccata
#[derive(Debug, Clone, Default)]
pub struct InvoiceChanges {
    pub doctor_id: Option<i32>,
    pub items: Option<Vec<InvoiceItem>>,
    pub tax_rate: Option<f64>,
    pub discount: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<InvoiceStatus>,
    pub notes: Option<String>,
}

/// Esito della modifica di una fattura
#[derive(Debug)]
pub enum InvoiceEdit {
    Updated(Invoice),
    /// La fattura non è più `draft` o `pending`
    NotEditable(InvoiceStatus),
    InvalidTotals(TotalsError),
    Conflict(EditConflict),
}

pub struct InvoiceRepository {
    connection_pool: MySqlPool,
}

impl InvoiceRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    /// Prossimo progressivo per (clinica, mese). `LAST_INSERT_ID(expr)` rende
    /// l'incremento atomico anche con inserimenti concorrenti.
    async fn next_sequence(
        conn: &mut MySqlConnection,
        clinic_id: i32,
        issue_date: NaiveDate,
    ) -> Result<i64, Error> {
        let period = issue_date.format("%Y%m").to_string();
        sqlx::query(
            r#"
            INSERT INTO invoice_sequences (clinic_id, period, last_value)
            VALUES (?, ?, LAST_INSERT_ID(1))
            ON DUPLICATE KEY UPDATE last_value = LAST_INSERT_ID(last_value + 1)
            "#,
        )
        .bind(clinic_id)
        .bind(&period)
        .execute(&mut *conn)
        .await?;

        let sequence: u64 = sqlx::query_scalar("SELECT LAST_INSERT_ID()")
            .fetch_one(&mut *conn)
            .await?;
        Ok(sequence as i64)
    }

    pub(crate) async fn read_with(
        conn: &mut MySqlConnection,
        clinic_id: i32,
        invoice_id: i32,
        for_update: bool,
    ) -> Result<Option<Invoice>, Error> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE clinic_id = ? AND invoice_id = ?{}",
            INVOICE_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, Invoice>(&sql)
            .bind(clinic_id)
            .bind(invoice_id)
            .fetch_optional(conn)
            .await
    }

    /// Le fatture pending con scadenza passata diventano overdue
    #[instrument(skip(self), fields(clinic_id = %clinic_id))]
    pub async fn mark_overdue(&self, clinic_id: i32, today: NaiveDate) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE invoices SET status = 'overdue' WHERE clinic_id = ? AND status = 'pending' AND due_date < ?",
        )
        .bind(clinic_id)
        .bind(today)
        .execute(&self.connection_pool)
        .await?;

        if result.rows_affected() > 0 {
            info!("{} invoices marked as overdue", result.rows_affected());
        }
        Ok(result.rows_affected())
    }

    /// Annulla la fattura solo se non ha pagamenti e non è già chiusa.
    /// Ritorna `false` se la condizione non è soddisfatta (o la fattura non esiste).
    #[instrument(skip(self), fields(clinic_id = %id.0, invoice_id = %id.1))]
    pub async fn cancel_unpaid(&self, id: &(i32, i32)) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET status = 'cancelled'
            WHERE clinic_id = ? AND invoice_id = ?
              AND status IN ('draft', 'pending', 'overdue')
              AND NOT EXISTS (SELECT 1 FROM payments p WHERE p.invoice_id = ?)
            "#,
        )
        .bind(id.0)
        .bind(id.1)
        .bind(id.1)
        .execute(&self.connection_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Modifica una fattura `draft`/`pending` con la riga bloccata: totali e stato
    /// vengono ricalcolati rispetto all'importo già incassato.
    #[instrument(skip(self, data), fields(clinic_id = %id.0, invoice_id = %id.1))]
    pub async fn edit(&self, id: &(i32, i32), data: &InvoiceChanges) -> Result<InvoiceEdit, Error> {
        debug!("Updating invoice");
        let mut tx = self.connection_pool.begin().await?;

        // 1. Lock della fattura
        let current = Self::read_with(&mut tx, id.0, id.1, true)
            .await?
            .ok_or(Error::RowNotFound)?;
        if !current.status.is_editable() {
            warn!("Invoice {} is {:?}", current.invoice_number, current.status);
            return Ok(InvoiceEdit::NotEditable(current.status));
        }

        // 2. Totali sui valori risultanti
        let items = data.items.as_deref().unwrap_or(&current.items.0);
        let tax_rate = data.tax_rate.unwrap_or(current.tax_rate);
        let discount = data.discount.unwrap_or(current.discount);
        let totals = match InvoiceTotals::compute(items, tax_rate, discount) {
            Ok(totals) => totals,
            Err(e) => return Ok(InvoiceEdit::InvalidTotals(e)),
        };

        // 3. Stato rispetto ai pagamenti già registrati
        let requested = data.status.unwrap_or(current.status);
        let status = match status_after_edit(requested, totals.total, current.amount_paid) {
            Ok(status) => status,
            Err(conflict) => {
                warn!("Invoice edit conflicts with payments: {:?}", conflict);
                return Ok(InvoiceEdit::Conflict(conflict));
            }
        };

        // 4. Aggiornamento
        let mut query_builder = QueryBuilder::<MySql>::new("UPDATE invoices SET ");
        let mut separated = query_builder.separated(", ");
        separated.push("items = ");
        separated.push_bind_unseparated(Json(items));
        separated.push("tax_rate = ");
        separated.push_bind_unseparated(tax_rate);
        separated.push("discount = ");
        separated.push_bind_unseparated(discount);
        separated.push("subtotal = ");
        separated.push_bind_unseparated(totals.subtotal);
        separated.push("tax_amount = ");
        separated.push_bind_unseparated(totals.tax_amount);
        separated.push("total = ");
        separated.push_bind_unseparated(totals.total);
        separated.push("status = ");
        separated.push_bind_unseparated(status);
        if let Some(doctor_id) = data.doctor_id {
            separated.push("doctor_id = ");
            separated.push_bind_unseparated(doctor_id);
        }
        if let Some(due_date) = data.due_date {
            separated.push("due_date = ");
            separated.push_bind_unseparated(due_date);
        }
        if let Some(ref notes) = data.notes {
            separated.push("notes = ");
            separated.push_bind_unseparated(notes);
        }
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND invoice_id = ");
        query_builder.push_bind(id.1);
        query_builder.build().execute(&mut *tx).await?;

        let invoice = Self::read_with(&mut tx, id.0, id.1, false)
            .await?
            .ok_or(Error::RowNotFound)?;
        tx.commit().await?;

        info!("Invoice updated successfully");
        Ok(InvoiceEdit::Updated(invoice))
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        filter: &RowFilter,
        query: &InvoiceListQuery,
    ) {
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);
        filter.push_sql(query_builder, "");
        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
        }
        if let Some(patient_id) = query.patient_id {
            query_builder.push(" AND patient_id = ");
            query_builder.push_bind(patient_id);
        }
        if let Some(from) = query.from {
            query_builder.push(" AND issue_date >= ");
            query_builder.push_bind(from);
        }
        if let Some(to) = query.to {
            query_builder.push(" AND issue_date <= ");
            query_builder.push_bind(to);
        }
    }

    #[instrument(skip(self, filter, query), fields(clinic_id = %clinic_id))]
    pub async fn list(
        &self,
        clinic_id: i32,
        filter: &RowFilter,
        query: &InvoiceListQuery,
        page: PageRequest,
    ) -> Result<(Vec<Invoice>, i64), Error> {
        debug!("Listing invoices");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM invoices");
        Self::push_list_filters(&mut count_query, clinic_id, filter, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM invoices", INVOICE_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, filter, query);
        select.push(" ORDER BY issue_date DESC, invoice_id DESC LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let invoices = select
            .build_query_as::<Invoice>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((invoices, total))
    }
}

impl Create<Invoice, NewInvoice> for InvoiceRepository {
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id, patient_id = %data.patient_id))]
    async fn create(&self, data: &NewInvoice) -> Result<Invoice, Error> {
        debug!("Creating new invoice");
        let mut tx = self.connection_pool.begin().await?;

        let sequence = Self::next_sequence(&mut tx, data.clinic_id, data.issue_date).await?;
        let invoice_number = format_invoice_number(data.issue_date, sequence);

        let result = sqlx::query(
            r#"
            INSERT INTO invoices (
                clinic_id, invoice_number, patient_id, doctor_id, appointment_id, items,
                subtotal, tax_rate, tax_amount, discount, total, status, issue_date, due_date,
                notes, created_by
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(&invoice_number)
        .bind(data.patient_id)
        .bind(data.doctor_id)
        .bind(data.appointment_id)
        .bind(Json(&data.items))
        .bind(data.totals.subtotal)
        .bind(data.tax_rate)
        .bind(data.totals.tax_amount)
        .bind(data.discount)
        .bind(data.totals.total)
        .bind(data.status)
        .bind(data.issue_date)
        .bind(data.due_date)
        .bind(&data.notes)
        .bind(data.created_by)
        .execute(&mut *tx)
        .await?;
        let new_id = result.last_insert_id() as i32;

        let invoice = Self::read_with(&mut tx, data.clinic_id, new_id, false)
            .await?
            .ok_or(Error::RowNotFound)?;
        tx.commit().await?;

        info!("Invoice {} created with id {}", invoice_number, new_id);
        Ok(invoice)
    }
}

impl Read<Invoice, (i32, i32)> for InvoiceRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, invoice_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Invoice>, Error> {
        debug!("Reading invoice");
        let mut conn = self.connection_pool.acquire().await?;
        Self::read_with(&mut conn, id.0, id.1, false).await
    }
}
