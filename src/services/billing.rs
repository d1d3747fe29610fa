//! Billing services - Fatture, annullamenti e pagamenti

use super::guards::{ensure_appointment, ensure_doctor, ensure_patient, ensure_permitted};
use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Query, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, CreateInvoiceDTO, CreatePaymentDTO, InvoiceDTO, InvoiceListQuery, PageRequest,
    Paginated, PaymentListQuery, UpdateInvoiceDTO,
};
use crate::entities::{EditConflict, Invoice, InvoiceStatus, InvoiceTotals, Payment, Role};
use crate::repositories::{
    Create, InvoiceChanges, InvoiceEdit, NewInvoice, PaymentOutcome, Read,
};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Days, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

const BILLING: &[Role] = &[Role::Receptionist, Role::Accountant];
const DEFAULT_PAYMENT_TERMS_DAYS: u64 = 30;

/// Scadenza di default: emissione + 30 giorni, `None` oltre l'ultima data rappresentabile
fn default_due_date(issue_date: NaiveDate) -> Option<NaiveDate> {
    issue_date.checked_add_days(Days::new(DEFAULT_PAYMENT_TERMS_DAYS))
}

/// Una fattura può nascere o essere riportata solo in `draft` o `pending`
fn ensure_open_status(status: InvoiceStatus) -> Result<(), AppError> {
    if status.is_editable() {
        Ok(())
    } else {
        Err(AppError::bad_request("Invoice status must be draft or pending")
            .with_details(format!("Received status {:?}", status)))
    }
}

async fn load_visible(
    state: &AppState,
    ctx: &ClinicContext,
    invoice_id: i32,
) -> Result<Invoice, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Invoice);
    filter.ensure_visible()?;
    let invoice = state
        .invoice
        .read(&(ctx.clinic_id(), invoice_id))
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;
    ensure_permitted(&filter, invoice.doctor_id, "Invoice not found")?;
    Ok(invoice)
}

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<InvoiceListQuery>,
) -> Result<Json<Paginated<InvoiceDTO>>, AppError> {
    debug!("Listing invoices");
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Invoice);
    filter.ensure_visible()?;

    // le fatture scadute passano ad overdue prima di essere mostrate
    state
        .invoice
        .mark_overdue(ctx.clinic_id(), Utc::now().date_naive())
        .await?;

    let page = PageRequest::new(query.page, query.limit);
    let (invoices, total) = state
        .invoice
        .list(ctx.clinic_id(), &filter, &query, page)
        .await?;

    Ok(Json(
        Paginated::new(invoices, total, page).map(InvoiceDTO::from),
    ))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), patient_id = %body.patient_id))]
pub async fn create_invoice(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(body): Json<CreateInvoiceDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating invoice");
    // 1. Ruoli ammessi: admin, receptionist, accountant
    // 2. Validazione del body e dello stato iniziale
    // 3. Paziente (medico e appuntamento, se indicati) della clinica corrente
    // 4. Date: emissione di default oggi, scadenza di default +30 giorni
    // 5. Totali calcolati dal server
    require_role(&ctx, BILLING)?;
    body.validate()?;

    let status = body.status.unwrap_or(InvoiceStatus::Pending);
    ensure_open_status(status)?;

    ensure_patient(&state, ctx.clinic_id(), body.patient_id).await?;
    ensure_appointment(&state, ctx.clinic_id(), body.patient_id, body.appointment_id).await?;
    if let Some(doctor_id) = body.doctor_id {
        ensure_doctor(&state, ctx.clinic_id(), doctor_id).await?;
    }

    let issue_date = body.issue_date.unwrap_or_else(|| Utc::now().date_naive());
    let due_date = match body.due_date {
        Some(due_date) => due_date,
        None => default_due_date(issue_date).ok_or_else(|| {
            warn!("Issue date {} leaves no room for payment terms", issue_date);
            AppError::bad_request("Date out of range")
        })?,
    };
    if due_date < issue_date {
        warn!("Due date {} before issue date {}", due_date, issue_date);
        return Err(AppError::bad_request("Due date cannot be before the issue date"));
    }

    let totals = InvoiceTotals::compute(&body.items, body.tax_rate, body.discount)?;

    let invoice = state
        .invoice
        .create(&NewInvoice {
            clinic_id: ctx.clinic_id(),
            patient_id: body.patient_id,
            doctor_id: body.doctor_id,
            appointment_id: body.appointment_id,
            items: body.items,
            tax_rate: body.tax_rate,
            discount: body.discount,
            totals,
            status,
            issue_date,
            due_date,
            notes: body.notes,
            created_by: ctx.user_id,
        })
        .await?;

    info!("Invoice {} created", invoice.invoice_number);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(InvoiceDTO::from(invoice))),
    ))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), invoice_id = %invoice_id))]
pub async fn get_invoice(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(invoice_id): Path<i32>,
) -> Result<Json<ApiResponse<InvoiceDTO>>, AppError> {
    let invoice = load_visible(&state, &ctx, invoice_id).await?;
    Ok(Json(ApiResponse::new(InvoiceDTO::from(invoice))))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), invoice_id = %invoice_id))]
pub async fn update_invoice(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(invoice_id): Path<i32>,
    Json(body): Json<UpdateInvoiceDTO>,
) -> Result<Json<ApiResponse<InvoiceDTO>>, AppError> {
    debug!("Updating invoice");
    require_role(&ctx, BILLING)?;
    body.validate()?;

    let current = load_visible(&state, &ctx, invoice_id).await?;
    if let Some(status) = body.status {
        ensure_open_status(status)?;
    }
    if let Some(doctor_id) = body.doctor_id {
        ensure_doctor(&state, ctx.clinic_id(), doctor_id).await?;
    }
    if body.due_date.is_some_and(|due| due < current.issue_date) {
        return Err(AppError::bad_request("Due date cannot be before the issue date"));
    }

    // totali e stato si ricalcolano sulla fattura bloccata, rispetto a quanto già incassato
    let changes = InvoiceChanges {
        doctor_id: body.doctor_id,
        items: body.items,
        tax_rate: body.tax_rate,
        discount: body.discount,
        due_date: body.due_date,
        status: body.status,
        notes: body.notes,
    };

    let invoice = match state
        .invoice
        .edit(&(ctx.clinic_id(), invoice_id), &changes)
        .await?
    {
        InvoiceEdit::Updated(invoice) => invoice,
        InvoiceEdit::NotEditable(status) => {
            return Err(
                AppError::bad_request("Only draft or pending invoices can be edited")
                    .with_details(format!("Invoice status is {:?}", status)),
            );
        }
        InvoiceEdit::InvalidTotals(e) => return Err(e.into()),
        InvoiceEdit::Conflict(EditConflict::TotalBelowPaid { amount_paid }) => {
            return Err(
                AppError::bad_request("Invoice total cannot be lower than the amount paid")
                    .with_details(format!("Amount already paid is {:.2}", amount_paid)),
            );
        }
        InvoiceEdit::Conflict(EditConflict::DraftWithPayments) => {
            return Err(AppError::bad_request(
                "Invoices with recorded payments cannot go back to draft",
            ));
        }
    };

    info!("Invoice {} updated", invoice.invoice_number);
    Ok(Json(ApiResponse::new(InvoiceDTO::from(invoice))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), invoice_id = %invoice_id))]
pub async fn cancel_invoice(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(invoice_id): Path<i32>,
) -> Result<Json<ApiResponse<InvoiceDTO>>, AppError> {
    debug!("Cancelling invoice");
    require_role(&ctx, BILLING)?;
    load_visible(&state, &ctx, invoice_id).await?;

    let id = (ctx.clinic_id(), invoice_id);
    let cancelled = state.invoice.cancel_unpaid(&id).await?;

    let invoice = state
        .invoice
        .read(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;

    if !cancelled {
        warn!(
            "Invoice {} cannot be cancelled (status {:?}, paid {})",
            invoice.invoice_number, invoice.status, invoice.amount_paid
        );
        return Err(
            AppError::bad_request("Invoice cannot be cancelled").with_details(
                "Invoices with recorded payments or already closed cannot be cancelled",
            ),
        );
    }

    info!("Invoice {} cancelled", invoice.invoice_number);
    Ok(Json(ApiResponse::new(InvoiceDTO::from(invoice))))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), invoice_id = %invoice_id))]
pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(invoice_id): Path<i32>,
    Json(body): Json<CreatePaymentDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Recording payment");
    require_role(&ctx, BILLING)?;
    body.validate()?;
    load_visible(&state, &ctx, invoice_id).await?;

    let outcome = state
        .payment
        .record_payment(ctx.clinic_id(), invoice_id, ctx.user_id, &body)
        .await?;

    match outcome {
        PaymentOutcome::Recorded { payment, invoice } => {
            info!(
                "Payment {} recorded on invoice {}",
                payment.payment_id, invoice.invoice_number
            );
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::new(PaymentReceipt {
                    payment,
                    invoice: InvoiceDTO::from(invoice),
                })),
            ))
        }
        PaymentOutcome::InvoiceClosed(status) => Err(AppError::bad_request(
            "Invoice does not accept payments",
        )
        .with_details(format!("Invoice status is {:?}", status))),
        PaymentOutcome::ExceedsBalance { balance_due } => Err(AppError::bad_request(
            "Payment exceeds the outstanding balance",
        )
        .with_details(format!("Outstanding balance is {:.2}", balance_due))),
    }
}

/// Pagamento registrato insieme alla fattura aggiornata
#[derive(serde::Serialize, Debug)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub invoice: InvoiceDTO,
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), invoice_id = %invoice_id))]
pub async fn list_invoice_payments(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(invoice_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<Payment>>>, AppError> {
    load_visible(&state, &ctx, invoice_id).await?;
    let payments = state
        .payment
        .list_for_invoice(ctx.clinic_id(), invoice_id)
        .await?;
    Ok(Json(ApiResponse::new(payments)))
}

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<Paginated<Payment>>, AppError> {
    debug!("Listing payments");
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Invoice);
    filter.ensure_visible()?;

    let page = PageRequest::new(query.page, query.limit);
    let (payments, total) = state
        .payment
        .list(ctx.clinic_id(), &filter, &query, page)
        .await?;

    Ok(Json(Paginated::new(payments, total, page)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_draft_and_pending_are_open() {
        assert!(ensure_open_status(InvoiceStatus::Draft).is_ok());
        assert!(ensure_open_status(InvoiceStatus::Pending).is_ok());
        let err = ensure_open_status(InvoiceStatus::Paid).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(ensure_open_status(InvoiceStatus::Overdue).is_err());
    }

    #[test]
    fn default_due_date_is_thirty_days_later() {
        let issue = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(default_due_date(issue), NaiveDate::from_ymd_opt(2026, 2, 14));
        assert_eq!(default_due_date(NaiveDate::MAX), None);
    }
}
