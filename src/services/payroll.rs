//! Payroll services - Cedolini del personale
//!
//! Gestione riservata ad admin e accountant; ogni dipendente può leggere i propri cedolini.

use super::guards::ensure_permitted;
use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Query, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, CreatePayrollDTO, MessageResponse, PageRequest, Paginated, PayrollListQuery,
    UpdatePayrollDTO,
};
use crate::entities::payroll::net_salary;
use crate::entities::{Payroll, PayrollStatus, Role};
use crate::repositories::{Create, Delete, Read, Scoped, Update};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

const WRITERS: &[Role] = &[Role::Accountant];

const EMPLOYEE_ROLES: &[Role] = &[
    Role::Admin,
    Role::Doctor,
    Role::Nurse,
    Role::Receptionist,
    Role::Accountant,
    Role::Staff,
];

fn check_period(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if start > end {
        warn!("Payroll period {} - {} is reversed", start, end);
        return Err(AppError::bad_request("period_start must not be after period_end"));
    }
    Ok(())
}

fn check_net(base_salary: f64, allowances: f64, deductions: f64) -> Result<f64, AppError> {
    net_salary(base_salary, allowances, deductions).ok_or_else(|| {
        AppError::bad_request("Net salary cannot be negative")
            .with_details("Deductions exceed base salary plus allowances")
    })
}

async fn load_visible(
    state: &AppState,
    ctx: &ClinicContext,
    payroll_id: i32,
) -> Result<Payroll, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Payroll);
    filter.ensure_visible()?;
    let entry = state
        .payroll
        .read(&(ctx.clinic_id(), payroll_id))
        .await?
        .ok_or_else(|| AppError::not_found("Payroll entry not found"))?;
    ensure_permitted(&filter, Some(entry.employee_id), "Payroll entry not found")?;
    Ok(entry)
}

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn list_payroll(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<PayrollListQuery>,
) -> Result<Json<Paginated<Payroll>>, AppError> {
    debug!("Listing payroll");
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Payroll);
    filter.ensure_visible()?;

    let page = PageRequest::new(query.page, query.limit);
    let (entries, total) = state
        .payroll
        .list(ctx.clinic_id(), &filter, &query, page)
        .await?;

    Ok(Json(Paginated::new(entries, total, page)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), employee_id = %body.employee_id))]
pub async fn create_payroll(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(body): Json<CreatePayrollDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating payroll entry");
    // 1. Ruoli ammessi: admin, accountant
    // 2. Periodo e netto coerenti
    // 3. Il dipendente deve essere un membro attivo della clinica
    require_role(&ctx, WRITERS)?;
    body.validate()?;
    check_period(body.period_start, body.period_end)?;
    check_net(body.base_salary, body.allowances, body.deductions)?;

    if !state
        .user_clinic
        .has_active_role(ctx.clinic_id(), body.employee_id, EMPLOYEE_ROLES)
        .await?
    {
        warn!("User {} is not an employee of this clinic", body.employee_id);
        return Err(AppError::bad_request("Employee must be an active member of this clinic"));
    }

    // stesso dipendente e stesso periodo -> 409 dal vincolo UNIQUE
    let entry = state
        .payroll
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!(
        "Payroll entry {} created, net {:.2}",
        entry.payroll_id, entry.net_salary
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::new(entry))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), payroll_id = %payroll_id))]
pub async fn get_payroll(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(payroll_id): Path<i32>,
) -> Result<Json<ApiResponse<Payroll>>, AppError> {
    let entry = load_visible(&state, &ctx, payroll_id).await?;
    Ok(Json(ApiResponse::new(entry)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), payroll_id = %payroll_id))]
pub async fn update_payroll(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(payroll_id): Path<i32>,
    Json(body): Json<UpdatePayrollDTO>,
) -> Result<Json<ApiResponse<Payroll>>, AppError> {
    debug!("Updating payroll entry");
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    let current = load_visible(&state, &ctx, payroll_id).await?;
    if current.status != PayrollStatus::Pending {
        return Err(AppError::bad_request("Only pending payroll entries can be edited"));
    }
    // il pagamento passa solo da PATCH /{id}/pay
    if body.status == Some(PayrollStatus::Paid) {
        return Err(AppError::bad_request("Use the pay endpoint to mark an entry as paid"));
    }

    check_period(
        body.period_start.unwrap_or(current.period_start),
        body.period_end.unwrap_or(current.period_end),
    )?;
    check_net(
        body.base_salary.unwrap_or(current.base_salary),
        body.allowances.unwrap_or(current.allowances),
        body.deductions.unwrap_or(current.deductions),
    )?;

    let entry = state
        .payroll
        .update(&(ctx.clinic_id(), payroll_id), &body)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                AppError::bad_request("Only pending payroll entries can be edited")
            }
            other => AppError::from(other),
        })?;

    info!("Payroll entry updated");
    Ok(Json(ApiResponse::new(entry)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), payroll_id = %payroll_id))]
pub async fn mark_payroll_paid(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(payroll_id): Path<i32>,
) -> Result<Json<ApiResponse<Payroll>>, AppError> {
    debug!("Marking payroll entry as paid");
    require_role(&ctx, WRITERS)?;

    let id = (ctx.clinic_id(), payroll_id);
    let paid = state.payroll.mark_paid(&id).await?;
    let entry = load_visible(&state, &ctx, payroll_id).await?;

    if !paid {
        warn!("Payroll entry {} is {:?}", payroll_id, entry.status);
        return Err(AppError::bad_request("Only pending payroll entries can be paid")
            .with_details(format!("Current status is {:?}", entry.status)));
    }

    info!("Payroll entry {} paid", payroll_id);
    Ok(Json(ApiResponse::new(entry)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), payroll_id = %payroll_id))]
pub async fn delete_payroll(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(payroll_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, WRITERS)?;
    state.payroll.delete(&(ctx.clinic_id(), payroll_id)).await?;
    info!("Payroll entry deleted");
    Ok(Json(MessageResponse::new("Payroll entry deleted")))
}
