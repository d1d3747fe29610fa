//! Expense services - Spese della clinica (admin, accountant)

use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Query, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, CreateExpenseDTO, ExpenseListQuery, MessageResponse, PageRequest, Paginated,
    UpdateExpenseDTO,
};
use crate::entities::{Expense, Role};
use crate::repositories::{Create, Delete, Read, Scoped, Update};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use validator::Validate;

const WRITERS: &[Role] = &[Role::Accountant];

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id()))]
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<ExpenseListQuery>,
) -> Result<Json<Paginated<Expense>>, AppError> {
    debug!("Listing expenses");
    row_filter(ctx.role(), ctx.user_id, Resource::Expense).ensure_visible()?;

    let page = PageRequest::new(query.page, query.limit);
    let (expenses, total) = state.expense.list(ctx.clinic_id(), &query, page).await?;
    Ok(Json(Paginated::new(expenses, total, page)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id()))]
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(body): Json<CreateExpenseDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating expense");
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    let expense = state
        .expense
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!("Expense {} created", expense.expense_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(expense))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), expense_id = %expense_id))]
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(expense_id): Path<i32>,
) -> Result<Json<ApiResponse<Expense>>, AppError> {
    require_role(&ctx, WRITERS)?;
    let expense = state
        .expense
        .read(&(ctx.clinic_id(), expense_id))
        .await?
        .ok_or_else(|| AppError::not_found("Expense not found"))?;
    Ok(Json(ApiResponse::new(expense)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), expense_id = %expense_id))]
pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(expense_id): Path<i32>,
    Json(body): Json<UpdateExpenseDTO>,
) -> Result<Json<ApiResponse<Expense>>, AppError> {
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    let expense = state
        .expense
        .update(&(ctx.clinic_id(), expense_id), &body)
        .await?;

    info!("Expense updated");
    Ok(Json(ApiResponse::new(expense)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), expense_id = %expense_id))]
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(expense_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, WRITERS)?;
    state.expense.delete(&(ctx.clinic_id(), expense_id)).await?;
    info!("Expense deleted");
    Ok(Json(MessageResponse::new("Expense deleted")))
}
