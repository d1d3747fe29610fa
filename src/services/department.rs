//! Department services - Reparti della clinica (lettura per tutti i membri, modifica admin)

use crate::core::{AppError, AppState, ClinicContext, Json, Path, require_role};
use crate::dtos::{ApiResponse, CreateDepartmentDTO, MessageResponse, UpdateDepartmentDTO};
use crate::entities::{Department, Role};
use crate::repositories::{Create, Delete, Read, Scoped, Update};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Il responsabile deve essere un membro attivo della clinica
async fn ensure_head(state: &AppState, clinic_id: i32, head_id: i32) -> Result<(), AppError> {
    let membership = state.user_clinic.read(&(head_id, clinic_id)).await?;
    if membership.is_some_and(|m| m.is_active) {
        Ok(())
    } else {
        warn!("User {} is not an active member of clinic {}", head_id, clinic_id);
        Err(AppError::bad_request("head_id must be an active member of this clinic"))
    }
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id()))]
pub async fn list_departments(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
) -> Result<Json<ApiResponse<Vec<Department>>>, AppError> {
    debug!("Listing departments");
    let departments = state.department.list(ctx.clinic_id()).await?;
    Ok(Json(ApiResponse::new(departments)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id()))]
pub async fn create_department(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(body): Json<CreateDepartmentDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating department");
    // 1. Solo admin
    // 2. Validazione del body
    // 3. Il responsabile (se indicato) è un membro attivo
    require_role(&ctx, &[Role::Admin])?;
    body.validate()?;

    if let Some(head_id) = body.head_id {
        ensure_head(&state, ctx.clinic_id(), head_id).await?;
    }

    let department = state
        .department
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!("Department {} created", department.department_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(department))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), department_id = %department_id))]
pub async fn get_department(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(department_id): Path<i32>,
) -> Result<Json<ApiResponse<Department>>, AppError> {
    let department = state
        .department
        .read(&(ctx.clinic_id(), department_id))
        .await?
        .ok_or_else(|| AppError::not_found("Department not found"))?;
    Ok(Json(ApiResponse::new(department)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), department_id = %department_id))]
pub async fn update_department(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(department_id): Path<i32>,
    Json(body): Json<UpdateDepartmentDTO>,
) -> Result<Json<ApiResponse<Department>>, AppError> {
    require_role(&ctx, &[Role::Admin])?;
    body.validate()?;

    if let Some(head_id) = body.head_id {
        ensure_head(&state, ctx.clinic_id(), head_id).await?;
    }

    let department = state
        .department
        .update(&(ctx.clinic_id(), department_id), &body)
        .await?;

    info!("Department updated");
    Ok(Json(ApiResponse::new(department)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), department_id = %department_id))]
pub async fn delete_department(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(department_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, &[Role::Admin])?;
    state
        .department
        .delete(&(ctx.clinic_id(), department_id))
        .await?;
    info!("Department deleted");
    Ok(Json(MessageResponse::new("Department deleted")))
}
