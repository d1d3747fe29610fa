//! Prescription services - Prescrizioni farmacologiche

use super::guards::{ensure_appointment, ensure_patient, ensure_permitted, resolve_doctor};
use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Query, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, CreatePrescriptionDTO, PrescriptionListQuery, MessageResponse, PageRequest, Paginated,
    UpdatePrescriptionDTO,
};
use crate::entities::{Prescription, Role};
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

const WRITERS: &[Role] = &[Role::Doctor];

async fn load_visible(
    state: &AppState,
    ctx: &ClinicContext,
    prescription_id: i32,
) -> Result<Prescription, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Prescription);
    filter.ensure_visible()?;
    let prescription = state
        .prescription
        .read(&(ctx.clinic_id(), prescription_id))
        .await?
        .ok_or_else(|| AppError::not_found("Prescription not found"))?;
    ensure_permitted(&filter, Some(prescription.doctor_id), "Prescription not found")?;
    Ok(prescription)
}

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn list_prescriptions(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<PrescriptionListQuery>,
) -> Result<Json<Paginated<Prescription>>, AppError> {
    debug!("Listing prescriptions");
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Prescription);
    filter.ensure_visible()?;

    let page = PageRequest::new(query.page, query.limit);
    let (prescriptions, total) = state
        .prescription
        .list(ctx.clinic_id(), &filter, &query, page)
        .await?;

    Ok(Json(Paginated::new(prescriptions, total, page)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), patient_id = %body.patient_id))]
pub async fn create_prescription(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(mut body): Json<CreatePrescriptionDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating prescription");
    // 1. Ruoli ammessi e validazione
    // 2. Paziente (e appuntamento, se indicato) della clinica corrente
    // 3. Medico responsabile (il medico prescrive a proprio nome)
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    ensure_patient(&state, ctx.clinic_id(), body.patient_id).await?;
    ensure_appointment(&state, ctx.clinic_id(), body.patient_id, body.appointment_id).await?;
    body.doctor_id = Some(resolve_doctor(&state, &ctx, body.doctor_id).await?);

    let prescription = state
        .prescription
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!("Prescription {} created", prescription.prescription_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(prescription))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), prescription_id = %prescription_id))]
pub async fn get_prescription(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(prescription_id): Path<i32>,
) -> Result<Json<ApiResponse<Prescription>>, AppError> {
    let prescription = load_visible(&state, &ctx, prescription_id).await?;
    Ok(Json(ApiResponse::new(prescription)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), prescription_id = %prescription_id))]
pub async fn update_prescription(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(prescription_id): Path<i32>,
    Json(body): Json<UpdatePrescriptionDTO>,
) -> Result<Json<ApiResponse<Prescription>>, AppError> {
    debug!("Updating prescription");
    require_role(&ctx, WRITERS)?;
    body.validate()?;
    load_visible(&state, &ctx, prescription_id).await?;

    let prescription = state
        .prescription
        .update(&(ctx.clinic_id(), prescription_id), &body)
        .await?;

    info!("Prescription updated");
    Ok(Json(ApiResponse::new(prescription)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), prescription_id = %prescription_id))]
pub async fn delete_prescription(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(prescription_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, WRITERS)?;
    load_visible(&state, &ctx, prescription_id).await?;

    state.prescription.delete(&(ctx.clinic_id(), prescription_id)).await?;
    info!("Prescription deleted");
    Ok(Json(MessageResponse::new("Prescription deleted")))
}
