//! Medical record services - Cartelle cliniche delle visite

use super::guards::{ensure_appointment, ensure_patient, ensure_permitted, resolve_doctor};
use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Query, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, CreateMedicalRecordDTO, MedicalRecordListQuery, MessageResponse, PageRequest, Paginated,
    UpdateMedicalRecordDTO,
};
use crate::entities::{MedicalRecord, Role};
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

const WRITERS: &[Role] = &[Role::Doctor, Role::Nurse];

async fn load_visible(
    state: &AppState,
    ctx: &ClinicContext,
    record_id: i32,
) -> Result<MedicalRecord, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::MedicalRecord);
    filter.ensure_visible()?;
    let record = state
        .medical_record
        .read(&(ctx.clinic_id(), record_id))
        .await?
        .ok_or_else(|| AppError::not_found("Medical record not found"))?;
    ensure_permitted(&filter, Some(record.doctor_id), "Medical record not found")?;
    Ok(record)
}

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn list_medical_records(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<MedicalRecordListQuery>,
) -> Result<Json<Paginated<MedicalRecord>>, AppError> {
    debug!("Listing medical records");
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::MedicalRecord);
    filter.ensure_visible()?;

    let page = PageRequest::new(query.page, query.limit);
    let (medical_records, total) = state
        .medical_record
        .list(ctx.clinic_id(), &filter, &query, page)
        .await?;

    Ok(Json(Paginated::new(medical_records, total, page)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), patient_id = %body.patient_id))]
pub async fn create_medical_record(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(mut body): Json<CreateMedicalRecordDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating medical record");
    // 1. Ruoli ammessi e validazione
    // 2. Paziente (e appuntamento, se indicato) della clinica corrente
    // 3. Medico responsabile (un infermiere deve indicare il medico)
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    ensure_patient(&state, ctx.clinic_id(), body.patient_id).await?;
    ensure_appointment(&state, ctx.clinic_id(), body.patient_id, body.appointment_id).await?;
    body.doctor_id = Some(resolve_doctor(&state, &ctx, body.doctor_id).await?);

    let record = state
        .medical_record
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!("Medical record {} created", record.record_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(record))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), record_id = %record_id))]
pub async fn get_medical_record(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(record_id): Path<i32>,
) -> Result<Json<ApiResponse<MedicalRecord>>, AppError> {
    let record = load_visible(&state, &ctx, record_id).await?;
    Ok(Json(ApiResponse::new(record)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), record_id = %record_id))]
pub async fn update_medical_record(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(record_id): Path<i32>,
    Json(body): Json<UpdateMedicalRecordDTO>,
) -> Result<Json<ApiResponse<MedicalRecord>>, AppError> {
    debug!("Updating medical record");
    require_role(&ctx, WRITERS)?;
    body.validate()?;
    load_visible(&state, &ctx, record_id).await?;

    let record = state
        .medical_record
        .update(&(ctx.clinic_id(), record_id), &body)
        .await?;

    info!("Medical record updated");
    Ok(Json(ApiResponse::new(record)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), record_id = %record_id))]
pub async fn delete_medical_record(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(record_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, WRITERS)?;
    load_visible(&state, &ctx, record_id).await?;

    state.medical_record.delete(&(ctx.clinic_id(), record_id)).await?;
    info!("Medical record deleted");
    Ok(Json(MessageResponse::new("Medical record deleted")))
}
