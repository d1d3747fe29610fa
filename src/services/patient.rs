//! Patient services - Anagrafica pazienti della clinica corrente

use super::guards::{ensure_doctor, ensure_permitted};
use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Query, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, CreatePatientDTO, MessageResponse, PageRequest, Paginated, PatientListQuery,
    UpdatePatientDTO,
};
use crate::entities::{Patient, Role};
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

const WRITERS: &[Role] = &[Role::Receptionist, Role::Nurse, Role::Doctor];

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<Paginated<Patient>>, AppError> {
    debug!("Listing patients");
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Patient);
    filter.ensure_visible()?;

    let page = PageRequest::new(query.page, query.limit);
    let (patients, total) = state
        .patient
        .list(ctx.clinic_id(), &filter, &query, page)
        .await?;

    Ok(Json(Paginated::new(patients, total, page)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(mut body): Json<CreatePatientDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating patient");
    // 1. Ruoli ammessi: admin, receptionist, nurse, doctor
    // 2. Validazione del body
    // 3. Un medico che non indica il medico curante lo diventa lui
    // 4. Il medico curante indicato deve essere un medico attivo della clinica
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    if body.assigned_doctor_id.is_none() && ctx.role() == Role::Doctor {
        body.assigned_doctor_id = Some(ctx.user_id);
    }
    if let Some(doctor_id) = body.assigned_doctor_id {
        ensure_doctor(&state, ctx.clinic_id(), doctor_id).await?;
    }

    let patient = state
        .patient
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!("Patient {} created", patient.patient_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(patient))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), patient_id = %patient_id))]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(patient_id): Path<i32>,
) -> Result<Json<ApiResponse<Patient>>, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Patient);
    filter.ensure_visible()?;

    let patient = state
        .patient
        .read(&(ctx.clinic_id(), patient_id))
        .await?
        .ok_or_else(|| AppError::not_found("Patient not found"))?;
    ensure_permitted(&filter, patient.assigned_doctor_id, "Patient not found")?;

    Ok(Json(ApiResponse::new(patient)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), patient_id = %patient_id))]
pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(patient_id): Path<i32>,
    Json(body): Json<UpdatePatientDTO>,
) -> Result<Json<ApiResponse<Patient>>, AppError> {
    debug!("Updating patient");
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    let id = (ctx.clinic_id(), patient_id);
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Patient);
    let current = state
        .patient
        .read(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Patient not found"))?;
    ensure_permitted(&filter, current.assigned_doctor_id, "Patient not found")?;

    if let Some(doctor_id) = body.assigned_doctor_id {
        ensure_doctor(&state, ctx.clinic_id(), doctor_id).await?;
    }

    let patient = state.patient.update(&id, &body).await?;
    info!("Patient updated");
    Ok(Json(ApiResponse::new(patient)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), patient_id = %patient_id))]
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(patient_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    debug!("Deleting patient");
    // 1. Solo admin
    // 2. Il paziente deve esistere nella clinica
    // 3. Un paziente con fatture non si cancella (anche la FK lo impedisce)
    require_role(&ctx, &[Role::Admin])?;

    let id = (ctx.clinic_id(), patient_id);
    if state.patient.read(&id).await?.is_none() {
        return Err(AppError::not_found("Patient not found"));
    }

    let invoices = state.patient.count_invoices(id.0, id.1).await?;
    if invoices > 0 {
        warn!("Patient has {} invoices, refusing delete", invoices);
        return Err(AppError::conflict("Patient has invoices and cannot be deleted"));
    }

    state.patient.delete(&id).await?;
    info!("Patient deleted");
    Ok(Json(MessageResponse::new("Patient deleted")))
}
