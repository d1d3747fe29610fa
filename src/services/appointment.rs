//! Appointment services - Prenotazioni, riprogrammazioni e cambi di stato

use super::guards::{ensure_doctor, ensure_patient, ensure_permitted, resolve_doctor};
use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Query, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, AppointmentListQuery, CreateAppointmentDTO, MessageResponse, PageRequest,
    Paginated, UpdateAppointmentDTO, UpdateAppointmentStatusDTO,
};
use crate::entities::{Appointment, Role};
use crate::repositories::{Delete, Read, Scoped, SlotOutcome};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_macros::debug_handler;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

const SCHEDULERS: &[Role] = &[Role::Receptionist, Role::Nurse, Role::Doctor];

fn slot_taken(existing: i32) -> AppError {
    AppError::conflict("The doctor already has an appointment in this time slot")
        .with_details(format!("Overlapping appointment id: {}", existing))
}

fn date_out_of_range() -> AppError {
    AppError::bad_request("Date out of range")
        .with_details("The appointment would end past the last representable date")
}

/// Carica l'appuntamento verificando clinica e filtro per ruolo
async fn load_visible(
    state: &AppState,
    ctx: &ClinicContext,
    appointment_id: i32,
) -> Result<Appointment, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Appointment);
    filter.ensure_visible()?;
    let appointment = state
        .appointment
        .read(&(ctx.clinic_id(), appointment_id))
        .await?
        .ok_or_else(|| AppError::not_found("Appointment not found"))?;
    ensure_permitted(&filter, Some(appointment.doctor_id), "Appointment not found")?;
    Ok(appointment)
}

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Paginated<Appointment>>, AppError> {
    debug!("Listing appointments");
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Appointment);
    filter.ensure_visible()?;

    let page = PageRequest::new(query.page, query.limit);
    let (appointments, total) = state
        .appointment
        .list(ctx.clinic_id(), &filter, &query, page)
        .await?;

    Ok(Json(Paginated::new(appointments, total, page)))
}

#[debug_handler]
#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(mut body): Json<CreateAppointmentDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating appointment");
    // 1. Ruoli ammessi e validazione (durata 5..=480)
    // 2. Paziente della clinica corrente
    // 3. Medico: il medico stesso, oppure un medico attivo della clinica indicato nel body
    // 4. Prenotazione transazionale: se lo slot è occupato -> CONFLICT
    require_role(&ctx, SCHEDULERS)?;
    body.validate()?;

    ensure_patient(&state, ctx.clinic_id(), body.patient_id).await?;
    body.doctor_id = Some(resolve_doctor(&state, &ctx, body.doctor_id).await?);

    match state
        .appointment
        .book(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?
    {
        SlotOutcome::Booked(appointment) => {
            info!("Appointment {} booked", appointment.appointment_id);
            Ok((StatusCode::CREATED, Json(ApiResponse::new(appointment))))
        }
        SlotOutcome::Conflict(existing) => Err(slot_taken(existing)),
        SlotOutcome::OutOfRange => Err(date_out_of_range()),
    }
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), appointment_id = %appointment_id))]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(appointment_id): Path<i32>,
) -> Result<Json<ApiResponse<Appointment>>, AppError> {
    let appointment = load_visible(&state, &ctx, appointment_id).await?;
    Ok(Json(ApiResponse::new(appointment)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), appointment_id = %appointment_id))]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(appointment_id): Path<i32>,
    Json(body): Json<UpdateAppointmentDTO>,
) -> Result<Json<ApiResponse<Appointment>>, AppError> {
    debug!("Updating appointment");
    // 1. Ruoli ammessi, validazione, visibilità
    // 2. Un appuntamento chiuso non si riprogramma
    // 3. Il nuovo medico (se cambia) deve essere un medico della clinica
    // 4. Riprogrammazione transazionale con controllo sovrapposizioni (escluso sé stesso)
    require_role(&ctx, SCHEDULERS)?;
    body.validate()?;

    let current = load_visible(&state, &ctx, appointment_id).await?;
    if current.status.is_terminal() {
        warn!("Attempt to modify a closed appointment");
        return Err(AppError::bad_request("Closed appointments cannot be modified"));
    }
    if let Some(doctor_id) = body.doctor_id {
        if ctx.role() == Role::Doctor && doctor_id != ctx.user_id {
            return Err(AppError::forbidden("Doctors can only act on their own behalf"));
        }
        ensure_doctor(&state, ctx.clinic_id(), doctor_id).await?;
    }

    match state
        .appointment
        .reschedule(&(ctx.clinic_id(), appointment_id), &body)
        .await?
    {
        SlotOutcome::Booked(appointment) => {
            info!("Appointment updated");
            Ok(Json(ApiResponse::new(appointment)))
        }
        SlotOutcome::Conflict(existing) => Err(slot_taken(existing)),
        SlotOutcome::OutOfRange => Err(date_out_of_range()),
    }
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), appointment_id = %appointment_id, status = ?body.status))]
pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(appointment_id): Path<i32>,
    Json(body): Json<UpdateAppointmentStatusDTO>,
) -> Result<Json<ApiResponse<Appointment>>, AppError> {
    debug!("Changing appointment status");
    require_role(&ctx, SCHEDULERS)?;

    let current = load_visible(&state, &ctx, appointment_id).await?;
    if current.status.is_terminal() {
        warn!(
            "Appointment is {:?}, refusing transition to {:?}",
            current.status, body.status
        );
        return Err(AppError::bad_request("Appointment status can no longer change")
            .with_details(format!("Current status: {:?}", current.status)));
    }

    // lo stato viene ricontrollato nell'UPDATE: una transizione concorrente può averlo chiuso
    let appointment = state
        .appointment
        .update_status(&(ctx.clinic_id(), appointment_id), body.status)
        .await?
        .ok_or_else(|| {
            warn!("Appointment was closed concurrently");
            AppError::bad_request("Appointment status can no longer change")
        })?;

    info!("Appointment status changed to {:?}", appointment.status);
    Ok(Json(ApiResponse::new(appointment)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), appointment_id = %appointment_id))]
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(appointment_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, &[Role::Receptionist])?;

    state
        .appointment
        .delete(&(ctx.clinic_id(), appointment_id))
        .await?;

    info!("Appointment deleted");
    Ok(Json(MessageResponse::new("Appointment deleted")))
}
