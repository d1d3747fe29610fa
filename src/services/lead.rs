//! Lead services - Contatti commerciali e conversione in pazienti

use super::guards::{ensure_doctor, ensure_permitted};
use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Query, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, ConvertLeadDTO, CreateLeadDTO, LeadListQuery, MessageResponse, PageRequest,
    Paginated, UpdateLeadDTO,
};
use crate::entities::{Lead, LeadStatus, Patient, Role};
use crate::repositories::{ConversionOutcome, Create, Delete, Read, Scoped, Update};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

const WRITERS: &[Role] = &[Role::Receptionist];

const ASSIGNABLE: &[Role] = &[
    Role::Admin,
    Role::Doctor,
    Role::Nurse,
    Role::Receptionist,
    Role::Accountant,
    Role::Staff,
];

/// Lead convertito insieme al paziente appena creato
#[derive(Serialize, Debug)]
pub struct ConversionDTO {
    pub lead: Lead,
    pub patient: Patient,
}

async fn ensure_assignee(state: &AppState, clinic_id: i32, user_id: i32) -> Result<(), AppError> {
    if state
        .user_clinic
        .has_active_role(clinic_id, user_id, ASSIGNABLE)
        .await?
    {
        Ok(())
    } else {
        warn!("User {} cannot be assigned leads in clinic {}", user_id, clinic_id);
        Err(AppError::bad_request("assigned_to must be an active member of this clinic"))
    }
}

async fn load_visible(state: &AppState, ctx: &ClinicContext, lead_id: i32) -> Result<Lead, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Lead);
    filter.ensure_visible()?;
    let lead = state
        .lead
        .read(&(ctx.clinic_id(), lead_id))
        .await?
        .ok_or_else(|| AppError::not_found("Lead not found"))?;
    ensure_permitted(&filter, lead.assigned_to, "Lead not found")?;
    Ok(lead)
}

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<LeadListQuery>,
) -> Result<Json<Paginated<Lead>>, AppError> {
    debug!("Listing leads");
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Lead);
    filter.ensure_visible()?;

    let page = PageRequest::new(query.page, query.limit);
    let (leads, total) = state
        .lead
        .list(ctx.clinic_id(), &filter, &query, page)
        .await?;

    Ok(Json(Paginated::new(leads, total, page)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id()))]
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(body): Json<CreateLeadDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating lead");
    require_role(&ctx, WRITERS)?;
    body.validate()?;
    if let Some(user_id) = body.assigned_to {
        ensure_assignee(&state, ctx.clinic_id(), user_id).await?;
    }

    let lead = state
        .lead
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!("Lead {} created", lead.lead_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(lead))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), lead_id = %lead_id))]
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(lead_id): Path<i32>,
) -> Result<Json<ApiResponse<Lead>>, AppError> {
    let lead = load_visible(&state, &ctx, lead_id).await?;
    Ok(Json(ApiResponse::new(lead)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), lead_id = %lead_id))]
pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(lead_id): Path<i32>,
    Json(body): Json<UpdateLeadDTO>,
) -> Result<Json<ApiResponse<Lead>>, AppError> {
    debug!("Updating lead");
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    let current = load_visible(&state, &ctx, lead_id).await?;
    // lo stato converted si raggiunge solo tramite la conversione
    if body.status == Some(LeadStatus::Converted) {
        return Err(AppError::bad_request("Use the convert endpoint to convert a lead"));
    }
    if current.status == LeadStatus::Converted && body.status.is_some() {
        return Err(AppError::bad_request("A converted lead cannot change status"));
    }
    if let Some(user_id) = body.assigned_to {
        ensure_assignee(&state, ctx.clinic_id(), user_id).await?;
    }

    let lead = state.lead.update(&(ctx.clinic_id(), lead_id), &body).await?;

    info!("Lead updated");
    Ok(Json(ApiResponse::new(lead)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), lead_id = %lead_id))]
pub async fn convert_lead(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(lead_id): Path<i32>,
    Json(body): Json<ConvertLeadDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Converting lead");
    // 1. Ruoli ammessi: admin, receptionist
    // 2. Il medico curante, se indicato, deve essere un medico della clinica
    // 3. Conversione transazionale: una seconda conversione risponde 409
    require_role(&ctx, WRITERS)?;
    load_visible(&state, &ctx, lead_id).await?;
    if let Some(doctor_id) = body.assigned_doctor_id {
        ensure_doctor(&state, ctx.clinic_id(), doctor_id).await?;
    }

    match state.lead.convert(&(ctx.clinic_id(), lead_id), &body).await? {
        ConversionOutcome::Converted { lead, patient_id } => {
            let patient = state
                .patient
                .read(&(ctx.clinic_id(), patient_id))
                .await?
                .ok_or_else(|| AppError::internal_server_error("Converted patient not found"))?;

            info!("Lead {} converted into patient {}", lead_id, patient_id);
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::new(ConversionDTO { lead, patient })),
            ))
        }
        ConversionOutcome::AlreadyConverted { patient_id } => {
            warn!("Lead {} already converted", lead_id);
            let err = AppError::conflict("Lead already converted");
            Err(match patient_id {
                Some(id) => err.with_details(format!("Patient id {}", id)),
                None => err,
            })
        }
    }
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), lead_id = %lead_id))]
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(lead_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, WRITERS)?;
    state.lead.delete(&(ctx.clinic_id(), lead_id)).await?;
    info!("Lead deleted");
    Ok(Json(MessageResponse::new("Lead deleted")))
}
