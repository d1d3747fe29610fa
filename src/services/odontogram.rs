//! Odontogram services - Versioni del grafico dentale e modifiche ai denti
//!
//! Le modifiche (dente, trattamenti) sono read-modify-write sul JSON dei denti: girano
//! tutte in una transazione con la riga del grafico bloccata, il riepilogo viene
//! ricalcolato prima del salvataggio.

use super::guards::{ensure_patient, ensure_permitted, resolve_doctor};
use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, CreateOdontogramDTO, CreateTreatmentDTO, UpdateTreatmentDTO, UpsertToothDTO,
};
use crate::entities::odontogram::validate_teeth;
use crate::entities::{Odontogram, OdontogramVersion, Role};
use crate::repositories::{Create, Read, Scoped};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

const WRITERS: &[Role] = &[Role::Doctor];

async fn load_visible(
    state: &AppState,
    ctx: &ClinicContext,
    odontogram_id: i32,
) -> Result<Odontogram, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Odontogram);
    filter.ensure_visible()?;
    let chart = state
        .odontogram
        .read(&(ctx.clinic_id(), odontogram_id))
        .await?
        .ok_or_else(|| AppError::not_found("Odontogram not found"))?;
    ensure_permitted(&filter, Some(chart.doctor_id), "Odontogram not found")?;
    Ok(chart)
}

/// Applica `edit` al grafico dentro una transazione: lock, controlli, ricalcolo riepilogo, salvataggio
async fn edit_chart<F>(
    state: &AppState,
    ctx: &ClinicContext,
    odontogram_id: i32,
    edit: F,
) -> Result<Odontogram, AppError>
where
    F: FnOnce(&mut Odontogram) -> Result<(), AppError>,
{
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Odontogram);
    let mut tx = state.odontogram.begin().await?;

    let mut chart = state
        .odontogram
        .read_for_update(&mut tx, &(ctx.clinic_id(), odontogram_id))
        .await?
        .ok_or_else(|| AppError::not_found("Odontogram not found"))?;
    ensure_permitted(&filter, Some(chart.doctor_id), "Odontogram not found")?;

    if !chart.is_active {
        warn!("Tried to edit inactive odontogram version {}", chart.version);
        return Err(AppError::bad_request("Only the active odontogram can be edited"));
    }

    edit(&mut chart)?;
    chart.refresh_summary(Utc::now());

    let saved = state.odontogram.save_chart(&mut tx, &chart).await?;
    tx.commit().await?;
    Ok(saved)
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), patient_id = %body.patient_id))]
pub async fn create_odontogram(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(mut body): Json<CreateOdontogramDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating odontogram version");
    // 1. Ruoli ammessi: admin, doctor
    // 2. Denti in ingresso validi per la dentizione richiesta
    // 3. Paziente della clinica e medico responsabile
    // 4. Nuova versione attiva (la precedente viene disattivata nella stessa transazione)
    require_role(&ctx, WRITERS)?;
    body.validate()?;
    validate_teeth(&body.teeth, body.dentition)?;

    ensure_patient(&state, ctx.clinic_id(), body.patient_id).await?;
    body.doctor_id = Some(resolve_doctor(&state, &ctx, body.doctor_id).await?);

    let chart = state
        .odontogram
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!(
        "Odontogram {} created as version {}",
        chart.odontogram_id, chart.version
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::new(chart))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), patient_id = %patient_id))]
pub async fn get_active_odontogram(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(patient_id): Path<i32>,
) -> Result<Json<ApiResponse<Odontogram>>, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Odontogram);
    filter.ensure_visible()?;
    ensure_patient(&state, ctx.clinic_id(), patient_id).await?;

    let chart = state
        .odontogram
        .find_active(ctx.clinic_id(), patient_id)
        .await?
        .ok_or_else(|| AppError::not_found("No active odontogram for this patient"))?;
    ensure_permitted(
        &filter,
        Some(chart.doctor_id),
        "No active odontogram for this patient",
    )?;

    Ok(Json(ApiResponse::new(chart)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), patient_id = %patient_id))]
pub async fn get_odontogram_history(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(patient_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<OdontogramVersion>>>, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::Odontogram);
    filter.ensure_visible()?;
    ensure_patient(&state, ctx.clinic_id(), patient_id).await?;

    let versions = state
        .odontogram
        .history(ctx.clinic_id(), patient_id)
        .await?
        .into_iter()
        .filter(|v| filter.permits(Some(v.doctor_id)))
        .collect();

    Ok(Json(ApiResponse::new(versions)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), odontogram_id = %odontogram_id))]
pub async fn get_odontogram(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(odontogram_id): Path<i32>,
) -> Result<Json<ApiResponse<Odontogram>>, AppError> {
    let chart = load_visible(&state, &ctx, odontogram_id).await?;
    Ok(Json(ApiResponse::new(chart)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), odontogram_id = %odontogram_id, tooth = %tooth_number))]
pub async fn upsert_tooth(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path((odontogram_id, tooth_number)): Path<(i32, u8)>,
    Json(body): Json<UpsertToothDTO>,
) -> Result<Json<ApiResponse<Odontogram>>, AppError> {
    debug!("Upserting tooth");
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    let chart = edit_chart(&state, &ctx, odontogram_id, |chart| {
        chart
            .upsert_tooth(tooth_number, body.status, body.conditions, body.notes)
            .map_err(AppError::from)
    })
    .await?;

    info!("Tooth {} updated", tooth_number);
    Ok(Json(ApiResponse::new(chart)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), odontogram_id = %odontogram_id, tooth = %tooth_number))]
pub async fn add_treatment(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path((odontogram_id, tooth_number)): Path<(i32, u8)>,
    Json(body): Json<CreateTreatmentDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Adding treatment");
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    let now = Utc::now();
    let chart = edit_chart(&state, &ctx, odontogram_id, |chart| {
        let id = chart.add_treatment(tooth_number, body.into(), now)?;
        debug!("Treatment {} added", id);
        Ok(())
    })
    .await?;

    info!("Treatment added to tooth {}", tooth_number);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(chart))))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), odontogram_id = %odontogram_id, treatment_id = %treatment_id))]
pub async fn update_treatment(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path((odontogram_id, tooth_number, treatment_id)): Path<(i32, u8, u32)>,
    Json(body): Json<UpdateTreatmentDTO>,
) -> Result<Json<ApiResponse<Odontogram>>, AppError> {
    debug!("Updating treatment");
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    let now = Utc::now();
    let chart = edit_chart(&state, &ctx, odontogram_id, |chart| {
        chart
            .update_treatment(tooth_number, treatment_id, body.into(), now)
            .map_err(AppError::from)
    })
    .await?;

    info!("Treatment {} updated", treatment_id);
    Ok(Json(ApiResponse::new(chart)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), odontogram_id = %odontogram_id))]
pub async fn activate_odontogram(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(odontogram_id): Path<i32>,
) -> Result<Json<ApiResponse<Odontogram>>, AppError> {
    debug!("Activating odontogram");
    require_role(&ctx, WRITERS)?;
    let chart = load_visible(&state, &ctx, odontogram_id).await?;
    if chart.is_active {
        return Ok(Json(ApiResponse::new(chart)));
    }

    let chart = state
        .odontogram
        .activate(&(ctx.clinic_id(), odontogram_id))
        .await?;

    info!("Odontogram version {} activated", chart.version);
    Ok(Json(ApiResponse::new(chart)))
}
