//! Training services - Programmi di formazione del personale e avanzamento
//!
//! Tutti i membri vedono i programmi; solo l'admin li gestisce. Ogni utente registra il
//! proprio avanzamento e vede solo il proprio, l'admin vede quello di tutti.

use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Query, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, CreateTrainingDTO, MessageResponse, PageRequest, Paginated, TrainingListQuery,
    UpdateProgressDTO, UpdateTrainingDTO,
};
use crate::entities::{Role, Training, TrainingProgress};
use crate::repositories::{Create, Delete, ProgressOutcome, Read, Scoped, Update};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id()))]
pub async fn list_trainings(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<TrainingListQuery>,
) -> Result<Json<Paginated<Training>>, AppError> {
    debug!("Listing trainings");
    let page = PageRequest::new(query.page, query.limit);
    let (trainings, total) = state.training.list(ctx.clinic_id(), &query, page).await?;
    Ok(Json(Paginated::new(trainings, total, page)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id()))]
pub async fn create_training(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(body): Json<CreateTrainingDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating training");
    require_role(&ctx, &[Role::Admin])?;
    body.validate()?;

    let training = state
        .training
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!("Training {} created", training.training_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(training))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), training_id = %training_id))]
pub async fn get_training(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(training_id): Path<i32>,
) -> Result<Json<ApiResponse<Training>>, AppError> {
    let training = state
        .training
        .read(&(ctx.clinic_id(), training_id))
        .await?
        .ok_or_else(|| AppError::not_found("Training not found"))?;
    Ok(Json(ApiResponse::new(training)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), training_id = %training_id))]
pub async fn update_training(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(training_id): Path<i32>,
    Json(body): Json<UpdateTrainingDTO>,
) -> Result<Json<ApiResponse<Training>>, AppError> {
    require_role(&ctx, &[Role::Admin])?;
    body.validate()?;

    let training = state
        .training
        .update(&(ctx.clinic_id(), training_id), &body)
        .await?;

    info!("Training updated");
    Ok(Json(ApiResponse::new(training)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), training_id = %training_id))]
pub async fn delete_training(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(training_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, &[Role::Admin])?;
    state
        .training
        .delete(&(ctx.clinic_id(), training_id))
        .await?;
    info!("Training deleted");
    Ok(Json(MessageResponse::new("Training deleted")))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), training_id = %training_id))]
pub async fn list_training_progress(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(training_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<TrainingProgress>>>, AppError> {
    debug!("Listing training progress");
    // 1. Il programma deve essere della clinica
    // 2. L'admin vede tutti, gli altri solo il proprio avanzamento
    state
        .training
        .read(&(ctx.clinic_id(), training_id))
        .await?
        .ok_or_else(|| AppError::not_found("Training not found"))?;

    let filter = row_filter(ctx.role(), ctx.user_id, Resource::TrainingProgress);
    let progress = state
        .training
        .list_progress(ctx.clinic_id(), training_id, &filter)
        .await?;
    Ok(Json(ApiResponse::new(progress)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), training_id = %training_id))]
pub async fn update_training_progress(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(training_id): Path<i32>,
    Json(body): Json<UpdateProgressDTO>,
) -> Result<Json<ApiResponse<TrainingProgress>>, AppError> {
    debug!("Updating training progress");
    // 1. Validazione della percentuale
    // 2. Avanzamento dell'utente corrente, mai di altri
    body.validate()?;

    let outcome = state
        .training
        .record_progress(ctx.clinic_id(), training_id, ctx.user_id, body.progress_percent)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => AppError::not_found("Training not found"),
            other => other.into(),
        })?;

    match outcome {
        ProgressOutcome::Recorded(progress) => {
            info!("Training progress at {}%", progress.progress_percent);
            Ok(Json(ApiResponse::new(progress)))
        }
        ProgressOutcome::Rejected(e) => {
            warn!("Training progress rejected");
            Err(e.into())
        }
    }
}
