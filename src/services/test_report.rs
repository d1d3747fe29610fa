//! Test report services - Referti di laboratorio

use super::guards::{ensure_patient, ensure_permitted, resolve_doctor};
use crate::core::{
    AppError, AppState, ClinicContext, Json, Path, Query, Resource, require_role, row_filter,
};
use crate::dtos::{
    ApiResponse, CreateTestReportDTO, TestReportListQuery, MessageResponse, PageRequest, Paginated,
    UpdateTestReportDTO, TestReportDTO,
};
use crate::entities::{TestReport, Role};
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
    report_id: i32,
) -> Result<TestReport, AppError> {
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::TestReport);
    filter.ensure_visible()?;
    let report = state
        .test_report
        .read(&(ctx.clinic_id(), report_id))
        .await?
        .ok_or_else(|| AppError::not_found("Test report not found"))?;
    ensure_permitted(&filter, Some(report.doctor_id), "Test report not found")?;
    Ok(report)
}

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn list_test_reports(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<TestReportListQuery>,
) -> Result<Json<Paginated<TestReportDTO>>, AppError> {
    debug!("Listing test reports");
    let filter = row_filter(ctx.role(), ctx.user_id, Resource::TestReport);
    filter.ensure_visible()?;

    let page = PageRequest::new(query.page, query.limit);
    let (test_reports, total) = state
        .test_report
        .list(ctx.clinic_id(), &filter, &query, page)
        .await?;

    Ok(Json(Paginated::new(test_reports, total, page).map(TestReportDTO::from)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), patient_id = %body.patient_id))]
pub async fn create_test_report(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(mut body): Json<CreateTestReportDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating test report");
    // 1. Ruoli ammessi e validazione
    // 2. Paziente della clinica corrente
    // 3. Medico responsabile (chi non è medico deve indicarlo)
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    ensure_patient(&state, ctx.clinic_id(), body.patient_id).await?;
    body.doctor_id = Some(resolve_doctor(&state, &ctx, body.doctor_id).await?);

    let report = state
        .test_report
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!("Test report {} created", report.report_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(TestReportDTO::from(report)))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), report_id = %report_id))]
pub async fn get_test_report(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(report_id): Path<i32>,
) -> Result<Json<ApiResponse<TestReportDTO>>, AppError> {
    let report = load_visible(&state, &ctx, report_id).await?;
    Ok(Json(ApiResponse::new(TestReportDTO::from(report))))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), report_id = %report_id))]
pub async fn update_test_report(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(report_id): Path<i32>,
    Json(body): Json<UpdateTestReportDTO>,
) -> Result<Json<ApiResponse<TestReportDTO>>, AppError> {
    debug!("Updating test report");
    require_role(&ctx, WRITERS)?;
    body.validate()?;
    load_visible(&state, &ctx, report_id).await?;

    let report = state
        .test_report
        .update(&(ctx.clinic_id(), report_id), &body)
        .await?;

    info!("Test report updated");
    Ok(Json(ApiResponse::new(TestReportDTO::from(report))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), report_id = %report_id))]
pub async fn delete_test_report(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(report_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, WRITERS)?;
    load_visible(&state, &ctx, report_id).await?;

    state.test_report.delete(&(ctx.clinic_id(), report_id)).await?;
    info!("Test report deleted");
    Ok(Json(MessageResponse::new("Test report deleted")))
}
