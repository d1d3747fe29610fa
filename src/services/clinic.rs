//! Clinic services - Cliniche dell'utente e gestione dei membri della clinica corrente

use crate::core::{AppError, AppState, ClinicContext, Json, Path, require_role};
use crate::dtos::{
    AddMemberDTO, ApiResponse, CreateClinicDTO, MembershipDTO, MessageResponse, UpdateClinicDTO,
    UpdateMemberDTO,
};
use crate::entities::{Clinic, ClinicMember, Role, User, UserClinic};
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

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn create_clinic(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<CreateClinicDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating clinic");
    // 1. Validare il DTO (codice maiuscolo, valuta ISO)
    // 2. Creare clinica + membership admin del creatore in un'unica transazione
    //    (il codice duplicato arriva come violazione di unicità -> 409)
    body.validate()?;

    let clinic = state
        .clinic
        .create(&Scoped::new(0, current_user.user_id, body))
        .await?;

    info!("Clinic {} created", clinic.clinic_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(clinic))))
}

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_my_clinics(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<ApiResponse<Vec<MembershipDTO>>>, AppError> {
    let user_id = current_user.user_id;
    let clinics = state
        .user_clinic
        .list_for_user(user_id)
        .await?
        .into_iter()
        .map(|m| MembershipDTO::from_membership(m, user_id))
        .collect::<Vec<_>>();

    debug!("User belongs to {} clinics", clinics.len());
    Ok(Json(ApiResponse::new(clinics)))
}

#[instrument(skip(ctx), fields(clinic_id = %ctx.clinic_id()))]
pub async fn get_current_clinic(
    Extension(ctx): Extension<ClinicContext>,
) -> Result<Json<ApiResponse<Clinic>>, AppError> {
    require_role(&ctx, &[Role::Admin])?;
    Ok(Json(ApiResponse::new(ctx.clinic)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id()))]
pub async fn update_current_clinic(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(body): Json<UpdateClinicDTO>,
) -> Result<Json<ApiResponse<Clinic>>, AppError> {
    debug!("Updating current clinic");
    require_role(&ctx, &[Role::Admin])?;
    body.validate()?;

    let clinic = state.clinic.update(&ctx.clinic_id(), &body).await?;
    info!("Clinic updated");
    Ok(Json(ApiResponse::new(clinic)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id()))]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
) -> Result<Json<ApiResponse<Vec<ClinicMember>>>, AppError> {
    require_role(&ctx, &[Role::Admin])?;
    let members = state.user_clinic.list_members(ctx.clinic_id()).await?;
    Ok(Json(ApiResponse::new(members)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), role = ?body.role))]
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(body): Json<AddMemberDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Adding member to clinic");
    // 1. Solo admin; il ruolo super_admin non è assegnabile in una clinica
    // 2. L'utente deve esistere (ricerca per email)
    // 3. Già membro -> CONFLICT
    // 4. Permessi espliciti o default del ruolo
    require_role(&ctx, &[Role::Admin])?;
    body.validate()?;

    if body.role == Role::SuperAdmin {
        warn!("Attempt to assign super_admin inside a clinic");
        return Err(AppError::bad_request("Role super_admin cannot be assigned"));
    }

    let user = state.user.find_by_email(&body.email).await?.ok_or_else(|| {
        warn!("No user with the given email");
        AppError::not_found("User not found")
    })?;

    if state
        .user_clinic
        .read(&(user.user_id, ctx.clinic_id()))
        .await?
        .is_some()
    {
        warn!("User {} is already a member", user.user_id);
        return Err(AppError::conflict("User is already a member of this clinic"));
    }

    let permissions = body
        .permissions
        .unwrap_or_else(|| body.role.default_permissions());
    let membership = state
        .user_clinic
        .add_member(user.user_id, ctx.clinic_id(), body.role, permissions)
        .await?;

    info!("User {} added as {:?}", user.user_id, membership.role);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(membership))))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), member_id = %user_id))]
pub async fn update_member(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(user_id): Path<i32>,
    Json(body): Json<UpdateMemberDTO>,
) -> Result<Json<ApiResponse<UserClinic>>, AppError> {
    debug!("Updating clinic member");
    // 1. Solo admin
    // 2. super_admin non assegnabile
    // 3. Il proprietario della clinica resta admin attivo
    // 4. Il reparto (se indicato) deve essere della clinica corrente
    require_role(&ctx, &[Role::Admin])?;

    if body.role == Some(Role::SuperAdmin) {
        return Err(AppError::bad_request("Role super_admin cannot be assigned"));
    }

    if user_id == ctx.clinic.owner_id {
        let demoted = body.role.is_some_and(|r| r != Role::Admin);
        let deactivated = body.is_active == Some(false);
        if demoted || deactivated {
            warn!("Attempt to demote or deactivate the clinic owner");
            return Err(AppError::bad_request(
                "The clinic owner cannot be demoted or deactivated",
            ));
        }
    }

    if let Some(Some(department_id)) = body.department_id {
        state
            .department
            .read(&(ctx.clinic_id(), department_id))
            .await?
            .ok_or_else(|| {
                warn!("Department {} not found in clinic", department_id);
                AppError::bad_request("department_id must refer to a department of this clinic")
            })?;
    }

    let membership = state
        .user_clinic
        .update(&(user_id, ctx.clinic_id()), &body)
        .await?;

    info!("Member updated");
    Ok(Json(ApiResponse::new(membership)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), member_id = %user_id))]
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(user_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, &[Role::Admin])?;

    if user_id == ctx.clinic.owner_id {
        warn!("Attempt to remove the clinic owner");
        return Err(AppError::bad_request("The clinic owner cannot be removed"));
    }

    state.user_clinic.delete(&(user_id, ctx.clinic_id())).await?;
    info!("Member removed");
    Ok(Json(MessageResponse::new("Member removed")))
}
