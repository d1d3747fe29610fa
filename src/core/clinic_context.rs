//! Clinic context - Risoluzione del tenant (clinica) per ogni richiesta
//!
//! Il middleware va montato DOPO `authentication_middleware` (quindi come layer più interno):
//! ha bisogno dell'utente corrente nelle Extension.

use crate::core::{AppError, AppState};
use crate::entities::{Clinic, Role, User, UserClinic};
use crate::repositories::Read;
use axum::extract::State;
use axum::{body::Body, extract::Request, http::Response, middleware::Next};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const CLINIC_HEADER: &str = "x-clinic-id";

/// Contesto tenant della richiesta, disponibile agli handler come `Extension<ClinicContext>`
#[derive(Debug, Clone)]
pub struct ClinicContext {
    pub user_id: i32,
    pub clinic: Clinic,
    pub membership: UserClinic,
}

impl ClinicContext {
    pub fn clinic_id(&self) -> i32 {
        self.clinic.clinic_id
    }

    /// Ruolo effettivo nella clinica
    pub fn role(&self) -> Role {
        self.membership.role.in_clinic()
    }

    pub fn is_owner(&self) -> bool {
        self.clinic.owner_id == self.user_id
    }
}

/// Decide se un utente senza membership può riceverne una automaticamente, e con quale ruolo
pub fn auto_provision_role(user: &User, clinic: &Clinic) -> Option<Role> {
    if user.role == Role::SuperAdmin || clinic.owner_id == user.user_id {
        Some(Role::Admin)
    } else if user.default_clinic_id == Some(clinic.clinic_id) {
        Some(user.role.in_clinic())
    } else {
        None
    }
}

/// Legge l'id clinica dall'header; `Ok(None)` se l'header manca
fn clinic_id_from_header(req: &Request) -> Result<Option<i32>, AppError> {
    match req.headers().get(CLINIC_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .filter(|id| *id > 0)
            .map(Some)
            .ok_or_else(|| {
                warn!("Invalid {} header", CLINIC_HEADER);
                AppError::bad_request("Invalid clinic id header")
            }),
    }
}

#[instrument(skip(state, req, next))]
pub async fn clinic_context_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running clinic context middleware");
    // 1. Utente corrente (inserito dall'authentication_middleware)
    let current_user = req
        .extensions()
        .get::<User>()
        .ok_or_else(|| {
            warn!("User not found in request extensions");
            AppError::unauthorized("User not authenticated")
        })?
        .clone();

    // 2. Id clinica: header esplicito, altrimenti clinica di default dell'utente
    let clinic_id = match clinic_id_from_header(&req)? {
        Some(id) => id,
        None => current_user.default_clinic_id.ok_or_else(|| {
            warn!("No clinic context for user {}", current_user.user_id);
            AppError::bad_request("Clinic context required")
        })?,
    };

    // 3. La clinica deve esistere ed essere attiva
    let clinic = state.clinic.read(&clinic_id).await?.ok_or_else(|| {
        warn!("Clinic {} not found", clinic_id);
        AppError::not_found("Clinic not found")
    })?;
    if !clinic.is_active {
        warn!("Clinic {} is inactive", clinic_id);
        return Err(AppError::forbidden("Clinic is inactive"));
    }

    // 4. Membership esistente o provisioning automatico
    let membership = match state
        .user_clinic
        .read(&(current_user.user_id, clinic_id))
        .await?
    {
        Some(m) if m.is_active => m,
        Some(_) => {
            warn!(
                "Membership of user {} in clinic {} is disabled",
                current_user.user_id, clinic_id
            );
            return Err(AppError::forbidden("Your access to this clinic is disabled"));
        }
        None => {
            let role = auto_provision_role(&current_user, &clinic).ok_or_else(|| {
                warn!(
                    "User {} has no access to clinic {}",
                    current_user.user_id, clinic_id
                );
                AppError::forbidden("You do not have access to this clinic")
            })?;

            info!(
                "Auto-provisioning membership for user {} in clinic {} as {:?}",
                current_user.user_id, clinic_id, role
            );
            state
                .user_clinic
                .ensure_membership(current_user.user_id, clinic_id, role)
                .await?
        }
    };

    debug!(
        "Clinic context resolved: clinic {} role {:?}",
        clinic_id, membership.role
    );
    req.extensions_mut().insert(ClinicContext {
        user_id: current_user.user_id,
        clinic,
        membership,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(user_id: i32, role: Role, default_clinic_id: Option<i32>) -> User {
        User {
            user_id,
            name: "Test".to_string(),
            email: format!("user{}@example.com", user_id),
            password: String::new(),
            role,
            phone: None,
            default_clinic_id,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn clinic(clinic_id: i32, owner_id: i32) -> Clinic {
        Clinic {
            clinic_id,
            name: "Dental Care".to_string(),
            code: "DENTAL".to_string(),
            address: None,
            phone: None,
            email: None,
            owner_id,
            currency: "EUR".to_string(),
            timezone: "Europe/Rome".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_is_provisioned_as_admin() {
        let owner = user(1, Role::Doctor, None);
        assert_eq!(auto_provision_role(&owner, &clinic(10, 1)), Some(Role::Admin));
    }

    #[test]
    fn super_admin_is_provisioned_as_admin_anywhere() {
        let root = user(2, Role::SuperAdmin, None);
        assert_eq!(auto_provision_role(&root, &clinic(10, 1)), Some(Role::Admin));
    }

    #[test]
    fn default_clinic_keeps_global_role() {
        let nurse = user(3, Role::Nurse, Some(10));
        assert_eq!(auto_provision_role(&nurse, &clinic(10, 1)), Some(Role::Nurse));
    }

    #[test]
    fn strangers_are_not_provisioned() {
        let doctor = user(4, Role::Doctor, Some(11));
        assert_eq!(auto_provision_role(&doctor, &clinic(10, 1)), None);
    }
}
