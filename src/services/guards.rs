//! Guards - Controlli condivisi dagli handler: visibilità per ruolo, appartenenza alla clinica

use crate::core::{AppError, AppState, ClinicContext, RowFilter};
use crate::entities::{Patient, Role};
use crate::repositories::Read;
use tracing::warn;

/// Una riga fuori dal filtro del ruolo viene trattata come inesistente
pub(crate) fn ensure_permitted(
    filter: &RowFilter,
    owner: Option<i32>,
    not_found: &'static str,
) -> Result<(), AppError> {
    filter.ensure_visible()?;
    if filter.permits(owner) {
        Ok(())
    } else {
        warn!("Row outside the role filter");
        Err(AppError::not_found(not_found))
    }
}

/// Il paziente deve appartenere alla clinica corrente
pub(crate) async fn ensure_patient(
    state: &AppState,
    clinic_id: i32,
    patient_id: i32,
) -> Result<Patient, AppError> {
    state
        .patient
        .read(&(clinic_id, patient_id))
        .await?
        .ok_or_else(|| {
            warn!("Patient {} not found in clinic {}", patient_id, clinic_id);
            AppError::not_found("Patient not found")
        })
}

/// `doctor_id` deve essere un membro attivo della clinica con ruolo doctor
pub(crate) async fn ensure_doctor(
    state: &AppState,
    clinic_id: i32,
    doctor_id: i32,
) -> Result<(), AppError> {
    if state
        .user_clinic
        .has_active_role(clinic_id, doctor_id, &[Role::Doctor])
        .await?
    {
        Ok(())
    } else {
        warn!("User {} is not a doctor of clinic {}", doctor_id, clinic_id);
        Err(AppError::bad_request("doctor_id must be an active doctor of this clinic"))
    }
}

/// Medico responsabile di un nuovo record clinico:
/// - un medico agisce solo a proprio nome (default: sé stesso);
/// - gli altri ruoli devono indicarlo esplicitamente.
pub(crate) async fn resolve_doctor(
    state: &AppState,
    ctx: &ClinicContext,
    requested: Option<i32>,
) -> Result<i32, AppError> {
    if ctx.role() == Role::Doctor {
        return match requested {
            None => Ok(ctx.user_id),
            Some(id) if id == ctx.user_id => Ok(id),
            Some(_) => {
                warn!("Doctor {} tried to act for another doctor", ctx.user_id);
                Err(AppError::forbidden("Doctors can only act on their own behalf"))
            }
        };
    }

    let doctor_id = requested.ok_or_else(|| AppError::bad_request("doctor_id is required"))?;
    ensure_doctor(state, ctx.clinic_id(), doctor_id).await?;
    Ok(doctor_id)
}

/// L'appuntamento collegato (se indicato) deve essere della clinica corrente e dello stesso paziente
pub(crate) async fn ensure_appointment(
    state: &AppState,
    clinic_id: i32,
    patient_id: i32,
    appointment_id: Option<i32>,
) -> Result<(), AppError> {
    let Some(appointment_id) = appointment_id else {
        return Ok(());
    };
    match state.appointment.read(&(clinic_id, appointment_id)).await? {
        Some(appointment) if appointment.patient_id == patient_id => Ok(()),
        Some(_) => {
            warn!("Appointment {} belongs to another patient", appointment_id);
            Err(AppError::bad_request("appointment_id must refer to an appointment of this patient"))
        }
        None => {
            warn!("Appointment {} not found in clinic {}", appointment_id, clinic_id);
            Err(AppError::bad_request("appointment_id must refer to an appointment of this clinic"))
        }
    }
}
