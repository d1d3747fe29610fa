//! Appointment DTOs - Prenotazione e gestione appuntamenti

use crate::entities::AppointmentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_duration() -> i32 {
    30
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateAppointmentDTO {
    pub patient_id: i32,
    /// Se assente e l'utente è un medico, l'appuntamento è suo
    pub doctor_id: Option<i32>,
    pub start_time: DateTime<Utc>,
    #[serde(default = "default_duration")]
    #[validate(range(min = 5, max = 480, message = "Duration must be between 5 and 480 minutes"))]
    pub duration_minutes: i32,
    #[validate(length(max = 50))]
    pub appointment_type: Option<String>,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// Riprogrammazione / modifica: lo stato si cambia con l'endpoint dedicato
#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateAppointmentDTO {
    pub doctor_id: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    #[validate(range(min = 5, max = 480, message = "Duration must be between 5 and 480 minutes"))]
    pub duration_minutes: Option<i32>,
    #[validate(length(max = 50))]
    pub appointment_type: Option<String>,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl UpdateAppointmentDTO {
    /// Vero se la modifica sposta lo slot occupato
    pub fn moves_slot(&self) -> bool {
        self.doctor_id.is_some() || self.start_time.is_some() || self.duration_minutes.is_some()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateAppointmentStatusDTO {
    pub status: AppointmentStatus,
}
