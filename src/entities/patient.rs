//! Patient entity - Anagrafica paziente

use super::enums::{Gender, PatientStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Patient {
    pub patient_id: i32,
    pub clinic_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub blood_group: Option<String>,
    pub allergies: Json<Vec<String>>,
    pub medical_history: Option<String>,
    pub assigned_doctor_id: Option<i32>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub status: PatientStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
