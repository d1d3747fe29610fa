//! Prescription entity - Prescrizione farmacologica

use super::enums::PrescriptionStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Prescription {
    pub prescription_id: i32,
    pub clinic_id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub appointment_id: Option<i32>,
    pub diagnosis: String,
    pub medications: Json<Vec<Medication>>,
    pub notes: Option<String>,
    pub status: PrescriptionStatus,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Validate)]
pub struct Medication {
    #[validate(length(min = 1, max = 200, message = "Medication name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub dosage: String,
    #[validate(length(min = 1, max = 100))]
    pub frequency: String,
    #[validate(length(min = 1, max = 100))]
    pub duration: String,
    pub instructions: Option<String>,
}
