//! MedicalRecord entity - Cartella clinica di una visita

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct MedicalRecord {
    pub record_id: i32,
    pub clinic_id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub appointment_id: Option<i32>,
    pub visit_date: NaiveDate,
    pub chief_complaint: String,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub vital_signs: Json<VitalSigns>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Validate)]
pub struct VitalSigns {
    // formato "120/80"
    #[validate(length(max = 20))]
    pub blood_pressure: Option<String>,
    #[validate(range(min = 20, max = 300))]
    pub heart_rate: Option<i32>,
    #[validate(range(min = 25.0, max = 45.0))]
    pub temperature: Option<f64>,
    #[validate(range(min = 0.5, max = 500.0))]
    pub weight: Option<f64>,
    #[validate(range(min = 20.0, max = 300.0))]
    pub height: Option<f64>,
}
