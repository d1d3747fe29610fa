//! Medical record DTOs

use crate::entities::VitalSigns;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateMedicalRecordDTO {
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    pub appointment_id: Option<i32>,
    pub visit_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 500, message = "Chief complaint is required"))]
    pub chief_complaint: String,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub vital_signs: VitalSigns,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateMedicalRecordDTO {
    pub visit_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 500))]
    pub chief_complaint: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    #[validate(nested)]
    pub vital_signs: Option<VitalSigns>,
    pub notes: Option<String>,
}
