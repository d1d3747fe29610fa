//! Patient DTOs - Anagrafica pazienti

use super::validation::{BLOOD_GROUP_RE, PHONE_RE};
use crate::entities::{Gender, PatientStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreatePatientDTO {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(regex(path = *BLOOD_GROUP_RE, message = "Invalid blood group"))]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    pub medical_history: Option<String>,
    pub assigned_doctor_id: Option<i32>,
    #[validate(length(max = 100))]
    pub emergency_contact_name: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Invalid emergency contact phone"))]
    pub emergency_contact_phone: Option<String>,
}

/// Aggiornamento parziale: solo i campi `Some(_)` vengono modificati
#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdatePatientDTO {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(regex(path = *BLOOD_GROUP_RE, message = "Invalid blood group"))]
    pub blood_group: Option<String>,
    pub allergies: Option<Vec<String>>,
    pub medical_history: Option<String>,
    pub assigned_doctor_id: Option<i32>,
    #[validate(length(max = 100))]
    pub emergency_contact_name: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Invalid emergency contact phone"))]
    pub emergency_contact_phone: Option<String>,
    pub status: Option<PatientStatus>,
}

impl UpdatePatientDTO {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.date_of_birth.is_none()
            && self.gender.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.address.is_none()
            && self.blood_group.is_none()
            && self.allergies.is_none()
            && self.medical_history.is_none()
            && self.assigned_doctor_id.is_none()
            && self.emergency_contact_name.is_none()
            && self.emergency_contact_phone.is_none()
            && self.status.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> CreatePatientDTO {
        CreatePatientDTO {
            first_name: "Mario".to_string(),
            last_name: "Rossi".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 5, 17),
            gender: Some(Gender::Male),
            phone: "+39 333 1234567".to_string(),
            email: None,
            address: None,
            blood_group: Some("AB+".to_string()),
            allergies: vec!["penicillin".to_string()],
            medical_history: None,
            assigned_doctor_id: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
        }
    }

    #[test]
    fn valid_patient_passes() {
        assert!(patient().validate().is_ok());
    }

    #[test]
    fn bad_blood_group_is_rejected() {
        let mut dto = patient();
        dto.blood_group = Some("Z".to_string());
        let errors = dto.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("blood_group"));
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(UpdatePatientDTO::default().is_empty());
        let update = UpdatePatientDTO {
            status: Some(PatientStatus::Inactive),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
