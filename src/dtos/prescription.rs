//! Prescription DTOs

use crate::entities::{Medication, PrescriptionStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreatePrescriptionDTO {
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    pub appointment_id: Option<i32>,
    #[validate(length(min = 1, max = 500, message = "Diagnosis is required"))]
    pub diagnosis: String,
    #[validate(length(min = 1, message = "At least one medication is required"), nested)]
    pub medications: Vec<Medication>,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdatePrescriptionDTO {
    #[validate(length(min = 1, max = 500))]
    pub diagnosis: Option<String>,
    #[validate(length(min = 1, message = "At least one medication is required"), nested)]
    pub medications: Option<Vec<Medication>>,
    pub notes: Option<String>,
    pub status: Option<PrescriptionStatus>,
    pub follow_up_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medications_are_validated_one_by_one() {
        let dto = CreatePrescriptionDTO {
            patient_id: 1,
            doctor_id: None,
            appointment_id: None,
            diagnosis: "Pharyngitis".to_string(),
            medications: vec![Medication {
                name: String::new(),
                dosage: "500mg".to_string(),
                frequency: "3/day".to_string(),
                duration: "7 days".to_string(),
                instructions: None,
            }],
            notes: None,
            follow_up_date: None,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn prescription_without_medications_is_rejected() {
        let dto = CreatePrescriptionDTO {
            patient_id: 1,
            doctor_id: None,
            appointment_id: None,
            diagnosis: "Checkup".to_string(),
            medications: vec![],
            notes: None,
            follow_up_date: None,
        };
        assert!(dto.validate().is_err());
    }
}
