//! Lead DTOs - Contatti commerciali e conversione in paziente

use super::validation::PHONE_RE;
use crate::entities::{Gender, LeadSource, LeadStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateLeadDTO {
    #[validate(length(min = 2, max = 150, message = "Name must be between 2 and 150 characters"))]
    pub name: String,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub source: Option<LeadSource>,
    #[validate(length(max = 255))]
    pub interest: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<i32>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateLeadDTO {
    #[validate(length(min = 2, max = 150))]
    pub name: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub source: Option<LeadSource>,
    /// `converted` si raggiunge solo con `POST /{id}/convert`
    pub status: Option<LeadStatus>,
    #[validate(length(max = 255))]
    pub interest: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<i32>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ConvertLeadDTO {
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub assigned_doctor_id: Option<i32>,
}
