//! Clinic DTOs - Creazione/modifica clinica e gestione dei membri

use super::validation::{CLINIC_CODE_RE, CURRENCY_RE, PHONE_RE};
use crate::entities::Role;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateClinicDTO {
    #[validate(length(min = 2, max = 150, message = "Clinic name must be between 2 and 150 characters"))]
    pub name: String,
    #[validate(regex(path = *CLINIC_CODE_RE, message = "Code must be 2-20 uppercase letters, digits or dashes"))]
    pub code: String,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(regex(path = *CURRENCY_RE, message = "Currency must be an ISO 4217 code"))]
    pub currency: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub timezone: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateClinicDTO {
    #[validate(length(min = 2, max = 150, message = "Clinic name must be between 2 and 150 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(regex(path = *CURRENCY_RE, message = "Currency must be an ISO 4217 code"))]
    pub currency: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub timezone: Option<String>,
    pub is_active: Option<bool>,
}

/// Aggiunta di un utente esistente alla clinica corrente
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct AddMemberDTO {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub role: Role,
    pub permissions: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateMemberDTO {
    pub role: Option<Role>,
    pub permissions: Option<Vec<String>>,
    /// Assente: invariato; `null`: nessun reparto; id: reparto della clinica
    #[serde(default, deserialize_with = "present_or_null")]
    pub department_id: Option<Option<i32>>,
    pub is_active: Option<bool>,
}

/// Distingue un campo `null` (`Some(None)`) da un campo assente (`None`, via `default`)
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
