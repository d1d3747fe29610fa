//! Lead entity - Potenziali pazienti (CRM)

use super::enums::{LeadSource, LeadStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Lead {
    pub lead_id: i32,
    pub clinic_id: i32,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub interest: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<i32>,
    pub follow_up_date: Option<NaiveDate>,
    pub converted_patient_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Divide il nome completo in (nome, cognome) per la conversione in paziente
    pub fn split_name(&self) -> (String, String) {
        let trimmed = self.name.trim();
        match trimmed.rsplit_once(char::is_whitespace) {
            Some((first, last)) => (first.trim().to_string(), last.to_string()),
            None => (trimmed.to_string(), String::new()),
        }
    }
}
