//! UserClinic entity - Membership di un utente in una clinica, con ruolo e permessi

use super::enums::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct UserClinic {
    pub user_id: i32,
    pub clinic_id: i32,
    pub role: Role,
    pub permissions: Json<Vec<String>>,
    pub department_id: Option<i32>,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl UserClinic {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == "*" || p == permission)
    }
}

/// Membership arricchita con i dati dell'utente (per la lista membri)
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct ClinicMember {
    pub user_id: i32,
    pub clinic_id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub permissions: Json<Vec<String>>,
    pub department_id: Option<i32>,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

/// Membership arricchita con i dati della clinica (per "le mie cliniche")
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct MembershipWithClinic {
    pub clinic_id: i32,
    pub clinic_name: String,
    pub clinic_code: String,
    pub role: Role,
    pub owner_id: i32,
    pub joined_at: DateTime<Utc>,
}
