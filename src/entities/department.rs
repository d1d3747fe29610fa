//! Department entity - Reparti della clinica

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Department {
    pub department_id: i32,
    pub clinic_id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Responsabile del reparto, membro della clinica
    pub head_id: Option<i32>,
    pub is_active: bool,
    /// Membri assegnati al reparto (calcolato)
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
