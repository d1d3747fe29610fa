//! Odontogram DTOs - Creazione versioni e modifiche ai denti

use crate::entities::odontogram::{ToothCondition, TreatmentDraft, TreatmentPatch};
use crate::entities::{Dentition, Surface, Tooth, ToothStatus, TreatmentStatus};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateOdontogramDTO {
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    #[serde(default = "default_dentition")]
    pub dentition: Dentition,
    /// Denti iniziali; ignorati se `copy_from_active` è vero e c'è una versione attiva
    #[serde(default)]
    pub teeth: Vec<Tooth>,
    #[serde(default)]
    pub copy_from_active: bool,
    pub notes: Option<String>,
}

fn default_dentition() -> Dentition {
    Dentition::Permanent
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct UpsertToothDTO {
    pub status: ToothStatus,
    #[serde(default)]
    pub conditions: Vec<ToothCondition>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateTreatmentDTO {
    #[validate(length(min = 1, max = 150, message = "Procedure is required"))]
    pub procedure: String,
    #[serde(default)]
    pub surfaces: Vec<Surface>,
    pub status: Option<TreatmentStatus>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Estimated cost cannot be negative"))]
    pub estimated_cost: f64,
    pub notes: Option<String>,
}

impl From<CreateTreatmentDTO> for TreatmentDraft {
    fn from(value: CreateTreatmentDTO) -> Self {
        Self {
            procedure: value.procedure,
            surfaces: value.surfaces,
            status: value.status.unwrap_or(TreatmentStatus::Planned),
            estimated_cost: value.estimated_cost,
            notes: value.notes,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateTreatmentDTO {
    pub status: Option<TreatmentStatus>,
    #[validate(range(min = 0.0, message = "Estimated cost cannot be negative"))]
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
}

impl From<UpdateTreatmentDTO> for TreatmentPatch {
    fn from(value: UpdateTreatmentDTO) -> Self {
        Self {
            status: value.status,
            estimated_cost: value.estimated_cost,
            notes: value.notes,
        }
    }
}
