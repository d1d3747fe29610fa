//! Odontogram entity - Cartella dentale versionata (notazione FDI)
//!
//! Ogni paziente può avere più versioni dell'odontogramma ma al massimo una attiva.
//! Il riepilogo dei trattamenti (`treatment_summary`) è un aggregato derivato dai denti:
//! viene ricalcolato ad ogni modifica con [`Odontogram::refresh_summary`] e non è mai
//! accettato dal client.

use super::enums::{Dentition, Surface, ToothStatus, TreatmentStatus};
use super::invoice::round_cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Odontogram {
    pub odontogram_id: i32,
    pub clinic_id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub version: i32,
    pub is_active: bool,
    pub dentition: Dentition,
    pub teeth: Json<Vec<Tooth>>,
    pub notes: Option<String>,
    pub treatment_summary: Json<TreatmentSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Versione "leggera" senza denti, per lo storico
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct OdontogramVersion {
    pub odontogram_id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub version: i32,
    pub is_active: bool,
    pub dentition: Dentition,
    pub treatment_summary: Json<TreatmentSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tooth {
    pub tooth_number: u8,
    pub status: ToothStatus,
    #[serde(default)]
    pub conditions: Vec<ToothCondition>,
    #[serde(default)]
    pub treatments: Vec<Treatment>,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToothCondition {
    // es. "caries", "fracture", "filling"
    pub condition: String,
    #[serde(default)]
    pub surfaces: Vec<Surface>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Treatment {
    pub id: u32,
    pub procedure: String,
    #[serde(default)]
    pub surfaces: Vec<Surface>,
    pub status: TreatmentStatus,
    pub estimated_cost: f64,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Dati per un nuovo trattamento (id e completed_at vengono assegnati qui)
#[derive(Debug, Clone)]
pub struct TreatmentDraft {
    pub procedure: String,
    pub surfaces: Vec<Surface>,
    pub status: TreatmentStatus,
    pub estimated_cost: f64,
    pub notes: Option<String>,
}

/// Modifica parziale di un trattamento esistente
#[derive(Debug, Clone, Default)]
pub struct TreatmentPatch {
    pub status: Option<TreatmentStatus>,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TreatmentSummary {
    pub total_treatments: u32,
    pub planned: u32,
    pub in_progress: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub teeth_with_treatment: u32,
    pub estimated_total: f64,
    pub completed_total: f64,
    pub pending_total: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl TreatmentSummary {
    pub fn from_teeth(teeth: &[Tooth], now: DateTime<Utc>) -> Self {
        let mut summary = TreatmentSummary {
            last_updated: Some(now),
            ..Default::default()
        };

        for tooth in teeth {
            if tooth
                .treatments
                .iter()
                .any(|t| t.status != TreatmentStatus::Cancelled)
            {
                summary.teeth_with_treatment += 1;
            }

            for treatment in &tooth.treatments {
                summary.total_treatments += 1;
                match treatment.status {
                    TreatmentStatus::Planned => {
                        summary.planned += 1;
                        summary.pending_total += treatment.estimated_cost;
                    }
                    TreatmentStatus::InProgress => {
                        summary.in_progress += 1;
                        summary.pending_total += treatment.estimated_cost;
                    }
                    TreatmentStatus::Completed => {
                        summary.completed += 1;
                        summary.completed_total += treatment.estimated_cost;
                    }
                    TreatmentStatus::Cancelled => {
                        summary.cancelled += 1;
                        continue;
                    }
                }
                summary.estimated_total += treatment.estimated_cost;
            }
        }

        summary.estimated_total = round_cents(summary.estimated_total);
        summary.completed_total = round_cents(summary.completed_total);
        summary.pending_total = round_cents(summary.pending_total);
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartError {
    InvalidToothNumber,
    DuplicateTooth,
    ToothNotCharted,
    TreatmentNotFound,
    TreatmentClosed,
    NegativeCost,
}

/// Verifica che il numero FDI sia valido per la dentizione del grafico.
/// Permanenti: quadranti 1-4, posizioni 1-8. Decidui: quadranti 5-8, posizioni 1-5.
pub fn is_valid_tooth(tooth_number: u8, dentition: Dentition) -> bool {
    let quadrant = tooth_number / 10;
    let position = tooth_number % 10;
    let permanent = (1..=4).contains(&quadrant) && (1..=8).contains(&position);
    let primary = (5..=8).contains(&quadrant) && (1..=5).contains(&position);
    match dentition {
        Dentition::Permanent => permanent,
        Dentition::Primary => primary,
        Dentition::Mixed => permanent || primary,
    }
}

/// Valida un insieme di denti in ingresso: numeri FDI validi, nessun duplicato, costi >= 0
pub fn validate_teeth(teeth: &[Tooth], dentition: Dentition) -> Result<(), ChartError> {
    let mut seen = Vec::with_capacity(teeth.len());
    for tooth in teeth {
        if !is_valid_tooth(tooth.tooth_number, dentition) {
            return Err(ChartError::InvalidToothNumber);
        }
        if seen.contains(&tooth.tooth_number) {
            return Err(ChartError::DuplicateTooth);
        }
        seen.push(tooth.tooth_number);
        if tooth.treatments.iter().any(|t| t.estimated_cost < 0.0) {
            return Err(ChartError::NegativeCost);
        }
    }
    Ok(())
}

impl Odontogram {
    fn next_treatment_id(&self) -> u32 {
        self.teeth
            .iter()
            .flat_map(|t| t.treatments.iter())
            .map(|t| t.id)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn tooth(&self, tooth_number: u8) -> Option<&Tooth> {
        self.teeth.iter().find(|t| t.tooth_number == tooth_number)
    }

    /// Inserisce o sostituisce lo stato di un dente. I trattamenti esistenti vengono
    /// mantenuti: si modificano solo tramite add/update_treatment.
    pub fn upsert_tooth(
        &mut self,
        tooth_number: u8,
        status: ToothStatus,
        conditions: Vec<ToothCondition>,
        notes: Option<String>,
    ) -> Result<(), ChartError> {
        if !is_valid_tooth(tooth_number, self.dentition) {
            return Err(ChartError::InvalidToothNumber);
        }

        match self.teeth.iter_mut().find(|t| t.tooth_number == tooth_number) {
            Some(tooth) => {
                tooth.status = status;
                tooth.conditions = conditions;
                tooth.notes = notes;
            }
            None => {
                self.teeth.push(Tooth {
                    tooth_number,
                    status,
                    conditions,
                    treatments: Vec::new(),
                    notes,
                });
                self.teeth.sort_by_key(|t| t.tooth_number);
            }
        }
        Ok(())
    }

    /// Aggiunge un trattamento ad un dente; il dente viene creato come `present` se non
    /// ancora registrato. Ritorna l'id assegnato.
    pub fn add_treatment(
        &mut self,
        tooth_number: u8,
        draft: TreatmentDraft,
        now: DateTime<Utc>,
    ) -> Result<u32, ChartError> {
        if draft.estimated_cost < 0.0 {
            return Err(ChartError::NegativeCost);
        }
        if self.tooth(tooth_number).is_none() {
            self.upsert_tooth(tooth_number, ToothStatus::Present, Vec::new(), None)?;
        }

        let id = self.next_treatment_id();
        let completed_at = (draft.status == TreatmentStatus::Completed).then_some(now);
        let tooth = self
            .teeth
            .iter_mut()
            .find(|t| t.tooth_number == tooth_number)
            .ok_or(ChartError::ToothNotCharted)?;

        tooth.treatments.push(Treatment {
            id,
            procedure: draft.procedure,
            surfaces: draft.surfaces,
            status: draft.status,
            estimated_cost: draft.estimated_cost,
            notes: draft.notes,
            completed_at,
        });
        Ok(id)
    }

    /// Aggiorna un trattamento. Completati e annullati non sono più modificabili.
    pub fn update_treatment(
        &mut self,
        tooth_number: u8,
        treatment_id: u32,
        patch: TreatmentPatch,
        now: DateTime<Utc>,
    ) -> Result<(), ChartError> {
        let tooth = self
            .teeth
            .iter_mut()
            .find(|t| t.tooth_number == tooth_number)
            .ok_or(ChartError::ToothNotCharted)?;
        let treatment = tooth
            .treatments
            .iter_mut()
            .find(|t| t.id == treatment_id)
            .ok_or(ChartError::TreatmentNotFound)?;

        if matches!(
            treatment.status,
            TreatmentStatus::Completed | TreatmentStatus::Cancelled
        ) {
            return Err(ChartError::TreatmentClosed);
        }

        if let Some(cost) = patch.estimated_cost {
            if cost < 0.0 {
                return Err(ChartError::NegativeCost);
            }
            treatment.estimated_cost = cost;
        }
        if let Some(notes) = patch.notes {
            treatment.notes = Some(notes);
        }
        if let Some(status) = patch.status {
            treatment.status = status;
            if status == TreatmentStatus::Completed {
                treatment.completed_at = Some(now);
            }
        }
        Ok(())
    }

    pub fn refresh_summary(&mut self, now: DateTime<Utc>) {
        self.treatment_summary = Json(TreatmentSummary::from_teeth(&self.teeth, now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap()
    }

    fn chart(dentition: Dentition) -> Odontogram {
        Odontogram {
            odontogram_id: 1,
            clinic_id: 1,
            patient_id: 1,
            doctor_id: 2,
            version: 1,
            is_active: true,
            dentition,
            teeth: Json(Vec::new()),
            notes: None,
            treatment_summary: Json(TreatmentSummary::default()),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn draft(procedure: &str, status: TreatmentStatus, cost: f64) -> TreatmentDraft {
        TreatmentDraft {
            procedure: procedure.to_string(),
            surfaces: vec![Surface::Occlusal],
            status,
            estimated_cost: cost,
            notes: None,
        }
    }

    #[test]
    fn fdi_numbers_depend_on_dentition() {
        assert!(is_valid_tooth(11, Dentition::Permanent));
        assert!(is_valid_tooth(48, Dentition::Permanent));
        assert!(!is_valid_tooth(49, Dentition::Permanent));
        assert!(!is_valid_tooth(10, Dentition::Permanent));
        assert!(!is_valid_tooth(55, Dentition::Permanent));

        assert!(is_valid_tooth(55, Dentition::Primary));
        assert!(is_valid_tooth(81, Dentition::Primary));
        assert!(!is_valid_tooth(56, Dentition::Primary));
        assert!(!is_valid_tooth(16, Dentition::Primary));

        assert!(is_valid_tooth(16, Dentition::Mixed));
        assert!(is_valid_tooth(65, Dentition::Mixed));
        assert!(!is_valid_tooth(90, Dentition::Mixed));
    }

    #[test]
    fn summary_counts_and_costs_by_status() {
        let mut chart = chart(Dentition::Permanent);
        chart
            .add_treatment(16, draft("filling", TreatmentStatus::Planned, 80.0), now())
            .unwrap();
        chart
            .add_treatment(16, draft("crown", TreatmentStatus::InProgress, 400.0), now())
            .unwrap();
        chart
            .add_treatment(21, draft("cleaning", TreatmentStatus::Completed, 50.0), now())
            .unwrap();
        chart
            .add_treatment(36, draft("extraction", TreatmentStatus::Cancelled, 120.0), now())
            .unwrap();
        chart.refresh_summary(now());

        let summary = &chart.treatment_summary;
        assert_eq!(summary.total_treatments, 4);
        assert_eq!(summary.planned, 1);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.teeth_with_treatment, 2);
        assert_eq!(summary.estimated_total, 530.0);
        assert_eq!(summary.completed_total, 50.0);
        assert_eq!(summary.pending_total, 480.0);
        assert_eq!(summary.last_updated, Some(now()));
    }

    #[test]
    fn treatment_ids_are_unique_across_teeth() {
        let mut chart = chart(Dentition::Permanent);
        let a = chart
            .add_treatment(11, draft("filling", TreatmentStatus::Planned, 10.0), now())
            .unwrap();
        let b = chart
            .add_treatment(12, draft("filling", TreatmentStatus::Planned, 10.0), now())
            .unwrap();
        let c = chart
            .add_treatment(11, draft("sealant", TreatmentStatus::Planned, 10.0), now())
            .unwrap();
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[test]
    fn add_treatment_charts_missing_tooth_as_present() {
        let mut chart = chart(Dentition::Permanent);
        chart
            .add_treatment(26, draft("filling", TreatmentStatus::Planned, 60.0), now())
            .unwrap();
        let tooth = chart.tooth(26).unwrap();
        assert_eq!(tooth.status, ToothStatus::Present);
        assert_eq!(tooth.treatments.len(), 1);
    }

    #[test]
    fn add_treatment_rejects_tooth_outside_dentition() {
        let mut chart = chart(Dentition::Primary);
        let err = chart
            .add_treatment(16, draft("filling", TreatmentStatus::Planned, 60.0), now())
            .unwrap_err();
        assert_eq!(err, ChartError::InvalidToothNumber);
    }

    #[test]
    fn completing_a_treatment_stamps_completion_time() {
        let mut chart = chart(Dentition::Permanent);
        let id = chart
            .add_treatment(14, draft("root canal", TreatmentStatus::InProgress, 300.0), now())
            .unwrap();
        chart
            .update_treatment(
                14,
                id,
                TreatmentPatch {
                    status: Some(TreatmentStatus::Completed),
                    ..Default::default()
                },
                now(),
            )
            .unwrap();

        let treatment = &chart.tooth(14).unwrap().treatments[0];
        assert_eq!(treatment.status, TreatmentStatus::Completed);
        assert_eq!(treatment.completed_at, Some(now()));
    }

    #[test]
    fn closed_treatments_cannot_be_changed() {
        let mut chart = chart(Dentition::Permanent);
        let id = chart
            .add_treatment(14, draft("filling", TreatmentStatus::Completed, 90.0), now())
            .unwrap();
        let err = chart
            .update_treatment(
                14,
                id,
                TreatmentPatch {
                    estimated_cost: Some(10.0),
                    ..Default::default()
                },
                now(),
            )
            .unwrap_err();
        assert_eq!(err, ChartError::TreatmentClosed);
    }

    #[test]
    fn upsert_keeps_existing_treatments_and_sorts_teeth() {
        let mut chart = chart(Dentition::Permanent);
        chart
            .add_treatment(31, draft("filling", TreatmentStatus::Planned, 40.0), now())
            .unwrap();
        chart
            .upsert_tooth(11, ToothStatus::Crown, Vec::new(), None)
            .unwrap();
        chart
            .upsert_tooth(31, ToothStatus::RootCanal, Vec::new(), Some("sensitive".into()))
            .unwrap();

        let numbers: Vec<u8> = chart.teeth.iter().map(|t| t.tooth_number).collect();
        assert_eq!(numbers, vec![11, 31]);
        let tooth = chart.tooth(31).unwrap();
        assert_eq!(tooth.status, ToothStatus::RootCanal);
        assert_eq!(tooth.treatments.len(), 1);
    }

    #[test]
    fn validate_teeth_rejects_duplicates() {
        let tooth = Tooth {
            tooth_number: 11,
            status: ToothStatus::Present,
            conditions: Vec::new(),
            treatments: Vec::new(),
            notes: None,
        };
        assert_eq!(
            validate_teeth(&[tooth.clone(), tooth], Dentition::Permanent),
            Err(ChartError::DuplicateTooth)
        );
    }
}
