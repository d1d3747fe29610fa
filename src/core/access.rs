//! Access filters - Filtri di riga derivati dal ruolo dell'utente nella clinica
//!
//! Ogni endpoint di lettura chiede a [`row_filter`] quale sottoinsieme delle righe della
//! clinica l'utente può vedere e applica il risultato alla query tramite
//! [`RowFilter::push_sql`]. Le letture per id usano [`RowFilter::permits`].

use crate::core::AppError;
use crate::entities::Role;
use sqlx::{MySql, QueryBuilder};
use tracing::warn;

/// Tipi di risorsa soggetti a filtro per ruolo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Patient,
    Appointment,
    Prescription,
    MedicalRecord,
    Odontogram,
    TestReport,
    Invoice,
    Inventory,
    Expense,
    Payroll,
    Lead,
    TrainingProgress,
}

impl Resource {
    /// Colonna che identifica il "proprietario" della riga per i ruoli limitati
    fn owner_column(self) -> &'static str {
        match self {
            Resource::Patient => "assigned_doctor_id",
            Resource::Payroll => "employee_id",
            Resource::Lead => "assigned_to",
            Resource::TrainingProgress => "user_id",
            _ => "doctor_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// Tutte le righe della clinica
    ClinicWide,
    /// Solo le righe in cui `column = user_id`
    OwnedBy { column: &'static str, user_id: i32 },
    /// Nessuna riga
    Denied,
}

impl RowFilter {
    /// Aggiunge la condizione alla WHERE già aperta (`... WHERE clinic_id = ?`).
    /// `alias` è il prefisso di tabella da usare nelle query con JOIN (es. `"p."`).
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, MySql>, alias: &str) {
        match *self {
            RowFilter::ClinicWide => {}
            RowFilter::OwnedBy { column, user_id } => {
                qb.push(format!(" AND {}{} = ", alias, column));
                qb.push_bind(user_id);
            }
            RowFilter::Denied => {
                qb.push(" AND 1 = 0");
            }
        }
    }

    /// Per gli endpoint di lista: un ruolo senza accesso riceve 403 invece di una lista vuota
    pub fn ensure_visible(&self) -> Result<(), AppError> {
        match self {
            RowFilter::Denied => {
                warn!("Role has no access to this resource");
                Err(AppError::forbidden("You do not have access to this resource"))
            }
            _ => Ok(()),
        }
    }

    /// Controllo su una singola riga già caricata, dato il valore della colonna proprietario
    pub fn permits(&self, owner: Option<i32>) -> bool {
        match *self {
            RowFilter::ClinicWide => true,
            RowFilter::OwnedBy { user_id, .. } => owner == Some(user_id),
            RowFilter::Denied => false,
        }
    }
}

/// Deriva il filtro di riga per `role` (ruolo nella clinica) e la risorsa richiesta
pub fn row_filter(role: Role, user_id: i32, resource: Resource) -> RowFilter {
    use Resource::*;
    use Role::*;

    let owned = RowFilter::OwnedBy {
        column: resource.owner_column(),
        user_id,
    };

    match (role.in_clinic(), resource) {
        (SuperAdmin | Admin, _) => RowFilter::ClinicWide,
        (_, Inventory) => RowFilter::ClinicWide,
        (_, TrainingProgress) => owned,

        (Doctor, Expense | Lead) => RowFilter::Denied,
        (Doctor, _) => owned,

        (Nurse, Patient | Appointment | Prescription | MedicalRecord | Odontogram | TestReport) => {
            RowFilter::ClinicWide
        }
        (Nurse, Payroll) => owned,
        (Nurse, _) => RowFilter::Denied,

        (Receptionist, Patient | Appointment | Invoice | Lead) => RowFilter::ClinicWide,
        (Receptionist, Payroll) => owned,
        (Receptionist, _) => RowFilter::Denied,

        (Accountant, Patient | Appointment | Invoice | Expense | Payroll) => RowFilter::ClinicWide,
        (Accountant, _) => RowFilter::Denied,

        (Staff, Appointment) => RowFilter::ClinicWide,
        (Staff, Payroll | Lead) => owned,
        (Staff, _) => RowFilter::Denied,
    }
}
