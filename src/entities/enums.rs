//! Enumerazioni - Tipi enumerati utilizzati nelle entità
//!
//! Ogni enum persistito corrisponde a una colonna `ENUM` MySQL con valori in snake_case.

use serde::{Deserialize, Serialize};

// ********************* RUOLI **********************//

/// Ruolo di un utente, globale (`users.role`) o per clinica (`user_clinics.role`)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Doctor,
    Nurse,
    Receptionist,
    Accountant,
    Staff,
}

impl Role {
    /// Ruolo effettivo dentro una clinica: il super admin agisce come admin
    pub fn in_clinic(self) -> Role {
        match self {
            Role::SuperAdmin => Role::Admin,
            other => other,
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    /// Permessi di default assegnati ad una nuova membership
    pub fn default_permissions(self) -> Vec<String> {
        let perms: &[&str] = match self.in_clinic() {
            Role::Admin | Role::SuperAdmin => &["*"],
            Role::Doctor => &[
                "patients:read",
                "patients:write",
                "appointments:read",
                "appointments:write",
                "prescriptions:write",
                "medical_records:write",
                "odontograms:write",
                "test_reports:write",
                "invoices:read",
            ],
            Role::Nurse => &[
                "patients:read",
                "patients:write",
                "appointments:read",
                "medical_records:write",
                "test_reports:write",
                "inventory:write",
            ],
            Role::Receptionist => &[
                "patients:read",
                "patients:write",
                "appointments:read",
                "appointments:write",
                "invoices:write",
                "leads:write",
            ],
            Role::Accountant => &[
                "invoices:read",
                "invoices:write",
                "payments:write",
                "expenses:write",
                "payroll:write",
            ],
            Role::Staff => &["appointments:read", "inventory:write", "leads:read"],
        };
        perms.iter().map(|p| p.to_string()).collect()
    }
}

// ********************* PAZIENTI **********************//

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "patient_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Active,
    Inactive,
}

// ********************* APPUNTAMENTI **********************//

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "appointment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Un appuntamento occupa lo slot del medico solo se non è stato annullato
    pub fn occupies_slot(self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }
}

// ********************* REFERTI E PRESCRIZIONI **********************//

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "prescription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "test_report_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TestReportStatus {
    Pending,
    Completed,
    Reviewed,
}

// ********************* FATTURAZIONE **********************//

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn is_editable(self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Pending)
    }

    pub fn accepts_payments(self) -> bool {
        matches!(self, InvoiceStatus::Pending | InvoiceStatus::Overdue)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Insurance,
    Other,
}

// ********************* ODONTOGRAMMA **********************//

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "dentition", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Dentition {
    Permanent,
    Primary,
    Mixed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ToothStatus {
    Present,
    Missing,
    Extracted,
    Implant,
    Crown,
    Bridge,
    RootCanal,
    Impacted,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Mesial,
    Distal,
    Occlusal,
    Buccal,
    Lingual,
    Incisal,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

// ********************* SPESE E PAYROLL **********************//

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "expense_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Salaries,
    Supplies,
    Equipment,
    Maintenance,
    Marketing,
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "payroll_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    Pending,
    Paid,
    Cancelled,
}

// ********************* LEAD **********************//

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "lead_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Website,
    Referral,
    WalkIn,
    Phone,
    SocialMedia,
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "lead_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

// ********************* FORMAZIONE **********************//

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "training_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl TrainingStatus {
    /// Stato corrispondente alla percentuale di avanzamento (0..=100)
    pub fn from_percent(percent: i32) -> Self {
        match percent {
            i32::MIN..=0 => TrainingStatus::NotStarted,
            100.. => TrainingStatus::Completed,
            _ => TrainingStatus::InProgress,
        }
    }
}
