//! Entities module - Entità del dominio applicativo
//!
//! Questo modulo contiene tutte le entità (models) che rappresentano i dati persistiti nel database.
//! Ogni entity corrisponde a una tabella nel database; tutte tranne `User` e `Clinic`
//! sono scoped per `clinic_id`.

pub mod appointment;
pub mod clinic;
pub mod department;
pub mod enums;
pub mod expense;
pub mod inventory;
pub mod invoice;
pub mod lead;
pub mod medical_record;
pub mod odontogram;
pub mod patient;
pub mod payroll;
pub mod prescription;
pub mod test_report;
pub mod training;
pub mod user;
pub mod user_clinic;

// Re-exports per facilitare l'import
pub use appointment::{Appointment, ScheduleEntry, slot_end};
pub use clinic::Clinic;
pub use department::Department;
pub use enums::*;
pub use expense::Expense;
pub use inventory::InventoryItem;
pub use invoice::{
    EditConflict, Invoice, InvoiceItem, InvoiceTotals, Payment, TotalsError, status_after_edit,
};
pub use lead::Lead;
pub use medical_record::{MedicalRecord, VitalSigns};
pub use odontogram::{ChartError, Odontogram, OdontogramVersion, Tooth, TreatmentSummary};
pub use patient::Patient;
pub use payroll::Payroll;
pub use prescription::{Medication, Prescription};
pub use test_report::{TestReport, TestResult};
pub use training::{ProgressError, Training, TrainingProgress};
pub use user::User;
pub use user_clinic::{ClinicMember, MembershipWithClinic, UserClinic};
