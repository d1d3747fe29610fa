//! Repositories module - Coordinatore per tutti i repository del progetto
//!
//! Questo modulo organizza i repository in sotto-moduli separati per una migliore manutenibilità.
//! Ogni repository gestisce le operazioni di database per una specifica entità.

// ************************* NOTA SULLE QUERY ************************* //

/*
   Le query sono scritte con le funzioni "runtime" di sqlx (`sqlx::query`, `query_as::<_, T>`,
   `query_scalar`, `QueryBuilder`) e NON con le macro `query!`/`query_as!`.
   Le macro verificano lo schema a compile time, ma richiedono un database raggiungibile
   (o la cache `.sqlx`) ad ogni build; qui gran parte delle query è costruita dinamicamente
   (filtri opzionali delle liste, filtri per ruolo, UPDATE parziali), quindi la verifica
   statica coprirebbe comunque poco.

   Regole da rispettare:
   - ogni query su una tabella di clinica filtra SEMPRE per `clinic_id`, anche quando l'id
     della riga basterebbe: una riga di un'altra clinica deve risultare "non trovata";
   - le colonne della SELECT sono elencate esplicitamente (costanti `*_COLUMNS`) e devono
     coincidere con i campi della struct con `#[derive(sqlx::FromRow)]`;
   - COUNT(*) ritorna BIGINT -> i64, SUM su interi va castata (CAST ... AS SIGNED),
     SUM su DOUBLE va castata AS DOUBLE per avere sempre un f64;
   - le operazioni che leggono e poi scrivono (prenotazioni, odontogrammi, pagamenti,
     conversione lead) girano in una transazione con `SELECT ... FOR UPDATE` sulla riga
     che fa da "mutex".
*/

// ************************* MODULI REPOSITORY ************************* //

// Dichiarazione dei sotto-moduli
pub mod appointment;
pub mod clinic;
pub mod dashboard;
pub mod department;
pub mod expense;
pub mod inventory;
pub mod invoice;
pub mod lead;
pub mod medical_record;
pub mod odontogram;
pub mod patient;
pub mod payment;
pub mod payroll;
pub mod prescription;
pub mod test_report;
pub mod training;
pub mod traits;
pub mod user;
pub mod user_clinic;

// Re-esportazione dei trait per facilitare l'import
pub use traits::{Create, Delete, Read, Scoped, Update};

// Re-esportazione delle struct dei repository per facilitare l'import
pub use appointment::{AppointmentRepository, SlotOutcome};
pub use clinic::ClinicRepository;
pub use dashboard::DashboardRepository;
pub use department::DepartmentRepository;
pub use expense::ExpenseRepository;
pub use inventory::InventoryRepository;
pub use invoice::{InvoiceChanges, InvoiceEdit, InvoiceRepository, NewInvoice};
pub use lead::{ConversionOutcome, LeadRepository};
pub use medical_record::MedicalRecordRepository;
pub use odontogram::OdontogramRepository;
pub use patient::PatientRepository;
pub use payment::{PaymentOutcome, PaymentRepository};
pub use payroll::PayrollRepository;
pub use prescription::PrescriptionRepository;
pub use test_report::TestReportRepository;
pub use training::{ProgressOutcome, TrainingRepository};
pub use user::UserRepository;
pub use user_clinic::UserClinicRepository;
