//! Services module - Coordinatore per tutti i service handler HTTP
//!
//! Questo modulo organizza i service handlers in sotto-moduli separati per una migliore manutenibilità.
//! Ogni modulo gestisce gli endpoint HTTP per una specifica risorsa della clinica.

pub mod appointment;
pub mod auth;
pub mod billing;
pub mod clinic;
pub mod dashboard;
pub mod department;
pub mod expense;
pub(crate) mod guards;
pub mod inventory;
pub mod lead;
pub mod medical_record;
pub mod odontogram;
pub mod patient;
pub mod payroll;
pub mod prescription;
pub mod test_report;
pub mod training;

// Re-exports per facilitare l'import
pub use appointment::{
    create_appointment, delete_appointment, get_appointment, list_appointments,
    update_appointment, update_appointment_status,
};
pub use auth::{login_user, me, register_user};
pub use billing::{
    cancel_invoice, create_invoice, get_invoice, list_invoice_payments, list_invoices,
    list_payments, record_payment, update_invoice,
};
pub use clinic::{
    add_member, create_clinic, get_current_clinic, list_members, list_my_clinics, remove_member,
    update_current_clinic, update_member,
};
pub use dashboard::{get_dashboard, get_revenue};
pub use department::{
    create_department, delete_department, get_department, list_departments, update_department,
};
pub use expense::{create_expense, delete_expense, get_expense, list_expenses, update_expense};
pub use inventory::{
    adjust_stock, create_item, delete_item, get_item, list_items, list_low_stock, update_item,
};
pub use lead::{convert_lead, create_lead, delete_lead, get_lead, list_leads, update_lead};
pub use medical_record::{
    create_medical_record, delete_medical_record, get_medical_record, list_medical_records,
    update_medical_record,
};
pub use odontogram::{
    activate_odontogram, add_treatment, create_odontogram, get_active_odontogram, get_odontogram,
    get_odontogram_history, update_treatment, upsert_tooth,
};
pub use patient::{create_patient, delete_patient, get_patient, list_patients, update_patient};
pub use payroll::{
    create_payroll, delete_payroll, get_payroll, list_payroll, mark_payroll_paid, update_payroll,
};
pub use prescription::{
    create_prescription, delete_prescription, get_prescription, list_prescriptions,
    update_prescription,
};
pub use test_report::{
    create_test_report, delete_test_report, get_test_report, list_test_reports,
    update_test_report,
};
pub use training::{
    create_training, delete_training, get_training, list_training_progress, list_trainings,
    update_training, update_training_progress,
};

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

/// Root endpoint - health check
pub async fn root(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, "Server is running!")
}
