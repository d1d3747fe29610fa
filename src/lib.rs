//! Clinic server library - espone i moduli principali per i test

pub mod core;
pub mod dtos;
pub mod entities;
pub mod repositories;
pub mod services;

// Re-export dei tipi principali per facilitare l'import
pub use core::{AppError, AppState, auth, config};
pub use services::root;

use axum::{
    Router, middleware,
    routing::{get, patch, post, put},
};
use std::sync::Arc;

/// Crea il router principale dell'applicazione
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .nest("/api", configure_api_routes(state.clone()))
        .with_state(state)
}

/// Tutte le rotte sotto `/api`
fn configure_api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Rotte che richiedono un contesto clinica (autenticazione + clinic_context middleware)
    let tenant_routes = Router::new()
        .nest("/clinics/current", configure_current_clinic_routes())
        .nest("/patients", configure_patient_routes())
        .nest("/appointments", configure_appointment_routes())
        .nest("/prescriptions", configure_prescription_routes())
        .nest("/medical-records", configure_medical_record_routes())
        .nest("/test-reports", configure_test_report_routes())
        .nest("/odontograms", configure_odontogram_routes())
        .nest("/invoices", configure_invoice_routes())
        .route("/payments", get(services::list_payments))
        .nest("/inventory", configure_inventory_routes())
        .nest("/expenses", configure_expense_routes())
        .nest("/payroll", configure_payroll_routes())
        .nest("/leads", configure_lead_routes())
        .nest("/departments", configure_department_routes())
        .nest("/trainings", configure_training_routes())
        .nest("/dashboard", configure_dashboard_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            core::clinic_context_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            core::authentication_middleware,
        ));

    Router::new()
        .nest("/auth", configure_auth_routes(state.clone()))
        .nest("/clinics", configure_clinic_routes(state))
        .merge(tenant_routes)
}

/// Configura le routes di autenticazione (login, register, me)
fn configure_auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use services::*;

    // Rotte che NON richiedono autenticazione
    let public_routes = Router::new()
        .route("/login", post(login_user))
        .route("/register", post(register_user));

    let private_routes = Router::new().route("/me", get(me)).layer(
        middleware::from_fn_with_state(state, core::authentication_middleware),
    );

    public_routes.merge(private_routes)
}

/// Creazione ed elenco delle cliniche: solo autenticazione, nessun contesto clinica
fn configure_clinic_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_my_clinics).post(create_clinic))
        .layer(middleware::from_fn_with_state(
            state,
            core::authentication_middleware,
        ))
}

fn configure_current_clinic_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(get_current_clinic).put(update_current_clinic))
        .route("/members", get(list_members).post(add_member))
        .route(
            "/members/{user_id}",
            patch(update_member).delete(remove_member),
        )
}

fn configure_patient_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_patients).post(create_patient))
        .route(
            "/{patient_id}",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
}

fn configure_appointment_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route(
            "/{appointment_id}",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route("/{appointment_id}/status", patch(update_appointment_status))
}

fn configure_prescription_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_prescriptions).post(create_prescription))
        .route(
            "/{prescription_id}",
            get(get_prescription)
                .put(update_prescription)
                .delete(delete_prescription),
        )
}

fn configure_medical_record_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_medical_records).post(create_medical_record))
        .route(
            "/{record_id}",
            get(get_medical_record)
                .put(update_medical_record)
                .delete(delete_medical_record),
        )
}

fn configure_test_report_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_test_reports).post(create_test_report))
        .route(
            "/{report_id}",
            get(get_test_report)
                .put(update_test_report)
                .delete(delete_test_report),
        )
}

fn configure_odontogram_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", post(create_odontogram))
        .route("/patient/{patient_id}", get(get_active_odontogram))
        .route("/patient/{patient_id}/history", get(get_odontogram_history))
        .route("/{odontogram_id}", get(get_odontogram))
        .route("/{odontogram_id}/activate", post(activate_odontogram))
        .route("/{odontogram_id}/teeth/{tooth_number}", put(upsert_tooth))
        .route(
            "/{odontogram_id}/teeth/{tooth_number}/treatments",
            post(add_treatment),
        )
        .route(
            "/{odontogram_id}/teeth/{tooth_number}/treatments/{treatment_id}",
            patch(update_treatment),
        )
}

fn configure_invoice_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/{invoice_id}", get(get_invoice).put(update_invoice))
        .route("/{invoice_id}/cancel", patch(cancel_invoice))
        .route(
            "/{invoice_id}/payments",
            get(list_invoice_payments).post(record_payment),
        )
}

fn configure_inventory_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/low-stock", get(list_low_stock))
        .route(
            "/{item_id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/{item_id}/stock", patch(adjust_stock))
}

fn configure_expense_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_expenses).post(create_expense))
        .route(
            "/{expense_id}",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
}

fn configure_payroll_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_payroll).post(create_payroll))
        .route(
            "/{payroll_id}",
            get(get_payroll).put(update_payroll).delete(delete_payroll),
        )
        .route("/{payroll_id}/pay", patch(mark_payroll_paid))
}

fn configure_lead_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_leads).post(create_lead))
        .route(
            "/{lead_id}",
            get(get_lead).put(update_lead).delete(delete_lead),
        )
        .route("/{lead_id}/convert", post(convert_lead))
}

fn configure_department_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_departments).post(create_department))
        .route(
            "/{department_id}",
            get(get_department)
                .put(update_department)
                .delete(delete_department),
        )
}

fn configure_training_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(list_trainings).post(create_training))
        .route(
            "/{training_id}",
            get(get_training).put(update_training).delete(delete_training),
        )
        .route(
            "/{training_id}/progress",
            get(list_training_progress).put(update_training_progress),
        )
}

fn configure_dashboard_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/", get(get_dashboard))
        .route("/revenue", get(get_revenue))
}
