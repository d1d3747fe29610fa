//! Application State - Stato globale dell'applicazione
//!
//! Contiene tutti i repository e la configurazione condivisa
//! necessari per gestire le richieste.

use crate::repositories::{
    AppointmentRepository, ClinicRepository, DashboardRepository, DepartmentRepository,
    ExpenseRepository, InventoryRepository, InvoiceRepository, LeadRepository,
    MedicalRecordRepository, OdontogramRepository, PatientRepository, PaymentRepository,
    PayrollRepository, PrescriptionRepository, TestReportRepository, TrainingRepository,
    UserClinicRepository, UserRepository,
};
use sqlx::MySqlPool;

/// Stato globale dell'applicazione condiviso tra tutte le route e middleware
pub struct AppState {
    pub user: UserRepository,
    pub clinic: ClinicRepository,
    pub user_clinic: UserClinicRepository,
    pub patient: PatientRepository,
    pub appointment: AppointmentRepository,
    pub prescription: PrescriptionRepository,
    pub medical_record: MedicalRecordRepository,
    pub test_report: TestReportRepository,
    pub odontogram: OdontogramRepository,
    pub invoice: InvoiceRepository,
    pub payment: PaymentRepository,
    pub inventory: InventoryRepository,
    pub expense: ExpenseRepository,
    pub payroll: PayrollRepository,
    pub lead: LeadRepository,
    pub department: DepartmentRepository,
    pub training: TrainingRepository,
    pub dashboard: DashboardRepository,

    /// Secret key per JWT token
    pub jwt_secret: String,

    /// Durata dei token in ore
    pub jwt_expiration_hours: i64,
}

impl AppState {
    /// Crea una nuova istanza di AppState inizializzando tutti i repository
    /// con il pool di connessioni fornito.
    ///
    /// # Arguments
    /// * `pool` - Pool di connessioni MySQL condiviso
    /// * `jwt_secret` - Chiave segreta per la firma dei token JWT
    /// * `jwt_expiration_hours` - Durata dei token emessi al login
    pub fn new(pool: MySqlPool, jwt_secret: String, jwt_expiration_hours: i64) -> Self {
        Self {
            user: UserRepository::new(pool.clone()),
            clinic: ClinicRepository::new(pool.clone()),
            user_clinic: UserClinicRepository::new(pool.clone()),
            patient: PatientRepository::new(pool.clone()),
            appointment: AppointmentRepository::new(pool.clone()),
            prescription: PrescriptionRepository::new(pool.clone()),
            medical_record: MedicalRecordRepository::new(pool.clone()),
            test_report: TestReportRepository::new(pool.clone()),
            odontogram: OdontogramRepository::new(pool.clone()),
            invoice: InvoiceRepository::new(pool.clone()),
            payment: PaymentRepository::new(pool.clone()),
            inventory: InventoryRepository::new(pool.clone()),
            expense: ExpenseRepository::new(pool.clone()),
            payroll: PayrollRepository::new(pool.clone()),
            lead: LeadRepository::new(pool.clone()),
            department: DepartmentRepository::new(pool.clone()),
            training: TrainingRepository::new(pool.clone()),
            dashboard: DashboardRepository::new(pool),
            jwt_secret,
            jwt_expiration_hours,
        }
    }
}
