//! DTOs module - Data Transfer Objects
//!
//! Questo modulo contiene tutti i DTOs usati per la comunicazione client-server.
//! I DTOs separano la rappresentazione esterna (API) dalla rappresentazione interna (entities).

pub mod appointment;
pub mod billing;
pub mod clinic;
pub mod dashboard;
pub mod department;
pub mod expense;
pub mod inventory;
pub mod lead;
pub mod medical_record;
pub mod odontogram;
pub mod patient;
pub mod payroll;
pub mod prescription;
pub mod query;
pub mod response;
pub mod test_report;
pub mod training;
pub mod user;
pub mod validation;

pub use appointment::{CreateAppointmentDTO, UpdateAppointmentDTO, UpdateAppointmentStatusDTO};
pub use billing::{CreateInvoiceDTO, CreatePaymentDTO, InvoiceDTO, UpdateInvoiceDTO};
pub use clinic::{AddMemberDTO, CreateClinicDTO, UpdateClinicDTO, UpdateMemberDTO};
pub use dashboard::{
    AdminDashboardDTO, DashboardDTO, DoctorDashboardDTO, ReceptionDashboardDTO, RevenuePointDTO,
    StatusCountDTO,
};
pub use department::{CreateDepartmentDTO, UpdateDepartmentDTO};
pub use expense::{CreateExpenseDTO, UpdateExpenseDTO};
pub use inventory::{CreateInventoryItemDTO, StockAdjustmentDTO, UpdateInventoryItemDTO};
pub use lead::{ConvertLeadDTO, CreateLeadDTO, UpdateLeadDTO};
pub use medical_record::{CreateMedicalRecordDTO, UpdateMedicalRecordDTO};
pub use odontogram::{
    CreateOdontogramDTO, CreateTreatmentDTO, UpdateTreatmentDTO, UpsertToothDTO,
};
pub use patient::{CreatePatientDTO, UpdatePatientDTO};
pub use payroll::{CreatePayrollDTO, UpdatePayrollDTO};
pub use prescription::{CreatePrescriptionDTO, UpdatePrescriptionDTO};
pub use query::{
    AppointmentListQuery, ExpenseListQuery, InventoryListQuery, InvoiceListQuery, LeadListQuery,
    MedicalRecordListQuery, PageRequest, PatientListQuery, PaymentListQuery, PayrollListQuery,
    PrescriptionListQuery, RevenueQuery, TestReportListQuery, TrainingListQuery,
};
pub use response::{ApiResponse, MessageResponse, Paginated, Pagination};
pub use test_report::{CreateTestReportDTO, TestReportDTO, UpdateTestReportDTO};
pub use training::{CreateTrainingDTO, UpdateProgressDTO, UpdateTrainingDTO};
pub use user::{CreateUserDTO, LoginDTO, LoginResponseDTO, MeDTO, MembershipDTO, UserDTO};
