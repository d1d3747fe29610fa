//! Query DTOs - Parametri di query string per liste e filtri

use crate::entities::{
    AppointmentStatus, ExpenseCategory, InvoiceStatus, LeadSource, LeadStatus, PatientStatus,
    PayrollStatus, PrescriptionStatus, TestReportStatus,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Pagina richiesta, già normalizzata: `page >= 1`, `1 <= limit <= 100`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PatientListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<PatientStatus>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct AppointmentListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Singolo giorno (UTC); ha precedenza su from/to
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub doctor_id: Option<i32>,
    pub patient_id: Option<i32>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PrescriptionListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub patient_id: Option<i32>,
    pub status: Option<PrescriptionStatus>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct MedicalRecordListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub patient_id: Option<i32>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct TestReportListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub patient_id: Option<i32>,
    pub status: Option<TestReportStatus>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InvoiceListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<InvoiceStatus>,
    pub patient_id: Option<i32>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PaymentListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InventoryListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ExpenseListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<ExpenseCategory>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PayrollListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub employee_id: Option<i32>,
    pub status: Option<PayrollStatus>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct LeadListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub search: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct TrainingListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub mandatory: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct RevenueQuery {
    pub months: Option<u32>,
}

impl RevenueQuery {
    pub const DEFAULT_MONTHS: u32 = 6;
    pub const MAX_MONTHS: u32 = 24;

    pub fn months(&self) -> u32 {
        self.months
            .unwrap_or(Self::DEFAULT_MONTHS)
            .clamp(1, Self::MAX_MONTHS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_defaults() {
        let page = PageRequest::new(None, None);
        assert_eq!(page, PageRequest { page: 1, limit: 20 });
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn page_request_clamps_out_of_range_values() {
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(500)).limit, 100);
        assert_eq!(PageRequest::new(Some(3), Some(25)).offset(), 50);
    }

    #[test]
    fn revenue_months_are_bounded() {
        assert_eq!(RevenueQuery { months: None }.months(), 6);
        assert_eq!(RevenueQuery { months: Some(0) }.months(), 1);
        assert_eq!(RevenueQuery { months: Some(60) }.months(), 24);
    }
}
