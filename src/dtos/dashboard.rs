//! Dashboard DTOs - Aggregati in sola lettura per ruolo

use crate::entities::ScheduleEntry;
use serde::Serialize;

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct AdminDashboardDTO {
    pub total_patients: i64,
    pub active_patients: i64,
    pub new_patients_this_month: i64,
    pub appointments_today: i64,
    pub pending_appointments: i64,
    pub revenue_this_month: f64,
    pub outstanding_balance: f64,
    pub overdue_invoices: i64,
    pub expenses_this_month: f64,
    pub low_stock_items: i64,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct DoctorDashboardDTO {
    pub appointments_today: i64,
    pub upcoming_appointments: i64,
    pub my_patients: i64,
    pub prescriptions_this_month: i64,
    pub completed_this_month: i64,
    pub today_schedule: Vec<ScheduleEntry>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct StatusCountDTO {
    pub status: String,
    pub count: i64,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct ReceptionDashboardDTO {
    pub appointments_today: Vec<StatusCountDTO>,
    pub new_patients_this_week: i64,
    pub pending_invoices: i64,
    pub today_schedule: Vec<ScheduleEntry>,
}

/// Vista restituita da `GET /api/dashboard`, scelta in base al ruolo nella clinica
#[derive(Serialize, Debug)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardDTO {
    Admin(AdminDashboardDTO),
    Doctor(DoctorDashboardDTO),
    Reception(ReceptionDashboardDTO),
}

/// Punto della serie mensile ricavi/spese, `month` nel formato `YYYY-MM`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RevenuePointDTO {
    pub month: String,
    pub revenue: f64,
    pub expenses: f64,
    pub net: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_is_tagged_with_view() {
        let body = serde_json::to_value(DashboardDTO::Admin(AdminDashboardDTO::default())).unwrap();
        assert_eq!(body["view"], "admin");
        assert_eq!(body["total_patients"], 0);
    }
}
