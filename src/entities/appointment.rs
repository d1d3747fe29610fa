//! Appointment entity - Appuntamento tra paziente e medico

use super::enums::AppointmentStatus;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Appointment {
    pub appointment_id: i32,
    pub clinic_id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub appointment_type: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fine dello slot `[start, start + minutes)`; `None` se esce dal calendario
pub fn slot_end(start: DateTime<Utc>, duration_minutes: i32) -> Option<DateTime<Utc>> {
    start.checked_add_signed(Duration::minutes(i64::from(duration_minutes)))
}

/// Riga della agenda giornaliera usata nelle dashboard
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct ScheduleEntry {
    pub appointment_id: i32,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub patient_id: i32,
    pub patient_name: String,
    pub doctor_id: i32,
    pub doctor_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn slot_end_adds_the_duration() {
        let start = Utc.with_ymd_and_hms(2030, 3, 4, 10, 0, 0).unwrap();
        assert_eq!(
            slot_end(start, 45),
            Some(Utc.with_ymd_and_hms(2030, 3, 4, 10, 45, 0).unwrap())
        );
    }

    #[test]
    fn slot_end_past_the_last_representable_instant() {
        let start = DateTime::<Utc>::MAX_UTC - Duration::minutes(10);
        assert_eq!(slot_end(start, 30), None);
    }
}
