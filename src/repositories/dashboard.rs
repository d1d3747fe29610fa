//! DashboardRepository - Aggregati in sola lettura per le dashboard
//!
//! Tutte le finestre temporali sono calcolate in UTC dalle funzioni pure in fondo al file,
//! così da poterle testare senza database.

use crate::dtos::{
    AdminDashboardDTO, DoctorDashboardDTO, ReceptionDashboardDTO, RevenuePointDTO, StatusCountDTO,
};
use crate::entities::ScheduleEntry;
use crate::entities::invoice::round_cents;
use crate::repositories::appointment::day_start;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use sqlx::{Error, MySql, MySqlPool, QueryBuilder};
use std::collections::HashMap;
use tracing::{debug, instrument};

const SCHEDULE_SELECT: &str = r#"
    SELECT a.appointment_id, a.start_time, a.duration_minutes, a.status,
           a.patient_id, CONCAT(p.first_name, ' ', p.last_name) AS patient_name,
           a.doctor_id, u.name AS doctor_name
    FROM appointments a
    INNER JOIN patients p ON p.clinic_id = a.clinic_id AND p.patient_id = a.patient_id
    INNER JOIN users u ON u.user_id = a.doctor_id
    WHERE a.clinic_id = "#;

/// Appuntamenti ancora da svolgere (la sessione sqlx usa UTC)
const UPCOMING: &str = " AND status IN ('scheduled', 'confirmed') AND start_time >= UTC_TIMESTAMP(6)";

pub struct DashboardRepository {
    connection_pool: MySqlPool,
}

impl DashboardRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    /// COUNT(*) su `table` con `clinic_id = ?` seguito da `condition`, con un filtro
    /// opzionale `(colonna, utente)` e un intervallo temporale opzionale `[from, to)`
    async fn count<T>(
        &self,
        table: &str,
        clinic_id: i32,
        condition: &str,
        owner: Option<(&str, i32)>,
        window: Option<(&str, T, T)>,
    ) -> Result<i64, Error>
    where
        T: for<'q> sqlx::Encode<'q, MySql> + sqlx::Type<MySql> + Send + 'static,
    {
        let mut query_builder =
            QueryBuilder::<MySql>::new(format!("SELECT COUNT(*) FROM {} WHERE clinic_id = ", table));
        query_builder.push_bind(clinic_id);
        query_builder.push(condition);
        if let Some((column, user_id)) = owner {
            query_builder.push(format!(" AND {} = ", column));
            query_builder.push_bind(user_id);
        }
        if let Some((column, from, to)) = window {
            query_builder.push(format!(" AND {} >= ", column));
            query_builder.push_bind(from);
            query_builder.push(format!(" AND {} < ", column));
            query_builder.push_bind(to);
        }
        query_builder
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await
    }

    async fn schedule(
        &self,
        clinic_id: i32,
        doctor_id: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry>, Error> {
        let (start, end) = today_bounds(now);
        let mut query_builder = QueryBuilder::<MySql>::new(SCHEDULE_SELECT);
        query_builder.push_bind(clinic_id);
        query_builder.push(" AND a.start_time >= ");
        query_builder.push_bind(start);
        query_builder.push(" AND a.start_time < ");
        query_builder.push_bind(end);
        if let Some(doctor_id) = doctor_id {
            query_builder.push(" AND a.doctor_id = ");
            query_builder.push_bind(doctor_id);
        }
        query_builder.push(" ORDER BY a.start_time");
        query_builder
            .build_query_as::<ScheduleEntry>()
            .fetch_all(&self.connection_pool)
            .await
    }

    async fn payments_between(
        &self,
        clinic_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64, Error> {
        sqlx::query_scalar(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS DOUBLE) FROM payments \
             WHERE clinic_id = ? AND paid_at >= ? AND paid_at < ?",
        )
        .bind(clinic_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.connection_pool)
        .await
    }

    async fn expenses_between(
        &self,
        clinic_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<f64, Error> {
        sqlx::query_scalar(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS DOUBLE) FROM expenses \
             WHERE clinic_id = ? AND expense_date >= ? AND expense_date < ?",
        )
        .bind(clinic_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.connection_pool)
        .await
    }

    async fn outstanding_balance(&self, clinic_id: i32) -> Result<f64, Error> {
        sqlx::query_scalar(
            "SELECT CAST(COALESCE(SUM(total - amount_paid), 0) AS DOUBLE) FROM invoices \
             WHERE clinic_id = ? AND status IN ('pending', 'overdue')",
        )
        .bind(clinic_id)
        .fetch_one(&self.connection_pool)
        .await
    }

    #[instrument(skip(self), fields(clinic_id = %clinic_id))]
    pub async fn admin_view(
        &self,
        clinic_id: i32,
        now: DateTime<Utc>,
    ) -> Result<AdminDashboardDTO, Error> {
        debug!("Computing admin dashboard");
        let (today_start, today_end) = today_bounds(now);
        let (month_start, month_end) = month_bounds(now.date_naive());
        let month_window = ("created_at", day_start(month_start), day_start(month_end));

        let (
            total_patients,
            active_patients,
            new_patients_this_month,
            appointments_today,
            pending_appointments,
            revenue_this_month,
            outstanding_balance,
            overdue_invoices,
            expenses_this_month,
            low_stock_items,
        ) = tokio::try_join!(
            self.count::<DateTime<Utc>>("patients", clinic_id, "", None, None),
            self.count::<DateTime<Utc>>("patients", clinic_id, " AND status = 'active'", None, None),
            self.count("patients", clinic_id, "", None, Some(month_window)),
            self.count(
                "appointments",
                clinic_id,
                "",
                None,
                Some(("start_time", today_start, today_end))
            ),
            self.count::<DateTime<Utc>>("appointments", clinic_id, UPCOMING, None, None),
            self.payments_between(clinic_id, day_start(month_start), day_start(month_end)),
            self.outstanding_balance(clinic_id),
            self.count::<DateTime<Utc>>("invoices", clinic_id, " AND status = 'overdue'", None, None),
            self.expenses_between(clinic_id, month_start, month_end),
            self.count::<DateTime<Utc>>(
                "inventory_items",
                clinic_id,
                " AND quantity <= reorder_level",
                None,
                None
            ),
        )?;

        Ok(AdminDashboardDTO {
            total_patients,
            active_patients,
            new_patients_this_month,
            appointments_today,
            pending_appointments,
            revenue_this_month: round_cents(revenue_this_month),
            outstanding_balance: round_cents(outstanding_balance),
            overdue_invoices,
            expenses_this_month: round_cents(expenses_this_month),
            low_stock_items,
        })
    }

    #[instrument(skip(self), fields(clinic_id = %clinic_id, doctor_id = %doctor_id))]
    pub async fn doctor_view(
        &self,
        clinic_id: i32,
        doctor_id: i32,
        now: DateTime<Utc>,
    ) -> Result<DoctorDashboardDTO, Error> {
        debug!("Computing doctor dashboard");
        let (today_start, today_end) = today_bounds(now);
        let (month_start, month_end) = month_bounds(now.date_naive());
        let mine = Some(("doctor_id", doctor_id));

        let (
            appointments_today,
            upcoming_appointments,
            my_patients,
            prescriptions_this_month,
            completed_this_month,
            today_schedule,
        ) = tokio::try_join!(
            self.count(
                "appointments",
                clinic_id,
                "",
                mine,
                Some(("start_time", today_start, today_end))
            ),
            self.count(
                "appointments",
                clinic_id,
                " AND status IN ('scheduled', 'confirmed')",
                mine,
                Some(("start_time", now, now + Duration::days(7)))
            ),
            self.count::<DateTime<Utc>>(
                "patients",
                clinic_id,
                "",
                Some(("assigned_doctor_id", doctor_id)),
                None
            ),
            self.count(
                "prescriptions",
                clinic_id,
                "",
                mine,
                Some(("created_at", day_start(month_start), day_start(month_end)))
            ),
            self.count(
                "appointments",
                clinic_id,
                " AND status = 'completed'",
                mine,
                Some(("start_time", day_start(month_start), day_start(month_end)))
            ),
            self.schedule(clinic_id, Some(doctor_id), now),
        )?;

        Ok(DoctorDashboardDTO {
            appointments_today,
            upcoming_appointments,
            my_patients,
            prescriptions_this_month,
            completed_this_month,
            today_schedule,
        })
    }

    #[instrument(skip(self), fields(clinic_id = %clinic_id))]
    pub async fn reception_view(
        &self,
        clinic_id: i32,
        now: DateTime<Utc>,
    ) -> Result<ReceptionDashboardDTO, Error> {
        debug!("Computing reception dashboard");
        let (today_start, today_end) = today_bounds(now);

        let by_status = async {
            sqlx::query_as::<_, (String, i64)>(
                "SELECT CAST(status AS CHAR), COUNT(*) FROM appointments \
                 WHERE clinic_id = ? AND start_time >= ? AND start_time < ? \
                 GROUP BY status ORDER BY status",
            )
            .bind(clinic_id)
            .bind(today_start)
            .bind(today_end)
            .fetch_all(&self.connection_pool)
            .await
        };

        let (appointments_today, new_patients_this_week, pending_invoices, today_schedule) = tokio::try_join!(
            by_status,
            self.count(
                "patients",
                clinic_id,
                "",
                None,
                Some(("created_at", today_end - Duration::days(7), today_end))
            ),
            self.count::<DateTime<Utc>>("invoices", clinic_id, " AND status = 'pending'", None, None),
            self.schedule(clinic_id, None, now),
        )?;

        Ok(ReceptionDashboardDTO {
            appointments_today: appointments_today
                .into_iter()
                .map(|(status, count)| StatusCountDTO { status, count })
                .collect(),
            new_patients_this_week,
            pending_invoices,
            today_schedule,
        })
    }

    /// Serie mensile ricavi/spese degli ultimi `months` mesi, dal più vecchio
    #[instrument(skip(self), fields(clinic_id = %clinic_id, months = %months))]
    pub async fn revenue_series(
        &self,
        clinic_id: i32,
        today: NaiveDate,
        months: u32,
    ) -> Result<Vec<RevenuePointDTO>, Error> {
        let series = month_series(today, months);
        let Some(first) = series.first().copied() else {
            return Ok(Vec::new());
        };
        let (_, end) = month_bounds(today);

        let revenue = sqlx::query_as::<_, (String, f64)>(
            "SELECT DATE_FORMAT(paid_at, '%Y-%m') AS month, CAST(SUM(amount) AS DOUBLE) \
             FROM payments WHERE clinic_id = ? AND paid_at >= ? AND paid_at < ? GROUP BY month",
        )
        .bind(clinic_id)
        .bind(day_start(first))
        .bind(day_start(end))
        .fetch_all(&self.connection_pool)
        .await?;

        let expenses = sqlx::query_as::<_, (String, f64)>(
            "SELECT DATE_FORMAT(expense_date, '%Y-%m') AS month, CAST(SUM(amount) AS DOUBLE) \
             FROM expenses WHERE clinic_id = ? AND expense_date >= ? AND expense_date < ? GROUP BY month",
        )
        .bind(clinic_id)
        .bind(first)
        .bind(end)
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(merge_series(&series, revenue, expenses))
    }
}

/// Inizio e fine (esclusa) del giorno UTC che contiene `now`
pub fn today_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day_start(now.date_naive());
    (start, start + Duration::days(1))
}

/// Primo giorno del mese di `date` e primo giorno del mese successivo
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).unwrap_or(date);
    let end = start.checked_add_months(Months::new(1)).unwrap_or(start);
    (start, end)
}

/// Primi giorni degli ultimi `months` mesi (mese corrente incluso), dal più vecchio
pub fn month_series(today: NaiveDate, months: u32) -> Vec<NaiveDate> {
    let (current, _) = month_bounds(today);
    (0..months)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .collect()
}

/// Allinea i totali per mese (`YYYY-MM`) alla serie, riempiendo con zero i mesi mancanti
fn merge_series(
    series: &[NaiveDate],
    revenue: Vec<(String, f64)>,
    expenses: Vec<(String, f64)>,
) -> Vec<RevenuePointDTO> {
    let revenue: HashMap<String, f64> = revenue.into_iter().collect();
    let expenses: HashMap<String, f64> = expenses.into_iter().collect();

    series
        .iter()
        .map(|month_start| {
            let month = month_start.format("%Y-%m").to_string();
            let revenue = round_cents(revenue.get(&month).copied().unwrap_or(0.0));
            let expenses = round_cents(expenses.get(&month).copied().unwrap_or(0.0));
            RevenuePointDTO {
                month,
                revenue,
                expenses,
                net: round_cents(revenue - expenses),
            }
        })
        .collect()
}
