//! AppointmentRepository - Agenda dei medici
//!
//! Prenotazione e riprogrammazione bloccano la membership del medico (`SELECT ... FOR UPDATE`)
//! così che due richieste concorrenti sullo stesso medico vengano serializzate e il controllo
//! di sovrapposizione non possa essere aggirato.

use super::{Delete, Read, Scoped};
use crate::core::RowFilter;
use crate::dtos::{AppointmentListQuery, CreateAppointmentDTO, PageRequest, UpdateAppointmentDTO};
use crate::entities::{Appointment, AppointmentStatus, slot_end};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Error, MySql, MySqlConnection, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument, warn};

const APPOINTMENT_COLUMNS: &str = "appointment_id, clinic_id, patient_id, doctor_id, start_time, \
                                   duration_minutes, appointment_type, reason, notes, status, \
                                   created_by, created_at, updated_at";

/// Esito di una prenotazione / riprogrammazione
#[derive(Debug)]
pub enum SlotOutcome {
    Booked(Appointment),
    /// Lo slot si sovrappone all'appuntamento indicato
    Conflict(i32),
    /// La fine dello slot esce dal calendario
    OutOfRange,
}

pub struct AppointmentRepository {
    connection_pool: MySqlPool,
}

/// Inizio del giorno `date` in UTC
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Mezzanotte del giorno successivo; `None` per l'ultimo giorno rappresentabile
pub fn day_end(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.succ_opt().map(day_start)
}

impl AppointmentRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    async fn lock_doctor(
        conn: &mut MySqlConnection,
        clinic_id: i32,
        doctor_id: i32,
    ) -> Result<(), Error> {
        sqlx::query("SELECT user_id FROM user_clinics WHERE user_id = ? AND clinic_id = ? FOR UPDATE")
            .bind(doctor_id)
            .bind(clinic_id)
            .fetch_optional(conn)
            .await?;
        Ok(())
    }

    /// Primo appuntamento del medico che occupa lo slot `[start, end)`
    async fn find_overlap(
        conn: &mut MySqlConnection,
        clinic_id: i32,
        doctor_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<i32>,
    ) -> Result<Option<i32>, Error> {
        let mut query_builder = QueryBuilder::<MySql>::new(
            "SELECT appointment_id FROM appointments WHERE clinic_id = ",
        );
        query_builder.push_bind(clinic_id);
        query_builder.push(" AND doctor_id = ");
        query_builder.push_bind(doctor_id);
        query_builder.push(" AND status NOT IN ('cancelled', 'no_show')");
        query_builder.push(" AND start_time < ");
        query_builder.push_bind(end);
        query_builder.push(" AND DATE_ADD(start_time, INTERVAL duration_minutes MINUTE) > ");
        query_builder.push_bind(start);
        if let Some(id) = exclude_id {
            query_builder.push(" AND appointment_id <> ");
            query_builder.push_bind(id);
        }
        query_builder.push(" LIMIT 1");

        query_builder
            .build_query_scalar::<i32>()
            .fetch_optional(conn)
            .await
    }

    async fn read_with(
        conn: &mut MySqlConnection,
        clinic_id: i32,
        appointment_id: i32,
    ) -> Result<Option<Appointment>, Error> {
        let sql = format!(
            "SELECT {} FROM appointments WHERE clinic_id = ? AND appointment_id = ?",
            APPOINTMENT_COLUMNS
        );
        sqlx::query_as::<_, Appointment>(&sql)
            .bind(clinic_id)
            .bind(appointment_id)
            .fetch_optional(conn)
            .await
    }

    /// Crea l'appuntamento se lo slot del medico è libero.
    /// `data.data.doctor_id` deve essere già risolto dal chiamante.
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id, patient_id = %data.data.patient_id))]
    pub async fn book(&self, data: &Scoped<CreateAppointmentDTO>) -> Result<SlotOutcome, Error> {
        debug!("Booking appointment");
        let dto = &data.data;
        let doctor_id = dto.doctor_id.ok_or(Error::RowNotFound)?;
        let Some(end) = slot_end(dto.start_time, dto.duration_minutes) else {
            warn!("Appointment end is out of range");
            return Ok(SlotOutcome::OutOfRange);
        };

        let mut tx = self.connection_pool.begin().await?;
        Self::lock_doctor(&mut tx, data.clinic_id, doctor_id).await?;

        if let Some(existing) =
            Self::find_overlap(&mut tx, data.clinic_id, doctor_id, dto.start_time, end, None).await?
        {
            warn!("Slot overlaps appointment {}", existing);
            return Ok(SlotOutcome::Conflict(existing));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO appointments (
                clinic_id, patient_id, doctor_id, start_time, duration_minutes,
                appointment_type, reason, notes, created_by
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(dto.patient_id)
        .bind(doctor_id)
        .bind(dto.start_time)
        .bind(dto.duration_minutes)
        .bind(&dto.appointment_type)
        .bind(&dto.reason)
        .bind(&dto.notes)
        .bind(data.user_id)
        .execute(&mut *tx)
        .await?;
        let new_id = result.last_insert_id() as i32;

        let appointment = Self::read_with(&mut tx, data.clinic_id, new_id)
            .await?
            .ok_or(Error::RowNotFound)?;
        tx.commit().await?;

        info!("Appointment created with id {}", new_id);
        Ok(SlotOutcome::Booked(appointment))
    }

    /// Modifica l'appuntamento; se cambia lo slot ricontrolla le sovrapposizioni escludendo sé stesso
    #[instrument(skip(self, data), fields(clinic_id = %id.0, appointment_id = %id.1))]
    pub async fn reschedule(
        &self,
        id: &(i32, i32),
        data: &UpdateAppointmentDTO,
    ) -> Result<SlotOutcome, Error> {
        debug!("Rescheduling appointment");
        let mut tx = self.connection_pool.begin().await?;
        let current = Self::read_with(&mut tx, id.0, id.1)
            .await?
            .ok_or(Error::RowNotFound)?;

        let doctor_id = data.doctor_id.unwrap_or(current.doctor_id);
        let start = data.start_time.unwrap_or(current.start_time);
        let duration = data.duration_minutes.unwrap_or(current.duration_minutes);

        if data.moves_slot() && current.status.occupies_slot() {
            Self::lock_doctor(&mut tx, id.0, doctor_id).await?;
            let Some(end) = slot_end(start, duration) else {
                warn!("Rescheduled appointment end is out of range");
                return Ok(SlotOutcome::OutOfRange);
            };
            if let Some(existing) =
                Self::find_overlap(&mut tx, id.0, doctor_id, start, end, Some(id.1)).await?
            {
                warn!("Rescheduled slot overlaps appointment {}", existing);
                return Ok(SlotOutcome::Conflict(existing));
            }
        }

        let mut query_builder = QueryBuilder::<MySql>::new("UPDATE appointments SET ");
        let mut separated = query_builder.separated(", ");
        separated.push("doctor_id = ");
        separated.push_bind_unseparated(doctor_id);
        separated.push("start_time = ");
        separated.push_bind_unseparated(start);
        separated.push("duration_minutes = ");
        separated.push_bind_unseparated(duration);
        if let Some(ref appointment_type) = data.appointment_type {
            separated.push("appointment_type = ");
            separated.push_bind_unseparated(appointment_type);
        }
        if let Some(ref reason) = data.reason {
            separated.push("reason = ");
            separated.push_bind_unseparated(reason);
        }
        if let Some(ref notes) = data.notes {
            separated.push("notes = ");
            separated.push_bind_unseparated(notes);
        }
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND appointment_id = ");
        query_builder.push_bind(id.1);
        query_builder.build().execute(&mut *tx).await?;

        let updated = Self::read_with(&mut tx, id.0, id.1)
            .await?
            .ok_or(Error::RowNotFound)?;
        tx.commit().await?;

        info!("Appointment updated successfully");
        Ok(SlotOutcome::Booked(updated))
    }

    /// Cambia lo stato solo se l'appuntamento è ancora aperto.
    /// `Ok(None)` se nel frattempo è stato chiuso (completed, cancelled, no_show).
    #[instrument(skip(self), fields(clinic_id = %id.0, appointment_id = %id.1))]
    pub async fn update_status(
        &self,
        id: &(i32, i32),
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, Error> {
        debug!("Updating appointment status to {:?}", status);
        let result = sqlx::query(
            r#"
            UPDATE appointments SET status = ?
            WHERE clinic_id = ? AND appointment_id = ?
              AND status NOT IN ('completed', 'cancelled', 'no_show')
            "#,
        )
        .bind(status)
        .bind(id.0)
        .bind(id.1)
        .execute(&self.connection_pool)
        .await?;

        let appointment = self.read(id).await?.ok_or(Error::RowNotFound)?;
        if result.rows_affected() == 0 && appointment.status.is_terminal() {
            warn!("Appointment already closed as {:?}", appointment.status);
            return Ok(None);
        }
        Ok(Some(appointment))
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        filter: &RowFilter,
        query: &AppointmentListQuery,
    ) {
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);
        filter.push_sql(query_builder, "");

        let (from, to) = match query.date {
            Some(date) => (Some(date), Some(date)),
            None => (query.from, query.to),
        };
        if let Some(from) = from {
            query_builder.push(" AND start_time >= ");
            query_builder.push_bind(day_start(from));
        }
        // senza giorno successivo non c'è limite superiore
        if let Some(end) = to.and_then(day_end) {
            query_builder.push(" AND start_time < ");
            query_builder.push_bind(end);
        }
        if let Some(doctor_id) = query.doctor_id {
            query_builder.push(" AND doctor_id = ");
            query_builder.push_bind(doctor_id);
        }
        if let Some(patient_id) = query.patient_id {
            query_builder.push(" AND patient_id = ");
            query_builder.push_bind(patient_id);
        }
        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
        }
    }

    #[instrument(skip(self, filter, query), fields(clinic_id = %clinic_id))]
    pub async fn list(
        &self,
        clinic_id: i32,
        filter: &RowFilter,
        query: &AppointmentListQuery,
        page: PageRequest,
    ) -> Result<(Vec<Appointment>, i64), Error> {
        debug!("Listing appointments");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM appointments");
        Self::push_list_filters(&mut count_query, clinic_id, filter, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select =
            QueryBuilder::new(format!("SELECT {} FROM appointments", APPOINTMENT_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, filter, query);
        select.push(" ORDER BY start_time LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let appointments = select
            .build_query_as::<Appointment>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((appointments, total))
    }
}

impl Read<Appointment, (i32, i32)> for AppointmentRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, appointment_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Appointment>, Error> {
        debug!("Reading appointment");
        let mut conn = self.connection_pool.acquire().await?;
        Self::read_with(&mut conn, id.0, id.1).await
    }
}

impl Delete<(i32, i32)> for AppointmentRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, appointment_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        debug!("Deleting appointment");
        let mut tx = self.connection_pool.begin().await?;

        // fatture, prescrizioni e cartelle restano, senza il collegamento
        for table in ["invoices", "prescriptions", "medical_records"] {
            let sql = format!(
                "UPDATE {} SET appointment_id = NULL WHERE clinic_id = ? AND appointment_id = ?",
                table
            );
            sqlx::query(&sql)
                .bind(id.0)
                .bind(id.1)
                .execute(&mut *tx)
                .await?;
        }

        let result =
            sqlx::query("DELETE FROM appointments WHERE clinic_id = ? AND appointment_id = ?")
                .bind(id.0)
                .bind(id.1)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        tx.commit().await?;
        info!("Appointment deleted");
        Ok(())
    }
}


#[cfg(all(test, feature = "db-tests"))]
mod db_tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn request(start: DateTime<Utc>, duration_minutes: i32) -> Scoped<CreateAppointmentDTO> {
        Scoped::new(
            1,
            5,
            CreateAppointmentDTO {
                patient_id: 1,
                doctor_id: Some(2),
                start_time: start,
                duration_minutes,
                appointment_type: Some("checkup".to_string()),
                reason: None,
                notes: None,
            },
        )
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics", "patients")))]
    async fn overlapping_booking_is_a_conflict(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = AppointmentRepository::new(pool);
        let nine = Utc.with_ymd_and_hms(2030, 1, 10, 9, 0, 0).unwrap();

        let first = match repo.book(&request(nine, 30)).await? {
            SlotOutcome::Booked(a) => a,
            other => panic!("first booking must succeed, got {:?}", other),
        };
        let overlapping = repo
            .book(&request(nine + Duration::minutes(15), 30))
            .await?;
        assert!(matches!(overlapping, SlotOutcome::Conflict(id) if id == first.appointment_id));

        // back-to-back è permesso
        let adjacent = repo
            .book(&request(nine + Duration::minutes(30), 30))
            .await?;
        assert!(matches!(adjacent, SlotOutcome::Booked(_)));
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics", "patients")))]
    async fn cancelled_appointments_free_the_slot(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = AppointmentRepository::new(pool);
        let ten = Utc.with_ymd_and_hms(2030, 1, 10, 10, 0, 0).unwrap();

        let SlotOutcome::Booked(first) = repo.book(&request(ten, 60)).await? else {
            panic!("first booking must succeed");
        };
        repo.update_status(&(1, first.appointment_id), AppointmentStatus::Cancelled)
            .await?;

        assert!(matches!(
            repo.book(&request(ten, 60)).await?,
            SlotOutcome::Booked(_)
        ));
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics", "patients")))]
    async fn closed_appointment_status_is_not_overwritten(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = AppointmentRepository::new(pool);
        let eleven = Utc.with_ymd_and_hms(2030, 1, 10, 11, 0, 0).unwrap();

        let SlotOutcome::Booked(booked) = repo.book(&request(eleven, 30)).await? else {
            panic!("booking must succeed");
        };
        let id = (1, booked.appointment_id);

        let completed = repo.update_status(&id, AppointmentStatus::Completed).await?;
        assert!(matches!(completed, Some(a) if a.status == AppointmentStatus::Completed));

        // una seconda transizione che ha letto lo stato "scheduled" non passa più
        assert!(repo.update_status(&id, AppointmentStatus::Cancelled).await?.is_none());
        let stored = repo.read(&id).await?.unwrap();
        assert_eq!(stored.status, AppointmentStatus::Completed);
        Ok(())
    }
}
