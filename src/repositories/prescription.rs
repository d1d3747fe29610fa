//! PrescriptionRepository - Prescrizioni farmacologiche

use super::{Create, Delete, Read, Scoped, Update};
use crate::core::RowFilter;
use crate::dtos::{CreatePrescriptionDTO, PageRequest, PrescriptionListQuery, UpdatePrescriptionDTO};
use crate::entities::Prescription;
use sqlx::types::Json;
use sqlx::{Error, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument};

const PRESCRIPTION_COLUMNS: &str = "prescription_id, clinic_id, patient_id, doctor_id, appointment_id, \
                                    diagnosis, medications, notes, status, follow_up_date, \
                                    created_at, updated_at";

pub struct PrescriptionRepository {
    connection_pool: MySqlPool,
}

impl PrescriptionRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        filter: &RowFilter,
        query: &PrescriptionListQuery,
    ) {
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);
        filter.push_sql(query_builder, "");
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
        query: &PrescriptionListQuery,
        page: PageRequest,
    ) -> Result<(Vec<Prescription>, i64), Error> {
        debug!("Listing prescriptions");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM prescriptions");
        Self::push_list_filters(&mut count_query, clinic_id, filter, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select =
            QueryBuilder::new(format!("SELECT {} FROM prescriptions", PRESCRIPTION_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, filter, query);
        select.push(" ORDER BY created_at DESC LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let prescriptions = select
            .build_query_as::<Prescription>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((prescriptions, total))
    }
}

impl Create<Prescription, Scoped<CreatePrescriptionDTO>> for PrescriptionRepository {
    /// `data.data.doctor_id` deve essere già risolto dal chiamante
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id))]
    async fn create(&self, data: &Scoped<CreatePrescriptionDTO>) -> Result<Prescription, Error> {
        debug!("Creating new prescription");
        let dto = &data.data;
        let result = sqlx::query(
            r#"
            INSERT INTO prescriptions (
                clinic_id, patient_id, doctor_id, appointment_id, diagnosis, medications,
                notes, follow_up_date
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(dto.patient_id)
        .bind(dto.doctor_id.unwrap_or(data.user_id))
        .bind(dto.appointment_id)
        .bind(&dto.diagnosis)
        .bind(Json(&dto.medications))
        .bind(&dto.notes)
        .bind(dto.follow_up_date)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;
        info!("Prescription created with id {}", new_id);
        self.read(&(data.clinic_id, new_id))
            .await?
            .ok_or(Error::RowNotFound)
    }
}

impl Read<Prescription, (i32, i32)> for PrescriptionRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, prescription_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Prescription>, Error> {
        debug!("Reading prescription");
        let sql = format!(
            "SELECT {} FROM prescriptions WHERE clinic_id = ? AND prescription_id = ?",
            PRESCRIPTION_COLUMNS
        );
        let prescription = sqlx::query_as::<_, Prescription>(&sql)
            .bind(id.0)
            .bind(id.1)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(prescription)
    }
}

impl Update<Prescription, UpdatePrescriptionDTO, (i32, i32)> for PrescriptionRepository {
    #[instrument(skip(self, data), fields(clinic_id = %id.0, prescription_id = %id.1))]
    async fn update(
        &self,
        id: &(i32, i32),
        data: &UpdatePrescriptionDTO,
    ) -> Result<Prescription, Error> {
        debug!("Updating prescription");
        let current = self.read(id).await?.ok_or(Error::RowNotFound)?;
        if data.diagnosis.is_none()
            && data.medications.is_none()
            && data.notes.is_none()
            && data.status.is_none()
            && data.follow_up_date.is_none()
        {
            return Ok(current);
        }

        let mut query_builder = QueryBuilder::new("UPDATE prescriptions SET ");
        let mut separated = query_builder.separated(", ");
        if let Some(ref diagnosis) = data.diagnosis {
            separated.push("diagnosis = ");
            separated.push_bind_unseparated(diagnosis);
        }
        if let Some(ref medications) = data.medications {
            separated.push("medications = ");
            separated.push_bind_unseparated(Json(medications));
        }
        if let Some(ref notes) = data.notes {
            separated.push("notes = ");
            separated.push_bind_unseparated(notes);
        }
        if let Some(status) = data.status {
            separated.push("status = ");
            separated.push_bind_unseparated(status);
        }
        if let Some(follow_up_date) = data.follow_up_date {
            separated.push("follow_up_date = ");
            separated.push_bind_unseparated(follow_up_date);
        }
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND prescription_id = ");
        query_builder.push_bind(id.1);
        query_builder.build().execute(&self.connection_pool).await?;

        info!("Prescription updated successfully");
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for PrescriptionRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, prescription_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        let result =
            sqlx::query("DELETE FROM prescriptions WHERE clinic_id = ? AND prescription_id = ?")
                .bind(id.0)
                .bind(id.1)
                .execute(&self.connection_pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        info!("Prescription deleted");
        Ok(())
    }
}
