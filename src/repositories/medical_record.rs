//! MedicalRecordRepository - Cartelle cliniche delle visite

use super::{Create, Delete, Read, Scoped, Update};
use crate::core::RowFilter;
use crate::dtos::{
    CreateMedicalRecordDTO, MedicalRecordListQuery, PageRequest, UpdateMedicalRecordDTO,
};
use crate::entities::MedicalRecord;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Error, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument};

const RECORD_COLUMNS: &str = "record_id, clinic_id, patient_id, doctor_id, appointment_id, visit_date, \
                              chief_complaint, diagnosis, treatment, vital_signs, notes, \
                              created_at, updated_at";

pub struct MedicalRecordRepository {
    connection_pool: MySqlPool,
}

impl MedicalRecordRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        filter: &RowFilter,
        query: &MedicalRecordListQuery,
    ) {
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);
        filter.push_sql(query_builder, "");
        if let Some(patient_id) = query.patient_id {
            query_builder.push(" AND patient_id = ");
            query_builder.push_bind(patient_id);
        }
        if let Some(from) = query.from {
            query_builder.push(" AND visit_date >= ");
            query_builder.push_bind(from);
        }
        if let Some(to) = query.to {
            query_builder.push(" AND visit_date <= ");
            query_builder.push_bind(to);
        }
    }

    #[instrument(skip(self, filter, query), fields(clinic_id = %clinic_id))]
    pub async fn list(
        &self,
        clinic_id: i32,
        filter: &RowFilter,
        query: &MedicalRecordListQuery,
        page: PageRequest,
    ) -> Result<(Vec<MedicalRecord>, i64), Error> {
        debug!("Listing medical records");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM medical_records");
        Self::push_list_filters(&mut count_query, clinic_id, filter, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select =
            QueryBuilder::new(format!("SELECT {} FROM medical_records", RECORD_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, filter, query);
        select.push(" ORDER BY visit_date DESC, record_id DESC LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let records = select
            .build_query_as::<MedicalRecord>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((records, total))
    }
}

impl Create<MedicalRecord, Scoped<CreateMedicalRecordDTO>> for MedicalRecordRepository {
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id))]
    async fn create(&self, data: &Scoped<CreateMedicalRecordDTO>) -> Result<MedicalRecord, Error> {
        debug!("Creating new medical record");
        let dto = &data.data;
        let result = sqlx::query(
            r#"
            INSERT INTO medical_records (
                clinic_id, patient_id, doctor_id, appointment_id, visit_date, chief_complaint,
                diagnosis, treatment, vital_signs, notes
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(dto.patient_id)
        .bind(dto.doctor_id.unwrap_or(data.user_id))
        .bind(dto.appointment_id)
        .bind(dto.visit_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(&dto.chief_complaint)
        .bind(&dto.diagnosis)
        .bind(&dto.treatment)
        .bind(Json(&dto.vital_signs))
        .bind(&dto.notes)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;
        info!("Medical record created with id {}", new_id);
        self.read(&(data.clinic_id, new_id))
            .await?
            .ok_or(Error::RowNotFound)
    }
}

impl Read<MedicalRecord, (i32, i32)> for MedicalRecordRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, record_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<MedicalRecord>, Error> {
        debug!("Reading medical record");
        let sql = format!(
            "SELECT {} FROM medical_records WHERE clinic_id = ? AND record_id = ?",
            RECORD_COLUMNS
        );
        let record = sqlx::query_as::<_, MedicalRecord>(&sql)
            .bind(id.0)
            .bind(id.1)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(record)
    }
}

impl Update<MedicalRecord, UpdateMedicalRecordDTO, (i32, i32)> for MedicalRecordRepository {
    #[instrument(skip(self, data), fields(clinic_id = %id.0, record_id = %id.1))]
    async fn update(
        &self,
        id: &(i32, i32),
        data: &UpdateMedicalRecordDTO,
    ) -> Result<MedicalRecord, Error> {
        debug!("Updating medical record");
        let current = self.read(id).await?.ok_or(Error::RowNotFound)?;
        if data.visit_date.is_none()
            && data.chief_complaint.is_none()
            && data.diagnosis.is_none()
            && data.treatment.is_none()
            && data.vital_signs.is_none()
            && data.notes.is_none()
        {
            return Ok(current);
        }

        let mut query_builder = QueryBuilder::new("UPDATE medical_records SET ");
        let mut separated = query_builder.separated(", ");
        if let Some(visit_date) = data.visit_date {
            separated.push("visit_date = ");
            separated.push_bind_unseparated(visit_date);
        }
        if let Some(ref chief_complaint) = data.chief_complaint {
            separated.push("chief_complaint = ");
            separated.push_bind_unseparated(chief_complaint);
        }
        if let Some(ref diagnosis) = data.diagnosis {
            separated.push("diagnosis = ");
            separated.push_bind_unseparated(diagnosis);
        }
        if let Some(ref treatment) = data.treatment {
            separated.push("treatment = ");
            separated.push_bind_unseparated(treatment);
        }
        if let Some(ref vital_signs) = data.vital_signs {
            separated.push("vital_signs = ");
            separated.push_bind_unseparated(Json(vital_signs));
        }
        if let Some(ref notes) = data.notes {
            separated.push("notes = ");
            separated.push_bind_unseparated(notes);
        }
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND record_id = ");
        query_builder.push_bind(id.1);
        query_builder.build().execute(&self.connection_pool).await?;

        info!("Medical record updated successfully");
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for MedicalRecordRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, record_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM medical_records WHERE clinic_id = ? AND record_id = ?")
            .bind(id.0)
            .bind(id.1)
            .execute(&self.connection_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        info!("Medical record deleted");
        Ok(())
    }
}
