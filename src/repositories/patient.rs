//! PatientRepository - Anagrafica pazienti, sempre filtrata per clinica

use super::{Create, Delete, Read, Scoped, Update};
use crate::core::RowFilter;
use crate::dtos::{CreatePatientDTO, PageRequest, PatientListQuery, UpdatePatientDTO};
use crate::entities::Patient;
use sqlx::types::Json;
use sqlx::{Error, MySql, MySqlExecutor, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument};

const PATIENT_COLUMNS: &str = "patient_id, clinic_id, first_name, last_name, date_of_birth, gender, \
                               phone, email, address, blood_group, allergies, medical_history, \
                               assigned_doctor_id, emergency_contact_name, emergency_contact_phone, \
                               status, created_at, updated_at";

pub struct PatientRepository {
    connection_pool: MySqlPool,
}

/// INSERT condiviso tra la creazione diretta e la conversione di un lead (dentro transazione)
pub(crate) async fn insert_patient<'e, E: MySqlExecutor<'e>>(
    executor: E,
    clinic_id: i32,
    data: &CreatePatientDTO,
) -> Result<i32, Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO patients (
            clinic_id, first_name, last_name, date_of_birth, gender, phone, email, address,
            blood_group, allergies, medical_history, assigned_doctor_id,
            emergency_contact_name, emergency_contact_phone
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(clinic_id)
    .bind(&data.first_name)
    .bind(&data.last_name)
    .bind(data.date_of_birth)
    .bind(data.gender)
    .bind(&data.phone)
    .bind(&data.email)
    .bind(&data.address)
    .bind(&data.blood_group)
    .bind(Json(&data.allergies))
    .bind(&data.medical_history)
    .bind(data.assigned_doctor_id)
    .bind(&data.emergency_contact_name)
    .bind(&data.emergency_contact_phone)
    .execute(executor)
    .await?;

    Ok(result.last_insert_id() as i32)
}

impl PatientRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        filter: &RowFilter,
        query: &PatientListQuery,
    ) {
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);
        filter.push_sql(query_builder, "");

        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            query_builder.push(" AND (CONCAT(first_name, ' ', last_name) LIKE ");
            query_builder.push_bind(pattern.clone());
            query_builder.push(" OR phone LIKE ");
            query_builder.push_bind(pattern.clone());
            query_builder.push(" OR email LIKE ");
            query_builder.push_bind(pattern);
            query_builder.push(")");
        }
    }

    /// Lista paginata; restituisce anche il totale per la paginazione
    #[instrument(skip(self, filter, query), fields(clinic_id = %clinic_id))]
    pub async fn list(
        &self,
        clinic_id: i32,
        filter: &RowFilter,
        query: &PatientListQuery,
        page: PageRequest,
    ) -> Result<(Vec<Patient>, i64), Error> {
        debug!("Listing patients");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM patients");
        Self::push_list_filters(&mut count_query, clinic_id, filter, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM patients", PATIENT_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, filter, query);
        select.push(" ORDER BY last_name, first_name LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let patients = select
            .build_query_as::<Patient>()
            .fetch_all(&self.connection_pool)
            .await?;

        debug!("Found {} patients of {}", patients.len(), total);
        Ok((patients, total))
    }

    /// Numero di fatture intestate al paziente (una fattura impedisce la cancellazione)
    #[instrument(skip(self), fields(clinic_id = %clinic_id, patient_id = %patient_id))]
    pub async fn count_invoices(&self, clinic_id: i32, patient_id: i32) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoices WHERE clinic_id = ? AND patient_id = ?",
        )
        .bind(clinic_id)
        .bind(patient_id)
        .fetch_one(&self.connection_pool)
        .await?;

        Ok(count)
    }
}

impl Create<Patient, Scoped<CreatePatientDTO>> for PatientRepository {
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id))]
    async fn create(&self, data: &Scoped<CreatePatientDTO>) -> Result<Patient, Error> {
        debug!("Creating new patient");
        let new_id = insert_patient(&self.connection_pool, data.clinic_id, &data.data).await?;
        info!("Patient created with id {}", new_id);

        self.read(&(data.clinic_id, new_id))
            .await?
            .ok_or(Error::RowNotFound)
    }
}

impl Read<Patient, (i32, i32)> for PatientRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, patient_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Patient>, Error> {
        debug!("Reading patient");
        let sql = format!(
            "SELECT {} FROM patients WHERE clinic_id = ? AND patient_id = ?",
            PATIENT_COLUMNS
        );
        let patient = sqlx::query_as::<_, Patient>(&sql)
            .bind(id.0)
            .bind(id.1)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(patient)
    }
}

impl Update<Patient, UpdatePatientDTO, (i32, i32)> for PatientRepository {
    #[instrument(skip(self, data), fields(clinic_id = %id.0, patient_id = %id.1))]
    async fn update(&self, id: &(i32, i32), data: &UpdatePatientDTO) -> Result<Patient, Error> {
        debug!("Updating patient");
        let current = self.read(id).await?.ok_or(Error::RowNotFound)?;
        if data.is_empty() {
            debug!("No fields to update, returning current patient");
            return Ok(current);
        }

        let mut query_builder = QueryBuilder::new("UPDATE patients SET ");
        let mut separated = query_builder.separated(", ");
        if let Some(ref first_name) = data.first_name {
            separated.push("first_name = ");
            separated.push_bind_unseparated(first_name);
        }
        if let Some(ref last_name) = data.last_name {
            separated.push("last_name = ");
            separated.push_bind_unseparated(last_name);
        }
        if let Some(date_of_birth) = data.date_of_birth {
            separated.push("date_of_birth = ");
            separated.push_bind_unseparated(date_of_birth);
        }
        if let Some(gender) = data.gender {
            separated.push("gender = ");
            separated.push_bind_unseparated(gender);
        }
        if let Some(ref phone) = data.phone {
            separated.push("phone = ");
            separated.push_bind_unseparated(phone);
        }
        if let Some(ref email) = data.email {
            separated.push("email = ");
            separated.push_bind_unseparated(email);
        }
        if let Some(ref address) = data.address {
            separated.push("address = ");
            separated.push_bind_unseparated(address);
        }
        if let Some(ref blood_group) = data.blood_group {
            separated.push("blood_group = ");
            separated.push_bind_unseparated(blood_group);
        }
        if let Some(ref allergies) = data.allergies {
            separated.push("allergies = ");
            separated.push_bind_unseparated(Json(allergies));
        }
        if let Some(ref medical_history) = data.medical_history {
            separated.push("medical_history = ");
            separated.push_bind_unseparated(medical_history);
        }
        if let Some(doctor_id) = data.assigned_doctor_id {
            separated.push("assigned_doctor_id = ");
            separated.push_bind_unseparated(doctor_id);
        }
        if let Some(ref name) = data.emergency_contact_name {
            separated.push("emergency_contact_name = ");
            separated.push_bind_unseparated(name);
        }
        if let Some(ref phone) = data.emergency_contact_phone {
            separated.push("emergency_contact_phone = ");
            separated.push_bind_unseparated(phone);
        }
        if let Some(status) = data.status {
            separated.push("status = ");
            separated.push_bind_unseparated(status);
        }

        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND patient_id = ");
        query_builder.push_bind(id.1);
        query_builder.build().execute(&self.connection_pool).await?;

        info!("Patient updated successfully");
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for PatientRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, patient_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        debug!("Deleting patient");
        let mut tx = self.connection_pool.begin().await?;

        // i record clinici vengono cancellati in cascata insieme agli appuntamenti:
        // il collegamento va azzerato prima, altrimenti l'ordine della cascata è indefinito
        for table in ["prescriptions", "medical_records"] {
            let sql = format!(
                "UPDATE {} SET appointment_id = NULL WHERE clinic_id = ? AND patient_id = ? AND appointment_id IS NOT NULL",
                table
            );
            sqlx::query(&sql)
                .bind(id.0)
                .bind(id.1)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM patients WHERE clinic_id = ? AND patient_id = ?")
            .bind(id.0)
            .bind(id.1)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        tx.commit().await?;
        info!("Patient deleted");
        Ok(())
    }
}

#[cfg(all(test, feature = "db-tests"))]
mod tests {
    use super::*;
    use crate::core::row_filter;
    use crate::core::Resource;
    use crate::entities::Role;

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics", "patients")))]
    async fn doctor_lists_only_assigned_patients(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = PatientRepository::new(pool);
        let filter = row_filter(Role::Doctor, 2, Resource::Patient);
        let (patients, total) = repo
            .list(1, &filter, &PatientListQuery::default(), PageRequest::new(None, None))
            .await?;
        assert_eq!(total, 1);
        assert!(patients.iter().all(|p| p.assigned_doctor_id == Some(2)));
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics", "patients")))]
    async fn read_is_scoped_by_clinic(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = PatientRepository::new(pool);
        // il paziente 4 appartiene alla clinica 2
        assert!(repo.read(&(1, 4)).await?.is_none());
        assert!(repo.read(&(2, 4)).await?.is_some());
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics", "patients")))]
    async fn search_matches_full_name(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = PatientRepository::new(pool);
        let query = PatientListQuery {
            search: Some("Mario Ros".to_string()),
            ..Default::default()
        };
        let (patients, _) = repo
            .list(1, &RowFilter::ClinicWide, &query, PageRequest::new(None, None))
            .await?;
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].last_name, "Rossi");
        Ok(())
    }
}
