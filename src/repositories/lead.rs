//! LeadRepository - Contatti commerciali e conversione in pazienti

use super::patient::insert_patient;
use super::{Create, Delete, Read, Scoped, Update};
use crate::core::RowFilter;
use crate::dtos::{
    ConvertLeadDTO, CreateLeadDTO, CreatePatientDTO, LeadListQuery, PageRequest, UpdateLeadDTO,
};
use crate::entities::{Lead, LeadSource, LeadStatus};
use sqlx::{Error, MySql, MySqlConnection, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument, warn};

const LEAD_COLUMNS: &str = "lead_id, clinic_id, name, phone, email, source, status, interest, notes, \
                            assigned_to, follow_up_date, converted_patient_id, created_at, updated_at";

/// Esito della conversione di un lead
#[derive(Debug)]
pub enum ConversionOutcome {
    Converted { lead: Lead, patient_id: i32 },
    AlreadyConverted { patient_id: Option<i32> },
}

pub struct LeadRepository {
    connection_pool: MySqlPool,
}

impl LeadRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    async fn read_with(
        conn: &mut MySqlConnection,
        clinic_id: i32,
        lead_id: i32,
        for_update: bool,
    ) -> Result<Option<Lead>, Error> {
        let sql = format!(
            "SELECT {} FROM leads WHERE clinic_id = ? AND lead_id = ?{}",
            LEAD_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, Lead>(&sql)
            .bind(clinic_id)
            .bind(lead_id)
            .fetch_optional(conn)
            .await
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        filter: &RowFilter,
        query: &LeadListQuery,
    ) {
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);
        filter.push_sql(query_builder, "");
        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
        }
        if let Some(source) = query.source {
            query_builder.push(" AND source = ");
            query_builder.push_bind(source);
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            query_builder.push(" AND (name LIKE ");
            query_builder.push_bind(pattern.clone());
            query_builder.push(" OR phone LIKE ");
            query_builder.push_bind(pattern.clone());
            query_builder.push(" OR email LIKE ");
            query_builder.push_bind(pattern);
            query_builder.push(")");
        }
    }

    #[instrument(skip(self, filter, query), fields(clinic_id = %clinic_id))]
    pub async fn list(
        &self,
        clinic_id: i32,
        filter: &RowFilter,
        query: &LeadListQuery,
        page: PageRequest,
    ) -> Result<(Vec<Lead>, i64), Error> {
        debug!("Listing leads");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM leads");
        Self::push_list_filters(&mut count_query, clinic_id, filter, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM leads", LEAD_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, filter, query);
        select.push(" ORDER BY created_at DESC, lead_id DESC LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let leads = select
            .build_query_as::<Lead>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((leads, total))
    }

    /// Converte il lead in paziente in un'unica transazione: la riga del lead resta
    /// bloccata finché il paziente non è creato, quindi due conversioni concorrenti
    /// producono un solo paziente.
    #[instrument(skip(self, data), fields(clinic_id = %id.0, lead_id = %id.1))]
    pub async fn convert(
        &self,
        id: &(i32, i32),
        data: &ConvertLeadDTO,
    ) -> Result<ConversionOutcome, Error> {
        debug!("Converting lead to patient");
        let mut tx = self.connection_pool.begin().await?;

        // 1. Lock del lead
        let lead = Self::read_with(&mut tx, id.0, id.1, true)
            .await?
            .ok_or(Error::RowNotFound)?;
        if lead.status == LeadStatus::Converted {
            warn!("Lead already converted");
            return Ok(ConversionOutcome::AlreadyConverted {
                patient_id: lead.converted_patient_id,
            });
        }

        // 2. Nuovo paziente con i dati del lead
        let (first_name, last_name) = lead.split_name();
        let patient = CreatePatientDTO {
            first_name,
            last_name,
            date_of_birth: data.date_of_birth,
            gender: data.gender,
            phone: lead.phone.clone(),
            email: lead.email.clone(),
            address: None,
            blood_group: None,
            allergies: Vec::new(),
            medical_history: lead.notes.clone(),
            assigned_doctor_id: data.assigned_doctor_id,
            emergency_contact_name: None,
            emergency_contact_phone: None,
        };
        let patient_id = insert_patient(&mut *tx, id.0, &patient).await?;

        // 3. Lead chiuso
        sqlx::query(
            "UPDATE leads SET status = 'converted', converted_patient_id = ? WHERE lead_id = ?",
        )
        .bind(patient_id)
        .bind(id.1)
        .execute(&mut *tx)
        .await?;

        let lead = Self::read_with(&mut tx, id.0, id.1, false)
            .await?
            .ok_or(Error::RowNotFound)?;
        tx.commit().await?;

        info!("Lead converted into patient {}", patient_id);
        Ok(ConversionOutcome::Converted { lead, patient_id })
    }
}

impl Create<Lead, Scoped<CreateLeadDTO>> for LeadRepository {
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id))]
    async fn create(&self, data: &Scoped<CreateLeadDTO>) -> Result<Lead, Error> {
        debug!("Creating lead");
        let lead = &data.data;
        let result = sqlx::query(
            r#"
            INSERT INTO leads (
                clinic_id, name, phone, email, source, interest, notes, assigned_to, follow_up_date
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(&lead.name)
        .bind(&lead.phone)
        .bind(&lead.email)
        .bind(lead.source.unwrap_or(LeadSource::Other))
        .bind(&lead.interest)
        .bind(&lead.notes)
        .bind(lead.assigned_to)
        .bind(lead.follow_up_date)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;
        info!("Lead created with id {}", new_id);
        self.read(&(data.clinic_id, new_id))
            .await?
            .ok_or(Error::RowNotFound)
    }
}

impl Read<Lead, (i32, i32)> for LeadRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, lead_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Lead>, Error> {
        let mut conn = self.connection_pool.acquire().await?;
        Self::read_with(&mut conn, id.0, id.1, false).await
    }
}

impl Update<Lead, UpdateLeadDTO, (i32, i32)> for LeadRepository {
    #[instrument(skip(self, data), fields(clinic_id = %id.0, lead_id = %id.1))]
    async fn update(&self, id: &(i32, i32), data: &UpdateLeadDTO) -> Result<Lead, Error> {
        debug!("Updating lead");
        let mut query_builder = QueryBuilder::<MySql>::new("UPDATE leads SET ");
        let mut separated = query_builder.separated(", ");
        separated.push("updated_at = CURRENT_TIMESTAMP(6)");
        if let Some(ref name) = data.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }
        if let Some(ref phone) = data.phone {
            separated.push("phone = ");
            separated.push_bind_unseparated(phone);
        }
        if let Some(ref email) = data.email {
            separated.push("email = ");
            separated.push_bind_unseparated(email);
        }
        if let Some(source) = data.source {
            separated.push("source = ");
            separated.push_bind_unseparated(source);
        }
        if let Some(status) = data.status {
            separated.push("status = ");
            separated.push_bind_unseparated(status);
        }
        if let Some(ref interest) = data.interest {
            separated.push("interest = ");
            separated.push_bind_unseparated(interest);
        }
        if let Some(ref notes) = data.notes {
            separated.push("notes = ");
            separated.push_bind_unseparated(notes);
        }
        if let Some(assigned_to) = data.assigned_to {
            separated.push("assigned_to = ");
            separated.push_bind_unseparated(assigned_to);
        }
        if let Some(follow_up_date) = data.follow_up_date {
            separated.push("follow_up_date = ");
            separated.push_bind_unseparated(follow_up_date);
        }
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND lead_id = ");
        query_builder.push_bind(id.1);

        let result = query_builder.build().execute(&self.connection_pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for LeadRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, lead_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM leads WHERE clinic_id = ? AND lead_id = ?")
            .bind(id.0)
            .bind(id.1)
            .execute(&self.connection_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        info!("Lead deleted");
        Ok(())
    }
}

#[cfg(all(test, feature = "db-tests"))]
mod tests {
    use super::*;

    fn new_lead() -> Scoped<CreateLeadDTO> {
        Scoped::new(
            1,
            5,
            CreateLeadDTO {
                name: "Anna Maria Gialli".to_string(),
                phone: "+393331234567".to_string(),
                email: Some("anna@example.com".to_string()),
                source: Some(LeadSource::Website),
                interest: Some("Whitening".to_string()),
                notes: None,
                assigned_to: Some(6),
                follow_up_date: None,
            },
        )
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics")))]
    async fn conversion_creates_patient_once(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = LeadRepository::new(pool.clone());
        let lead = repo.create(&new_lead()).await?;
        let id = (1, lead.lead_id);

        let patient_id = match repo.convert(&id, &ConvertLeadDTO::default()).await? {
            ConversionOutcome::Converted { lead, patient_id } => {
                assert_eq!(lead.status, LeadStatus::Converted);
                assert_eq!(lead.converted_patient_id, Some(patient_id));
                patient_id
            }
            other => panic!("unexpected outcome: {:?}", other),
        };

        let (first, last): (String, String) = sqlx::query_as(
            "SELECT first_name, last_name FROM patients WHERE clinic_id = 1 AND patient_id = ?",
        )
        .bind(patient_id)
        .fetch_one(&pool)
        .await?;
        assert_eq!((first.as_str(), last.as_str()), ("Anna Maria", "Gialli"));

        assert!(matches!(
            repo.convert(&id, &ConvertLeadDTO::default()).await?,
            ConversionOutcome::AlreadyConverted { patient_id: Some(p) } if p == patient_id
        ));
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics")))]
    async fn staff_sees_only_assigned_leads(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = LeadRepository::new(pool);
        repo.create(&new_lead()).await?;
        let mut unassigned = new_lead();
        unassigned.data.assigned_to = None;
        repo.create(&unassigned).await?;

        let filter = crate::core::row_filter(crate::entities::Role::Staff, 6, crate::core::Resource::Lead);
        let (leads, total) = repo
            .list(1, &filter, &LeadListQuery::default(), PageRequest::new(None, None))
            .await?;
        assert_eq!(total, 1);
        assert_eq!(leads[0].assigned_to, Some(6));
        Ok(())
    }
}
