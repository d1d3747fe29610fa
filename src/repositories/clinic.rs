//! ClinicRepository - Repository per le cliniche (tenant)

use super::{Create, Read, Scoped, Update};
use crate::dtos::{CreateClinicDTO, UpdateClinicDTO};
use crate::entities::{Clinic, Role};
use sqlx::types::Json;
use sqlx::{Error, MySqlPool};
use tracing::{debug, info, instrument};

const CLINIC_COLUMNS: &str = "clinic_id, name, code, address, phone, email, owner_id, currency, \
                              timezone, is_active, created_at, updated_at";

pub struct ClinicRepository {
    connection_pool: MySqlPool,
}

impl ClinicRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }
}

impl Create<Clinic, Scoped<CreateClinicDTO>> for ClinicRepository {
    /// Crea la clinica, iscrive il creatore come owner/admin e la imposta come sua clinica
    /// di default se non ne ha già una. Tutto in un'unica transazione.
    #[instrument(skip(self, data), fields(owner_id = %data.user_id))]
    async fn create(&self, data: &Scoped<CreateClinicDTO>) -> Result<Clinic, Error> {
        debug!("Creating new clinic");
        let owner_id = data.user_id;
        let clinic = &data.data;
        let mut tx = self.connection_pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO clinics (name, code, address, phone, email, owner_id, currency, timezone)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&clinic.name)
        .bind(&clinic.code)
        .bind(&clinic.address)
        .bind(&clinic.phone)
        .bind(&clinic.email)
        .bind(owner_id)
        .bind(clinic.currency.as_deref().unwrap_or("EUR"))
        .bind(clinic.timezone.as_deref().unwrap_or("UTC"))
        .execute(&mut *tx)
        .await?;
        let clinic_id = result.last_insert_id() as i32;

        sqlx::query(
            "INSERT INTO user_clinics (user_id, clinic_id, role, permissions) VALUES (?, ?, ?, ?)",
        )
        .bind(owner_id)
        .bind(clinic_id)
        .bind(Role::Admin)
        .bind(Json(Role::Admin.default_permissions()))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE users SET default_clinic_id = ? WHERE user_id = ? AND default_clinic_id IS NULL",
        )
        .bind(clinic_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        let sql = format!("SELECT {} FROM clinics WHERE clinic_id = ?", CLINIC_COLUMNS);
        let created = sqlx::query_as::<_, Clinic>(&sql)
            .bind(clinic_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Clinic created with id {}", clinic_id);
        Ok(created)
    }
}

impl Read<Clinic, i32> for ClinicRepository {
    #[instrument(skip(self), fields(clinic_id = %id))]
    async fn read(&self, id: &i32) -> Result<Option<Clinic>, Error> {
        debug!("Reading clinic by id");
        let sql = format!("SELECT {} FROM clinics WHERE clinic_id = ?", CLINIC_COLUMNS);
        let clinic = sqlx::query_as::<_, Clinic>(&sql)
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(clinic)
    }
}

impl Update<Clinic, UpdateClinicDTO, i32> for ClinicRepository {
    #[instrument(skip(self, data), fields(clinic_id = %id))]
    async fn update(&self, id: &i32, data: &UpdateClinicDTO) -> Result<Clinic, Error> {
        debug!("Updating clinic");
        let current = self.read(id).await?.ok_or(Error::RowNotFound)?;

        let mut query_builder = sqlx::QueryBuilder::new("UPDATE clinics SET ");
        let mut separated = query_builder.separated(", ");
        let mut changed = false;
        if let Some(ref name) = data.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
            changed = true;
        }
        if let Some(ref address) = data.address {
            separated.push("address = ");
            separated.push_bind_unseparated(address);
            changed = true;
        }
        if let Some(ref phone) = data.phone {
            separated.push("phone = ");
            separated.push_bind_unseparated(phone);
            changed = true;
        }
        if let Some(ref email) = data.email {
            separated.push("email = ");
            separated.push_bind_unseparated(email);
            changed = true;
        }
        if let Some(ref currency) = data.currency {
            separated.push("currency = ");
            separated.push_bind_unseparated(currency);
            changed = true;
        }
        if let Some(ref timezone) = data.timezone {
            separated.push("timezone = ");
            separated.push_bind_unseparated(timezone);
            changed = true;
        }
        if let Some(is_active) = data.is_active {
            separated.push("is_active = ");
            separated.push_bind_unseparated(is_active);
            changed = true;
        }

        if !changed {
            debug!("No fields to update, returning current clinic");
            return Ok(current);
        }

        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id);
        query_builder.build().execute(&self.connection_pool).await?;

        info!("Clinic updated successfully");
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}
