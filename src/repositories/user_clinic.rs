//! UserClinicRepository - Membership degli utenti nelle cliniche
//!
//! Chiave primaria composta `(user_id, clinic_id)`.

use super::{Delete, Read, Update};
use crate::dtos::UpdateMemberDTO;
use crate::entities::{ClinicMember, MembershipWithClinic, Role, UserClinic};
use sqlx::types::Json;
use sqlx::{Error, MySqlPool};
use tracing::{debug, info, instrument};

const MEMBERSHIP_COLUMNS: &str =
    "user_id, clinic_id, role, permissions, department_id, is_active, joined_at";

pub struct UserClinicRepository {
    connection_pool: MySqlPool,
}

impl UserClinicRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    /// Crea la membership se non esiste e la restituisce.
    /// Idempotente anche con richieste concorrenti: il secondo INSERT non modifica nulla.
    #[instrument(skip(self), fields(user_id = %user_id, clinic_id = %clinic_id))]
    pub async fn ensure_membership(
        &self,
        user_id: i32,
        clinic_id: i32,
        role: Role,
    ) -> Result<UserClinic, Error> {
        debug!("Ensuring membership");
        sqlx::query(
            r#"
            INSERT INTO user_clinics (user_id, clinic_id, role, permissions)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE user_id = user_id
            "#,
        )
        .bind(user_id)
        .bind(clinic_id)
        .bind(role)
        .bind(Json(role.default_permissions()))
        .execute(&self.connection_pool)
        .await?;

        self.read(&(user_id, clinic_id))
            .await?
            .ok_or(Error::RowNotFound)
    }

    /// Aggiunge un membro; fallisce con violazione di unicità se esiste già
    #[instrument(skip(self, permissions), fields(user_id = %user_id, clinic_id = %clinic_id))]
    pub async fn add_member(
        &self,
        user_id: i32,
        clinic_id: i32,
        role: Role,
        permissions: Vec<String>,
    ) -> Result<UserClinic, Error> {
        debug!("Adding member to clinic");
        sqlx::query(
            "INSERT INTO user_clinics (user_id, clinic_id, role, permissions) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(clinic_id)
        .bind(role)
        .bind(Json(permissions))
        .execute(&self.connection_pool)
        .await?;

        info!("Member added");
        self.read(&(user_id, clinic_id))
            .await?
            .ok_or(Error::RowNotFound)
    }

    /// Membri della clinica con nome ed email
    #[instrument(skip(self), fields(clinic_id = %clinic_id))]
    pub async fn list_members(&self, clinic_id: i32) -> Result<Vec<ClinicMember>, Error> {
        debug!("Listing clinic members");
        let members = sqlx::query_as::<_, ClinicMember>(
            r#"
            SELECT uc.user_id, uc.clinic_id, u.name, u.email, uc.role, uc.permissions,
                   uc.department_id, uc.is_active, uc.joined_at
            FROM user_clinics uc
            INNER JOIN users u ON u.user_id = uc.user_id
            WHERE uc.clinic_id = ?
            ORDER BY u.name
            "#,
        )
        .bind(clinic_id)
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(members)
    }

    /// Cliniche attive di cui l'utente è membro attivo
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<MembershipWithClinic>, Error> {
        debug!("Listing clinics of user");
        let clinics = sqlx::query_as::<_, MembershipWithClinic>(
            r#"
            SELECT c.clinic_id, c.name AS clinic_name, c.code AS clinic_code, uc.role,
                   c.owner_id, uc.joined_at
            FROM user_clinics uc
            INNER JOIN clinics c ON c.clinic_id = uc.clinic_id
            WHERE uc.user_id = ? AND uc.is_active = TRUE AND c.is_active = TRUE
            ORDER BY c.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(clinics)
    }

    /// Vero se `user_id` è un membro attivo della clinica con uno dei ruoli indicati
    #[instrument(skip(self, roles), fields(clinic_id = %clinic_id, user_id = %user_id))]
    pub async fn has_active_role(
        &self,
        clinic_id: i32,
        user_id: i32,
        roles: &[Role],
    ) -> Result<bool, Error> {
        let membership = self.read(&(user_id, clinic_id)).await?;
        Ok(membership.is_some_and(|m| m.is_active && roles.contains(&m.role.in_clinic())))
    }
}

impl Read<UserClinic, (i32, i32)> for UserClinicRepository {
    #[instrument(skip(self), fields(user_id = %id.0, clinic_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<UserClinic>, Error> {
        debug!("Reading membership");
        let sql = format!(
            "SELECT {} FROM user_clinics WHERE user_id = ? AND clinic_id = ?",
            MEMBERSHIP_COLUMNS
        );
        let membership = sqlx::query_as::<_, UserClinic>(&sql)
            .bind(id.0)
            .bind(id.1)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(membership)
    }
}

impl Update<UserClinic, UpdateMemberDTO, (i32, i32)> for UserClinicRepository {
    #[instrument(skip(self, data), fields(user_id = %id.0, clinic_id = %id.1))]
    async fn update(&self, id: &(i32, i32), data: &UpdateMemberDTO) -> Result<UserClinic, Error> {
        debug!("Updating membership");
        let current = self.read(id).await?.ok_or(Error::RowNotFound)?;

        if data.role.is_none()
            && data.permissions.is_none()
            && data.department_id.is_none()
            && data.is_active.is_none()
        {
            debug!("No fields to update, returning current membership");
            return Ok(current);
        }

        let mut query_builder = sqlx::QueryBuilder::new("UPDATE user_clinics SET ");
        let mut separated = query_builder.separated(", ");
        if let Some(role) = data.role {
            separated.push("role = ");
            separated.push_bind_unseparated(role);
        }
        if let Some(ref permissions) = data.permissions {
            separated.push("permissions = ");
            separated.push_bind_unseparated(Json(permissions.clone()));
        }
        if let Some(department_id) = data.department_id {
            separated.push("department_id = ");
            separated.push_bind_unseparated(department_id);
        }
        if let Some(is_active) = data.is_active {
            separated.push("is_active = ");
            separated.push_bind_unseparated(is_active);
        }
        query_builder.push(" WHERE user_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND clinic_id = ");
        query_builder.push_bind(id.1);
        query_builder.build().execute(&self.connection_pool).await?;

        info!("Membership updated successfully");
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for UserClinicRepository {
    /// Rimuove l'utente dalla clinica. Nella stessa transazione:
    /// - se la clinica era quella di default dell'utente, il default viene azzerato;
    /// - l'utente smette di essere responsabile dei reparti della clinica;
    /// - un super_admin riceverebbe subito una nuova membership, quindi la sua viene disattivata.
    #[instrument(skip(self), fields(user_id = %id.0, clinic_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        debug!("Deleting membership");
        let mut tx = self.connection_pool.begin().await?;

        let global_role: Role =
            sqlx::query_scalar("SELECT role FROM users WHERE user_id = ? FOR UPDATE")
                .bind(id.0)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(Error::RowNotFound)?;

        let sql = if global_role == Role::SuperAdmin {
            "UPDATE user_clinics SET is_active = FALSE WHERE user_id = ? AND clinic_id = ?"
        } else {
            "DELETE FROM user_clinics WHERE user_id = ? AND clinic_id = ?"
        };
        let result = sqlx::query(sql)
            .bind(id.0)
            .bind(id.1)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }

        sqlx::query("UPDATE departments SET head_id = NULL WHERE clinic_id = ? AND head_id = ?")
            .bind(id.1)
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE users SET default_clinic_id = NULL WHERE user_id = ? AND default_clinic_id = ?",
        )
        .bind(id.0)
        .bind(id.1)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("Membership deleted");
        Ok(())
    }
}
