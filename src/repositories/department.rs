//! DepartmentRepository - Reparti della clinica

use super::{Create, Delete, Read, Scoped, Update};
use crate::dtos::{CreateDepartmentDTO, UpdateDepartmentDTO};
use crate::entities::Department;
use sqlx::{Error, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument};

/// Colonne di `departments d` più il numero di membri attivi assegnati
const DEPARTMENT_COLUMNS: &str = "d.department_id, d.clinic_id, d.name, d.description, d.head_id, \
                                  d.is_active, \
                                  (SELECT COUNT(*) FROM user_clinics uc \
                                   WHERE uc.clinic_id = d.clinic_id \
                                     AND uc.department_id = d.department_id \
                                     AND uc.is_active = TRUE) AS member_count, \
                                  d.created_at, d.updated_at";

pub struct DepartmentRepository {
    connection_pool: MySqlPool,
}

impl DepartmentRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    #[instrument(skip(self), fields(clinic_id = %clinic_id))]
    pub async fn list(&self, clinic_id: i32) -> Result<Vec<Department>, Error> {
        debug!("Listing departments");
        let sql = format!(
            "SELECT {} FROM departments d WHERE d.clinic_id = ? ORDER BY d.name",
            DEPARTMENT_COLUMNS
        );
        sqlx::query_as::<_, Department>(&sql)
            .bind(clinic_id)
            .fetch_all(&self.connection_pool)
            .await
    }
}

impl Create<Department, Scoped<CreateDepartmentDTO>> for DepartmentRepository {
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id))]
    async fn create(&self, data: &Scoped<CreateDepartmentDTO>) -> Result<Department, Error> {
        debug!("Creating department");
        let department = &data.data;
        let result = sqlx::query(
            "INSERT INTO departments (clinic_id, name, description, head_id) VALUES (?, ?, ?, ?)",
        )
        .bind(data.clinic_id)
        .bind(&department.name)
        .bind(&department.description)
        .bind(department.head_id)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;
        info!("Department created with id {}", new_id);
        self.read(&(data.clinic_id, new_id))
            .await?
            .ok_or(Error::RowNotFound)
    }
}

impl Read<Department, (i32, i32)> for DepartmentRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, department_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Department>, Error> {
        let sql = format!(
            "SELECT {} FROM departments d WHERE d.clinic_id = ? AND d.department_id = ?",
            DEPARTMENT_COLUMNS
        );
        sqlx::query_as::<_, Department>(&sql)
            .bind(id.0)
            .bind(id.1)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Update<Department, UpdateDepartmentDTO, (i32, i32)> for DepartmentRepository {
    #[instrument(skip(self, data), fields(clinic_id = %id.0, department_id = %id.1))]
    async fn update(
        &self,
        id: &(i32, i32),
        data: &UpdateDepartmentDTO,
    ) -> Result<Department, Error> {
        debug!("Updating department");
        let mut query_builder = QueryBuilder::<MySql>::new("UPDATE departments SET ");
        let mut separated = query_builder.separated(", ");
        separated.push("updated_at = CURRENT_TIMESTAMP(6)");
        if let Some(ref name) = data.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }
        if let Some(ref description) = data.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description);
        }
        if let Some(head_id) = data.head_id {
            separated.push("head_id = ");
            separated.push_bind_unseparated(head_id);
        }
        if let Some(is_active) = data.is_active {
            separated.push("is_active = ");
            separated.push_bind_unseparated(is_active);
        }
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND department_id = ");
        query_builder.push_bind(id.1);

        let result = query_builder.build().execute(&self.connection_pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for DepartmentRepository {
    /// I membri del reparto restano nella clinica, senza reparto
    #[instrument(skip(self), fields(clinic_id = %id.0, department_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        let mut tx = self.connection_pool.begin().await?;
        sqlx::query(
            "UPDATE user_clinics SET department_id = NULL WHERE clinic_id = ? AND department_id = ?",
        )
        .bind(id.0)
        .bind(id.1)
        .execute(&mut *tx)
        .await?;

        let result =
            sqlx::query("DELETE FROM departments WHERE clinic_id = ? AND department_id = ?")
                .bind(id.0)
                .bind(id.1)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        tx.commit().await?;

        info!("Department deleted");
        Ok(())
    }
}

#[cfg(all(test, feature = "db-tests"))]
mod tests {
    use super::*;
    use crate::dtos::UpdateMemberDTO;
    use crate::repositories::UserClinicRepository;

    fn department(name: &str) -> Scoped<CreateDepartmentDTO> {
        Scoped::new(
            1,
            1,
            CreateDepartmentDTO {
                name: name.to_string(),
                description: None,
                head_id: Some(2),
            },
        )
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics")))]
    async fn member_count_follows_assignments(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = DepartmentRepository::new(pool.clone());
        let members = UserClinicRepository::new(pool);

        let ortho = repo.create(&department("Ortodonzia")).await?;
        assert_eq!(ortho.member_count, 0);

        let assign = UpdateMemberDTO {
            department_id: Some(Some(ortho.department_id)),
            ..Default::default()
        };
        members.update(&(2, 1), &assign).await?;
        members.update(&(4, 1), &assign).await?;

        let ortho = repo.read(&(1, ortho.department_id)).await?.unwrap();
        assert_eq!(ortho.member_count, 2);

        // cancellando il reparto i membri restano nella clinica
        repo.delete(&(1, ortho.department_id)).await?;
        let nurse = members.read(&(4, 1)).await?.unwrap();
        assert_eq!(nurse.department_id, None);
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics")))]
    async fn departments_are_scoped_by_clinic(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = DepartmentRepository::new(pool);
        let ortho = repo.create(&department("Ortodonzia")).await?;

        assert!(repo.read(&(2, ortho.department_id)).await?.is_none());
        assert!(repo.list(2).await?.is_empty());
        assert!(matches!(
            repo.delete(&(2, ortho.department_id)).await,
            Err(Error::RowNotFound)
        ));
        Ok(())
    }
}
