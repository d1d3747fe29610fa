//! PayrollRepository - Buste paga dei dipendenti della clinica

use super::{Create, Delete, Read, Scoped, Update};
use crate::core::RowFilter;
use crate::dtos::{CreatePayrollDTO, PageRequest, PayrollListQuery, UpdatePayrollDTO};
use crate::entities::payroll::net_salary;
use crate::entities::Payroll;
use sqlx::{Error, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument, warn};

const PAYROLL_COLUMNS: &str = "payroll_id, clinic_id, employee_id, period_start, period_end, base_salary, \
                               allowances, deductions, net_salary, status, paid_at, notes, \
                               created_at, updated_at";

pub struct PayrollRepository {
    connection_pool: MySqlPool,
}

impl PayrollRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        filter: &RowFilter,
        query: &PayrollListQuery,
    ) {
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);
        filter.push_sql(query_builder, "");
        if let Some(employee_id) = query.employee_id {
            query_builder.push(" AND employee_id = ");
            query_builder.push_bind(employee_id);
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
        query: &PayrollListQuery,
        page: PageRequest,
    ) -> Result<(Vec<Payroll>, i64), Error> {
        debug!("Listing payroll entries");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM payroll");
        Self::push_list_filters(&mut count_query, clinic_id, filter, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM payroll", PAYROLL_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, filter, query);
        select.push(" ORDER BY period_start DESC, employee_id LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let entries = select
            .build_query_as::<Payroll>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((entries, total))
    }

    /// Segna come pagata una busta ancora `pending`; `false` se lo stato non lo consente
    #[instrument(skip(self), fields(clinic_id = %id.0, payroll_id = %id.1))]
    pub async fn mark_paid(&self, id: &(i32, i32)) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE payroll SET status = 'paid', paid_at = CURRENT_TIMESTAMP(6)
            WHERE clinic_id = ? AND payroll_id = ? AND status = 'pending'
            "#,
        )
        .bind(id.0)
        .bind(id.1)
        .execute(&self.connection_pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!("Payroll entry is not pending");
            return Ok(false);
        }
        info!("Payroll entry marked as paid");
        Ok(true)
    }
}

impl Create<Payroll, Scoped<CreatePayrollDTO>> for PayrollRepository {
    /// Il netto viene calcolato qui; un netto negativo produce `Error::Protocol`
    /// ma il service lo verifica prima con [`net_salary`].
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id, employee_id = %data.data.employee_id))]
    async fn create(&self, data: &Scoped<CreatePayrollDTO>) -> Result<Payroll, Error> {
        debug!("Creating payroll entry");
        let entry = &data.data;
        let net = net_salary(entry.base_salary, entry.allowances, entry.deductions)
            .ok_or_else(|| Error::Protocol("negative net salary".to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO payroll (
                clinic_id, employee_id, period_start, period_end, base_salary, allowances,
                deductions, net_salary, notes
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(entry.employee_id)
        .bind(entry.period_start)
        .bind(entry.period_end)
        .bind(entry.base_salary)
        .bind(entry.allowances)
        .bind(entry.deductions)
        .bind(net)
        .bind(&entry.notes)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;
        info!("Payroll entry created with id {}", new_id);
        self.read(&(data.clinic_id, new_id))
            .await?
            .ok_or(Error::RowNotFound)
    }
}

impl Read<Payroll, (i32, i32)> for PayrollRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, payroll_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Payroll>, Error> {
        let sql = format!(
            "SELECT {} FROM payroll WHERE clinic_id = ? AND payroll_id = ?",
            PAYROLL_COLUMNS
        );
        sqlx::query_as::<_, Payroll>(&sql)
            .bind(id.0)
            .bind(id.1)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Update<Payroll, UpdatePayrollDTO, (i32, i32)> for PayrollRepository {
    /// Aggiorna solo buste `pending`. Il netto viene ricalcolato in SQL: MySQL valuta
    /// le assegnazioni della SET da sinistra a destra, quindi vede i nuovi importi.
    #[instrument(skip(self, data), fields(clinic_id = %id.0, payroll_id = %id.1))]
    async fn update(&self, id: &(i32, i32), data: &UpdatePayrollDTO) -> Result<Payroll, Error> {
        debug!("Updating payroll entry");
        let mut query_builder = QueryBuilder::<MySql>::new("UPDATE payroll SET ");
        let mut separated = query_builder.separated(", ");
        if let Some(period_start) = data.period_start {
            separated.push("period_start = ");
            separated.push_bind_unseparated(period_start);
        }
        if let Some(period_end) = data.period_end {
            separated.push("period_end = ");
            separated.push_bind_unseparated(period_end);
        }
        if let Some(base_salary) = data.base_salary {
            separated.push("base_salary = ");
            separated.push_bind_unseparated(base_salary);
        }
        if let Some(allowances) = data.allowances {
            separated.push("allowances = ");
            separated.push_bind_unseparated(allowances);
        }
        if let Some(deductions) = data.deductions {
            separated.push("deductions = ");
            separated.push_bind_unseparated(deductions);
        }
        if let Some(status) = data.status {
            separated.push("status = ");
            separated.push_bind_unseparated(status);
        }
        if let Some(ref notes) = data.notes {
            separated.push("notes = ");
            separated.push_bind_unseparated(notes);
        }
        separated.push("net_salary = ROUND(base_salary + allowances - deductions, 2)");
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND payroll_id = ");
        query_builder.push_bind(id.1);
        query_builder.push(" AND status = 'pending'");

        let result = query_builder.build().execute(&self.connection_pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        info!("Payroll entry updated");
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for PayrollRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, payroll_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM payroll WHERE clinic_id = ? AND payroll_id = ?")
            .bind(id.0)
            .bind(id.1)
            .execute(&self.connection_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        info!("Payroll entry deleted");
        Ok(())
    }
}

#[cfg(all(test, feature = "db-tests"))]
mod tests {
    use super::*;
    use crate::entities::PayrollStatus;
    use chrono::NaiveDate;

    fn entry() -> Scoped<CreatePayrollDTO> {
        Scoped::new(
            1,
            7,
            CreatePayrollDTO {
                employee_id: 4,
                period_start: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                period_end: NaiveDate::from_ymd_opt(2026, 5, 31).unwrap(),
                base_salary: 2000.0,
                allowances: 150.0,
                deductions: 300.0,
                notes: None,
            },
        )
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics")))]
    async fn update_recomputes_net_salary(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = PayrollRepository::new(pool);
        let created = repo.create(&entry()).await?;
        assert_eq!(created.net_salary, 1850.0);

        let update = UpdatePayrollDTO {
            deductions: Some(50.0),
            ..Default::default()
        };
        let updated = repo.update(&(1, created.payroll_id), &update).await?;
        assert_eq!(updated.net_salary, 2100.0);
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics")))]
    async fn paid_entries_are_frozen(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = PayrollRepository::new(pool);
        let created = repo.create(&entry()).await?;
        let id = (1, created.payroll_id);

        assert!(repo.mark_paid(&id).await?);
        assert!(!repo.mark_paid(&id).await?);
        let paid = repo.read(&id).await?.unwrap();
        assert_eq!(paid.status, PayrollStatus::Paid);
        assert!(paid.paid_at.is_some());

        let err = repo.update(&id, &UpdatePayrollDTO::default()).await.unwrap_err();
        assert!(matches!(err, Error::RowNotFound));
        Ok(())
    }
}
