//! ExpenseRepository - Spese della clinica

use super::{Create, Delete, Read, Scoped, Update};
use crate::dtos::{CreateExpenseDTO, ExpenseListQuery, PageRequest, UpdateExpenseDTO};
use crate::entities::Expense;
use chrono::Utc;
use sqlx::{Error, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument};

const EXPENSE_COLUMNS: &str = "expense_id, clinic_id, category, description, amount, expense_date, \
                               payment_method, vendor, notes, created_by, created_at, updated_at";

pub struct ExpenseRepository {
    connection_pool: MySqlPool,
}

impl ExpenseRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        query: &ExpenseListQuery,
    ) {
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);
        if let Some(category) = query.category {
            query_builder.push(" AND category = ");
            query_builder.push_bind(category);
        }
        if let Some(from) = query.from {
            query_builder.push(" AND expense_date >= ");
            query_builder.push_bind(from);
        }
        if let Some(to) = query.to {
            query_builder.push(" AND expense_date <= ");
            query_builder.push_bind(to);
        }
    }

    #[instrument(skip(self, query), fields(clinic_id = %clinic_id))]
    pub async fn list(
        &self,
        clinic_id: i32,
        query: &ExpenseListQuery,
        page: PageRequest,
    ) -> Result<(Vec<Expense>, i64), Error> {
        debug!("Listing expenses");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM expenses");
        Self::push_list_filters(&mut count_query, clinic_id, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM expenses", EXPENSE_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, query);
        select.push(" ORDER BY expense_date DESC, expense_id DESC LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let expenses = select
            .build_query_as::<Expense>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((expenses, total))
    }
}

impl Create<Expense, Scoped<CreateExpenseDTO>> for ExpenseRepository {
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id))]
    async fn create(&self, data: &Scoped<CreateExpenseDTO>) -> Result<Expense, Error> {
        debug!("Creating expense");
        let expense = &data.data;
        let result = sqlx::query(
            r#"
            INSERT INTO expenses (
                clinic_id, category, description, amount, expense_date, payment_method,
                vendor, notes, created_by
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(expense.category)
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(expense.expense_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(expense.payment_method)
        .bind(&expense.vendor)
        .bind(&expense.notes)
        .bind(data.user_id)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;
        info!("Expense created with id {}", new_id);
        self.read(&(data.clinic_id, new_id))
            .await?
            .ok_or(Error::RowNotFound)
    }
}

impl Read<Expense, (i32, i32)> for ExpenseRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, expense_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Expense>, Error> {
        let sql = format!(
            "SELECT {} FROM expenses WHERE clinic_id = ? AND expense_id = ?",
            EXPENSE_COLUMNS
        );
        sqlx::query_as::<_, Expense>(&sql)
            .bind(id.0)
            .bind(id.1)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Update<Expense, UpdateExpenseDTO, (i32, i32)> for ExpenseRepository {
    #[instrument(skip(self, data), fields(clinic_id = %id.0, expense_id = %id.1))]
    async fn update(&self, id: &(i32, i32), data: &UpdateExpenseDTO) -> Result<Expense, Error> {
        debug!("Updating expense");
        let mut query_builder = QueryBuilder::<MySql>::new("UPDATE expenses SET ");
        let mut separated = query_builder.separated(", ");
        separated.push("updated_at = CURRENT_TIMESTAMP(6)");
        if let Some(category) = data.category {
            separated.push("category = ");
            separated.push_bind_unseparated(category);
        }
        if let Some(ref description) = data.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description);
        }
        if let Some(amount) = data.amount {
            separated.push("amount = ");
            separated.push_bind_unseparated(amount);
        }
        if let Some(expense_date) = data.expense_date {
            separated.push("expense_date = ");
            separated.push_bind_unseparated(expense_date);
        }
        if let Some(method) = data.payment_method {
            separated.push("payment_method = ");
            separated.push_bind_unseparated(method);
        }
        if let Some(ref vendor) = data.vendor {
            separated.push("vendor = ");
            separated.push_bind_unseparated(vendor);
        }
        if let Some(ref notes) = data.notes {
            separated.push("notes = ");
            separated.push_bind_unseparated(notes);
        }
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND expense_id = ");
        query_builder.push_bind(id.1);

        let result = query_builder.build().execute(&self.connection_pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for ExpenseRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, expense_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM expenses WHERE clinic_id = ? AND expense_id = ?")
            .bind(id.0)
            .bind(id.1)
            .execute(&self.connection_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        info!("Expense deleted");
        Ok(())
    }
}
