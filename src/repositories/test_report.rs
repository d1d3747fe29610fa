//! TestReportRepository - Referti di laboratorio

use super::{Create, Delete, Read, Scoped, Update};
use crate::core::RowFilter;
use crate::dtos::{CreateTestReportDTO, PageRequest, TestReportListQuery, UpdateTestReportDTO};
use crate::entities::{TestReport, TestReportStatus};
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Error, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument};

const REPORT_COLUMNS: &str = "report_id, clinic_id, patient_id, doctor_id, test_name, category, \
                              test_date, results, status, notes, created_at, updated_at";

pub struct TestReportRepository {
    connection_pool: MySqlPool,
}

impl TestReportRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        filter: &RowFilter,
        query: &TestReportListQuery,
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
        query: &TestReportListQuery,
        page: PageRequest,
    ) -> Result<(Vec<TestReport>, i64), Error> {
        debug!("Listing test reports");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM test_reports");
        Self::push_list_filters(&mut count_query, clinic_id, filter, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM test_reports", REPORT_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, filter, query);
        select.push(" ORDER BY test_date DESC, report_id DESC LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let reports = select
            .build_query_as::<TestReport>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((reports, total))
    }
}

impl Create<TestReport, Scoped<CreateTestReportDTO>> for TestReportRepository {
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id))]
    async fn create(&self, data: &Scoped<CreateTestReportDTO>) -> Result<TestReport, Error> {
        debug!("Creating new test report");
        let dto = &data.data;
        let result = sqlx::query(
            r#"
            INSERT INTO test_reports (
                clinic_id, patient_id, doctor_id, test_name, category, test_date, results,
                status, notes
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(dto.patient_id)
        .bind(dto.doctor_id.unwrap_or(data.user_id))
        .bind(&dto.test_name)
        .bind(&dto.category)
        .bind(dto.test_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(Json(&dto.results))
        .bind(dto.status.unwrap_or(TestReportStatus::Pending))
        .bind(&dto.notes)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;
        info!("Test report created with id {}", new_id);
        self.read(&(data.clinic_id, new_id))
            .await?
            .ok_or(Error::RowNotFound)
    }
}

impl Read<TestReport, (i32, i32)> for TestReportRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, report_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<TestReport>, Error> {
        debug!("Reading test report");
        let sql = format!(
            "SELECT {} FROM test_reports WHERE clinic_id = ? AND report_id = ?",
            REPORT_COLUMNS
        );
        let report = sqlx::query_as::<_, TestReport>(&sql)
            .bind(id.0)
            .bind(id.1)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(report)
    }
}

impl Update<TestReport, UpdateTestReportDTO, (i32, i32)> for TestReportRepository {
    #[instrument(skip(self, data), fields(clinic_id = %id.0, report_id = %id.1))]
    async fn update(&self, id: &(i32, i32), data: &UpdateTestReportDTO) -> Result<TestReport, Error> {
        debug!("Updating test report");
        let current = self.read(id).await?.ok_or(Error::RowNotFound)?;
        if data.test_name.is_none()
            && data.category.is_none()
            && data.test_date.is_none()
            && data.results.is_none()
            && data.status.is_none()
            && data.notes.is_none()
        {
            return Ok(current);
        }

        let mut query_builder = QueryBuilder::new("UPDATE test_reports SET ");
        let mut separated = query_builder.separated(", ");
        if let Some(ref test_name) = data.test_name {
            separated.push("test_name = ");
            separated.push_bind_unseparated(test_name);
        }
        if let Some(ref category) = data.category {
            separated.push("category = ");
            separated.push_bind_unseparated(category);
        }
        if let Some(test_date) = data.test_date {
            separated.push("test_date = ");
            separated.push_bind_unseparated(test_date);
        }
        if let Some(ref results) = data.results {
            separated.push("results = ");
            separated.push_bind_unseparated(Json(results));
        }
        if let Some(status) = data.status {
            separated.push("status = ");
            separated.push_bind_unseparated(status);
        }
        if let Some(ref notes) = data.notes {
            separated.push("notes = ");
            separated.push_bind_unseparated(notes);
        }
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND report_id = ");
        query_builder.push_bind(id.1);
        query_builder.build().execute(&self.connection_pool).await?;

        info!("Test report updated successfully");
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for TestReportRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, report_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM test_reports WHERE clinic_id = ? AND report_id = ?")
            .bind(id.0)
            .bind(id.1)
            .execute(&self.connection_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        info!("Test report deleted");
        Ok(())
    }
}
