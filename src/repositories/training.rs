//! TrainingRepository - Programmi di formazione e avanzamento del personale
//!
//! L'avanzamento di un utente si registra in transazione con il programma bloccato
//! (`SELECT ... FOR UPDATE`), così il controllo "l'avanzamento non torna indietro"
//! vale anche con richieste concorrenti.

use super::{Create, Delete, Read, Scoped, Update};
use crate::core::RowFilter;
use crate::dtos::{CreateTrainingDTO, PageRequest, TrainingListQuery, UpdateTrainingDTO};
use crate::entities::{ProgressError, Training, TrainingProgress, TrainingStatus};
use chrono::Utc;
use sqlx::{Error, MySql, MySqlConnection, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument, warn};

const TRAINING_COLUMNS: &str = "training_id, clinic_id, title, description, category, \
                                duration_hours, is_mandatory, due_date, created_by, created_at, \
                                updated_at";

const PROGRESS_COLUMNS: &str =
    "training_id, user_id, clinic_id, status, progress_percent, completed_at, updated_at";

const DEFAULT_DURATION_HOURS: i32 = 1;

/// Esito della registrazione di un avanzamento
#[derive(Debug)]
pub enum ProgressOutcome {
    Recorded(TrainingProgress),
    Rejected(ProgressError),
}

pub struct TrainingRepository {
    connection_pool: MySqlPool,
}

impl TrainingRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    async fn read_progress_with(
        conn: &mut MySqlConnection,
        training_id: i32,
        user_id: i32,
    ) -> Result<Option<TrainingProgress>, Error> {
        let sql = format!(
            "SELECT {} FROM training_progress WHERE training_id = ? AND user_id = ? FOR UPDATE",
            PROGRESS_COLUMNS
        );
        sqlx::query_as::<_, TrainingProgress>(&sql)
            .bind(training_id)
            .bind(user_id)
            .fetch_optional(conn)
            .await
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        query: &TrainingListQuery,
    ) {
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);
        if let Some(ref category) = query.category {
            query_builder.push(" AND category = ");
            query_builder.push_bind(category.clone());
        }
        if let Some(mandatory) = query.mandatory {
            query_builder.push(" AND is_mandatory = ");
            query_builder.push_bind(mandatory);
        }
    }

    #[instrument(skip(self, query), fields(clinic_id = %clinic_id))]
    pub async fn list(
        &self,
        clinic_id: i32,
        query: &TrainingListQuery,
        page: PageRequest,
    ) -> Result<(Vec<Training>, i64), Error> {
        debug!("Listing trainings");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM training_programs");
        Self::push_list_filters(&mut count_query, clinic_id, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select = QueryBuilder::new(format!(
            "SELECT {} FROM training_programs",
            TRAINING_COLUMNS
        ));
        Self::push_list_filters(&mut select, clinic_id, query);
        select.push(" ORDER BY is_mandatory DESC, due_date IS NULL, due_date, title LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let trainings = select
            .build_query_as::<Training>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((trainings, total))
    }

    /// Avanzamenti di un programma visibili con `filter` (colonna proprietario: `user_id`)
    #[instrument(skip(self, filter), fields(clinic_id = %clinic_id, training_id = %training_id))]
    pub async fn list_progress(
        &self,
        clinic_id: i32,
        training_id: i32,
        filter: &RowFilter,
    ) -> Result<Vec<TrainingProgress>, Error> {
        debug!("Listing training progress");
        let mut select = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM training_progress WHERE clinic_id = ",
            PROGRESS_COLUMNS
        ));
        select.push_bind(clinic_id);
        filter.push_sql(&mut select, "");
        select.push(" AND training_id = ");
        select.push_bind(training_id);
        select.push(" ORDER BY user_id");

        select
            .build_query_as::<TrainingProgress>()
            .fetch_all(&self.connection_pool)
            .await
    }

    /// Porta l'avanzamento di `user_id` a `percent`; `RowNotFound` se il programma non è della clinica
    #[instrument(skip(self), fields(clinic_id = %clinic_id, training_id = %training_id, user_id = %user_id))]
    pub async fn record_progress(
        &self,
        clinic_id: i32,
        training_id: i32,
        user_id: i32,
        percent: i32,
    ) -> Result<ProgressOutcome, Error> {
        debug!("Recording training progress");
        let mut tx = self.connection_pool.begin().await?;

        // 1. Lock del programma
        sqlx::query_scalar::<_, i32>(
            "SELECT training_id FROM training_programs WHERE clinic_id = ? AND training_id = ? FOR UPDATE",
        )
        .bind(clinic_id)
        .bind(training_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::RowNotFound)?;

        // 2. Avanzamento corrente e nuovo stato
        let current = Self::read_progress_with(&mut *tx, training_id, user_id).await?;
        let status = match TrainingProgress::advance(current.as_ref(), percent) {
            Ok(status) => status,
            Err(e) => {
                warn!("Progress rejected: {:?}", e);
                return Ok(ProgressOutcome::Rejected(e));
            }
        };
        let completed_at = (status == TrainingStatus::Completed).then(Utc::now);

        // 3. Upsert
        sqlx::query(
            r#"
            INSERT INTO training_progress (training_id, user_id, clinic_id, status, progress_percent, completed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE status = VALUES(status),
                                    progress_percent = VALUES(progress_percent),
                                    completed_at = VALUES(completed_at)
            "#,
        )
        .bind(training_id)
        .bind(user_id)
        .bind(clinic_id)
        .bind(status)
        .bind(percent)
        .bind(completed_at)
        .execute(&mut *tx)
        .await?;

        let progress = Self::read_progress_with(&mut *tx, training_id, user_id)
            .await?
            .ok_or(Error::RowNotFound)?;
        tx.commit().await?;

        info!("Training progress at {}%", percent);
        Ok(ProgressOutcome::Recorded(progress))
    }
}

impl Create<Training, Scoped<CreateTrainingDTO>> for TrainingRepository {
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id))]
    async fn create(&self, data: &Scoped<CreateTrainingDTO>) -> Result<Training, Error> {
        debug!("Creating training");
        let training = &data.data;
        let result = sqlx::query(
            r#"
            INSERT INTO training_programs (
                clinic_id, title, description, category, duration_hours, is_mandatory,
                due_date, created_by
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(&training.title)
        .bind(&training.description)
        .bind(&training.category)
        .bind(training.duration_hours.unwrap_or(DEFAULT_DURATION_HOURS))
        .bind(training.is_mandatory.unwrap_or(false))
        .bind(training.due_date)
        .bind(data.user_id)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;
        info!("Training created with id {}", new_id);
        self.read(&(data.clinic_id, new_id))
            .await?
            .ok_or(Error::RowNotFound)
    }
}

impl Read<Training, (i32, i32)> for TrainingRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, training_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Training>, Error> {
        let sql = format!(
            "SELECT {} FROM training_programs WHERE clinic_id = ? AND training_id = ?",
            TRAINING_COLUMNS
        );
        sqlx::query_as::<_, Training>(&sql)
            .bind(id.0)
            .bind(id.1)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Update<Training, UpdateTrainingDTO, (i32, i32)> for TrainingRepository {
    #[instrument(skip(self, data), fields(clinic_id = %id.0, training_id = %id.1))]
    async fn update(&self, id: &(i32, i32), data: &UpdateTrainingDTO) -> Result<Training, Error> {
        debug!("Updating training");
        let mut query_builder = QueryBuilder::<MySql>::new("UPDATE training_programs SET ");
        let mut separated = query_builder.separated(", ");
        separated.push("updated_at = CURRENT_TIMESTAMP(6)");
        if let Some(ref title) = data.title {
            separated.push("title = ");
            separated.push_bind_unseparated(title);
        }
        if let Some(ref description) = data.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description);
        }
        if let Some(ref category) = data.category {
            separated.push("category = ");
            separated.push_bind_unseparated(category);
        }
        if let Some(duration_hours) = data.duration_hours {
            separated.push("duration_hours = ");
            separated.push_bind_unseparated(duration_hours);
        }
        if let Some(is_mandatory) = data.is_mandatory {
            separated.push("is_mandatory = ");
            separated.push_bind_unseparated(is_mandatory);
        }
        if let Some(due_date) = data.due_date {
            separated.push("due_date = ");
            separated.push_bind_unseparated(due_date);
        }
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND training_id = ");
        query_builder.push_bind(id.1);

        let result = query_builder.build().execute(&self.connection_pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for TrainingRepository {
    /// Gli avanzamenti vengono cancellati in cascata
    #[instrument(skip(self), fields(clinic_id = %id.0, training_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        let result =
            sqlx::query("DELETE FROM training_programs WHERE clinic_id = ? AND training_id = ?")
                .bind(id.0)
                .bind(id.1)
                .execute(&self.connection_pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        info!("Training deleted");
        Ok(())
    }
}
