//! OdontogramRepository - Versioni dell'odontogramma
//!
//! Invariante: al massimo una versione attiva per paziente. Creazione e attivazione
//! avvengono in una transazione che blocca la riga del paziente (`SELECT ... FOR UPDATE`),
//! così due richieste concorrenti per lo stesso paziente vengono serializzate; l'indice
//! UNIQUE su `active_patient_id` fa da ultima barriera a livello di schema.

use super::{Create, Read, Scoped};
use crate::dtos::CreateOdontogramDTO;
use crate::entities::{Odontogram, OdontogramVersion, TreatmentSummary};
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Error, MySql, MySqlConnection, MySqlPool, Transaction};
use tracing::{debug, info, instrument, warn};

const ODONTOGRAM_COLUMNS: &str = "odontogram_id, clinic_id, patient_id, doctor_id, version, is_active, \
                                  dentition, teeth, notes, treatment_summary, created_at, updated_at";

pub struct OdontogramRepository {
    connection_pool: MySqlPool,
}

impl OdontogramRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    /// Apre una transazione per le modifiche read-modify-write di un grafico
    pub async fn begin(&self) -> Result<Transaction<'static, MySql>, Error> {
        self.connection_pool.begin().await
    }

    /// Blocca la riga del paziente: serializza tutte le operazioni sulle versioni
    async fn lock_patient(
        conn: &mut MySqlConnection,
        clinic_id: i32,
        patient_id: i32,
    ) -> Result<(), Error> {
        sqlx::query_scalar::<_, i32>(
            "SELECT patient_id FROM patients WHERE clinic_id = ? AND patient_id = ? FOR UPDATE",
        )
        .bind(clinic_id)
        .bind(patient_id)
        .fetch_optional(conn)
        .await?
        .map(|_| ())
        .ok_or(Error::RowNotFound)
    }

    async fn read_with(
        conn: &mut MySqlConnection,
        clinic_id: i32,
        odontogram_id: i32,
        for_update: bool,
    ) -> Result<Option<Odontogram>, Error> {
        let sql = format!(
            "SELECT {} FROM odontograms WHERE clinic_id = ? AND odontogram_id = ?{}",
            ODONTOGRAM_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, Odontogram>(&sql)
            .bind(clinic_id)
            .bind(odontogram_id)
            .fetch_optional(conn)
            .await
    }

    /// Legge e blocca un grafico all'interno della transazione `conn`
    #[instrument(skip(self, conn), fields(clinic_id = %id.0, odontogram_id = %id.1))]
    pub async fn read_for_update(
        &self,
        conn: &mut MySqlConnection,
        id: &(i32, i32),
    ) -> Result<Option<Odontogram>, Error> {
        debug!("Locking odontogram for update");
        Self::read_with(conn, id.0, id.1, true).await
    }

    /// Salva denti, note e riepilogo (già ricalcolato dal chiamante)
    #[instrument(skip(self, conn, chart), fields(odontogram_id = %chart.odontogram_id))]
    pub async fn save_chart(
        &self,
        conn: &mut MySqlConnection,
        chart: &Odontogram,
    ) -> Result<Odontogram, Error> {
        debug!("Saving odontogram");
        sqlx::query(
            r#"
            UPDATE odontograms SET teeth = ?, treatment_summary = ?, notes = ?
            WHERE clinic_id = ? AND odontogram_id = ?
            "#,
        )
        .bind(&chart.teeth)
        .bind(&chart.treatment_summary)
        .bind(&chart.notes)
        .bind(chart.clinic_id)
        .bind(chart.odontogram_id)
        .execute(&mut *conn)
        .await?;

        Self::read_with(conn, chart.clinic_id, chart.odontogram_id, false)
            .await?
            .ok_or(Error::RowNotFound)
    }

    #[instrument(skip(self), fields(clinic_id = %clinic_id, patient_id = %patient_id))]
    pub async fn find_active(
        &self,
        clinic_id: i32,
        patient_id: i32,
    ) -> Result<Option<Odontogram>, Error> {
        debug!("Finding active odontogram");
        let sql = format!(
            "SELECT {} FROM odontograms WHERE clinic_id = ? AND patient_id = ? AND is_active = TRUE",
            ODONTOGRAM_COLUMNS
        );
        let chart = sqlx::query_as::<_, Odontogram>(&sql)
            .bind(clinic_id)
            .bind(patient_id)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(chart)
    }

    /// Tutte le versioni del paziente, dalla più recente, senza i denti
    #[instrument(skip(self), fields(clinic_id = %clinic_id, patient_id = %patient_id))]
    pub async fn history(
        &self,
        clinic_id: i32,
        patient_id: i32,
    ) -> Result<Vec<OdontogramVersion>, Error> {
        debug!("Listing odontogram versions");
        let versions = sqlx::query_as::<_, OdontogramVersion>(
            r#"
            SELECT odontogram_id, patient_id, doctor_id, version, is_active, dentition,
                   treatment_summary, created_at, updated_at
            FROM odontograms
            WHERE clinic_id = ? AND patient_id = ?
            ORDER BY version DESC
            "#,
        )
        .bind(clinic_id)
        .bind(patient_id)
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(versions)
    }

    /// Rende attiva una versione esistente disattivando quella corrente
    #[instrument(skip(self), fields(clinic_id = %id.0, odontogram_id = %id.1))]
    pub async fn activate(&self, id: &(i32, i32)) -> Result<Odontogram, Error> {
        debug!("Activating odontogram version");
        let mut tx = self.connection_pool.begin().await?;

        let patient_id: i32 = sqlx::query_scalar(
            "SELECT patient_id FROM odontograms WHERE clinic_id = ? AND odontogram_id = ?",
        )
        .bind(id.0)
        .bind(id.1)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::RowNotFound)?;

        Self::lock_patient(&mut tx, id.0, patient_id).await?;

        // prima si disattiva la versione corrente, poi si attiva la nuova (indice UNIQUE)
        sqlx::query(
            r#"
            UPDATE odontograms SET is_active = FALSE
            WHERE patient_id = ? AND is_active = TRUE AND odontogram_id <> ?
            "#,
        )
        .bind(patient_id)
        .bind(id.1)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE odontograms SET is_active = TRUE WHERE odontogram_id = ?")
            .bind(id.1)
            .execute(&mut *tx)
            .await?;

        let chart = Self::read_with(&mut tx, id.0, id.1, false)
            .await?
            .ok_or(Error::RowNotFound)?;
        tx.commit().await?;

        info!("Odontogram version {} is now active", chart.version);
        Ok(chart)
    }
}

impl Create<Odontogram, Scoped<CreateOdontogramDTO>> for OdontogramRepository {
    /// Crea una nuova versione attiva. Con `copy_from_active` denti e dentizione vengono
    /// copiati dalla versione attiva corrente (se esiste). Il riepilogo è sempre ricalcolato.
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id, patient_id = %data.data.patient_id))]
    async fn create(&self, data: &Scoped<CreateOdontogramDTO>) -> Result<Odontogram, Error> {
        debug!("Creating new odontogram version");
        let dto = &data.data;
        let mut tx = self.connection_pool.begin().await?;

        // 1. Lock del paziente (404 se non appartiene alla clinica)
        Self::lock_patient(&mut tx, data.clinic_id, dto.patient_id).await?;

        // 2. Versione attiva corrente
        let sql = format!(
            "SELECT {} FROM odontograms WHERE clinic_id = ? AND patient_id = ? AND is_active = TRUE",
            ODONTOGRAM_COLUMNS
        );
        let active = sqlx::query_as::<_, Odontogram>(&sql)
            .bind(data.clinic_id)
            .bind(dto.patient_id)
            .fetch_optional(&mut *tx)
            .await?;

        let (dentition, teeth) = match (&active, dto.copy_from_active) {
            (Some(current), true) => (current.dentition, current.teeth.0.clone()),
            (None, true) => {
                warn!("copy_from_active requested but patient has no active chart");
                (dto.dentition, dto.teeth.clone())
            }
            _ => (dto.dentition, dto.teeth.clone()),
        };

        // 3. Prossimo numero di versione
        let last_version: i64 = sqlx::query_scalar(
            "SELECT CAST(COALESCE(MAX(version), 0) AS SIGNED) FROM odontograms WHERE patient_id = ?",
        )
        .bind(dto.patient_id)
        .fetch_one(&mut *tx)
        .await?;
        let version = last_version as i32 + 1;

        // 4. Disattivazione della versione corrente
        if let Some(current) = &active {
            sqlx::query("UPDATE odontograms SET is_active = FALSE WHERE odontogram_id = ?")
                .bind(current.odontogram_id)
                .execute(&mut *tx)
                .await?;
            debug!("Deactivated version {}", current.version);
        }

        // 5. Nuova versione attiva con riepilogo ricalcolato
        let summary = TreatmentSummary::from_teeth(&teeth, Utc::now());
        let result = sqlx::query(
            r#"
            INSERT INTO odontograms (
                clinic_id, patient_id, doctor_id, version, is_active, dentition, teeth,
                notes, treatment_summary
            )
            VALUES (?, ?, ?, ?, TRUE, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(dto.patient_id)
        .bind(dto.doctor_id.unwrap_or(data.user_id))
        .bind(version)
        .bind(dentition)
        .bind(Json(&teeth))
        .bind(&dto.notes)
        .bind(Json(&summary))
        .execute(&mut *tx)
        .await?;
        let new_id = result.last_insert_id() as i32;

        let chart = Self::read_with(&mut tx, data.clinic_id, new_id, false)
            .await?
            .ok_or(Error::RowNotFound)?;
        tx.commit().await?;

        info!("Odontogram version {} created with id {}", version, new_id);
        Ok(chart)
    }
}

impl Read<Odontogram, (i32, i32)> for OdontogramRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, odontogram_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Odontogram>, Error> {
        debug!("Reading odontogram");
        let mut conn = self.connection_pool.acquire().await?;
        Self::read_with(&mut conn, id.0, id.1, false).await
    }
}
