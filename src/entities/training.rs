//! Training entities - Programmi di formazione e avanzamento per utente

use super::enums::TrainingStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Training {
    pub training_id: i32,
    pub clinic_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub duration_hours: i32,
    pub is_mandatory: bool,
    pub due_date: Option<NaiveDate>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct TrainingProgress {
    pub training_id: i32,
    pub user_id: i32,
    pub clinic_id: i32,
    pub status: TrainingStatus,
    pub progress_percent: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Avanzamento non ammesso
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressError {
    /// La percentuale non può diminuire
    Regression { current: i32 },
    /// Un corso completato resta completato
    AlreadyCompleted,
}

impl TrainingProgress {
    /// Nuovo stato dopo aver portato l'avanzamento a `percent`.
    /// `current` è `None` se l'utente non ha ancora iniziato il corso.
    pub fn advance(current: Option<&Self>, percent: i32) -> Result<TrainingStatus, ProgressError> {
        if let Some(current) = current {
            if current.status == TrainingStatus::Completed {
                return Err(ProgressError::AlreadyCompleted);
            }
            if percent < current.progress_percent {
                return Err(ProgressError::Regression {
                    current: current.progress_percent,
                });
            }
        }
        Ok(TrainingStatus::from_percent(percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(percent: i32) -> TrainingProgress {
        TrainingProgress {
            training_id: 1,
            user_id: 6,
            clinic_id: 1,
            status: TrainingStatus::from_percent(percent),
            progress_percent: percent,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn status_follows_the_percentage() {
        assert_eq!(TrainingProgress::advance(None, 0), Ok(TrainingStatus::NotStarted));
        assert_eq!(TrainingProgress::advance(None, 40), Ok(TrainingStatus::InProgress));
        assert_eq!(TrainingProgress::advance(None, 100), Ok(TrainingStatus::Completed));
    }

    #[test]
    fn progress_never_goes_back() {
        let current = progress(60);
        assert_eq!(
            TrainingProgress::advance(Some(&current), 30),
            Err(ProgressError::Regression { current: 60 })
        );
        assert_eq!(
            TrainingProgress::advance(Some(&current), 60),
            Ok(TrainingStatus::InProgress)
        );
    }

    #[test]
    fn completed_training_is_final() {
        assert_eq!(
            TrainingProgress::advance(Some(&progress(100)), 100),
            Err(ProgressError::AlreadyCompleted)
        );
    }
}
