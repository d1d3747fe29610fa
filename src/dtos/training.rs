//! Training DTOs - Programmi di formazione e avanzamento

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateTrainingDTO {
    #[validate(length(min = 2, max = 200, message = "Title must be between 2 and 200 characters"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "Duration must be between 1 and 1000 hours"))]
    pub duration_hours: Option<i32>,
    pub is_mandatory: Option<bool>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateTrainingDTO {
    #[validate(length(min = 2, max = 200, message = "Title must be between 2 and 200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "Duration must be between 1 and 1000 hours"))]
    pub duration_hours: Option<i32>,
    pub is_mandatory: Option<bool>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct UpdateProgressDTO {
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress_percent: i32,
}
