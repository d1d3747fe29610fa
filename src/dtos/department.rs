//! Department DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateDepartmentDTO {
    #[validate(length(min = 2, max = 100, message = "Department name must be between 2 and 100 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub head_id: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateDepartmentDTO {
    #[validate(length(min = 2, max = 100, message = "Department name must be between 2 and 100 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub head_id: Option<i32>,
    pub is_active: Option<bool>,
}
