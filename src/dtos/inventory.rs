//! Inventory DTOs - Articoli di magazzino e movimenti di stock

use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateInventoryItemDTO {
    #[validate(length(min = 1, max = 150, message = "Item name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "SKU is required"))]
    pub sku: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Reorder level cannot be negative"))]
    pub reorder_level: i32,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Unit cost cannot be negative"))]
    pub unit_cost: f64,
    #[validate(length(max = 150))]
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// La quantità si modifica solo con `PATCH /{id}/stock`
#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateInventoryItemDTO {
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub sku: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    #[validate(range(min = 0, message = "Reorder level cannot be negative"))]
    pub reorder_level: Option<i32>,
    #[validate(range(min = 0.0, message = "Unit cost cannot be negative"))]
    pub unit_cost: Option<f64>,
    #[validate(length(max = 150))]
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct StockAdjustmentDTO {
    #[validate(range(min = -100000, max = 100000))]
    pub delta: i32,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}
