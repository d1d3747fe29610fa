//! InventoryItem entity - Magazzino della clinica

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct InventoryItem {
    pub item_id: i32,
    pub clinic_id: i32,
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    pub quantity: i32,
    pub unit: String,
    pub reorder_level: i32,
    pub unit_cost: f64,
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    pub fn stock_value(&self) -> f64 {
        self.quantity as f64 * self.unit_cost
    }
}
