//! InventoryRepository - Magazzino della clinica

use super::{Create, Delete, Read, Scoped, Update};
use crate::dtos::{
    CreateInventoryItemDTO, InventoryListQuery, PageRequest, UpdateInventoryItemDTO,
};
use crate::entities::InventoryItem;
use sqlx::{Error, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument, warn};

const ITEM_COLUMNS: &str = "item_id, clinic_id, name, sku, category, quantity, unit, reorder_level, \
                            unit_cost, supplier, expiry_date, created_at, updated_at";

pub struct InventoryRepository {
    connection_pool: MySqlPool,
}

impl InventoryRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    fn push_list_filters(
        query_builder: &mut QueryBuilder<'_, MySql>,
        clinic_id: i32,
        query: &InventoryListQuery,
    ) {
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            query_builder.push(" AND category = ");
            query_builder.push_bind(category.to_string());
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            query_builder.push(" AND (name LIKE ");
            query_builder.push_bind(pattern.clone());
            query_builder.push(" OR sku LIKE ");
            query_builder.push_bind(pattern);
            query_builder.push(")");
        }
    }

    #[instrument(skip(self, query), fields(clinic_id = %clinic_id))]
    pub async fn list(
        &self,
        clinic_id: i32,
        query: &InventoryListQuery,
        page: PageRequest,
    ) -> Result<(Vec<InventoryItem>, i64), Error> {
        debug!("Listing inventory items");
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM inventory_items");
        Self::push_list_filters(&mut count_query, clinic_id, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut select =
            QueryBuilder::new(format!("SELECT {} FROM inventory_items", ITEM_COLUMNS));
        Self::push_list_filters(&mut select, clinic_id, query);
        select.push(" ORDER BY name LIMIT ");
        select.push_bind(page.limit);
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let items = select
            .build_query_as::<InventoryItem>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((items, total))
    }

    /// Articoli con quantità pari o inferiore al livello di riordino
    #[instrument(skip(self), fields(clinic_id = %clinic_id))]
    pub async fn low_stock(&self, clinic_id: i32) -> Result<Vec<InventoryItem>, Error> {
        let sql = format!(
            "SELECT {} FROM inventory_items WHERE clinic_id = ? AND quantity <= reorder_level \
             ORDER BY quantity - reorder_level, name",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(clinic_id)
            .fetch_all(&self.connection_pool)
            .await?;

        debug!("{} items below reorder level", items.len());
        Ok(items)
    }

    /// Movimento di magazzino atomico. Ritorna `false` se la quantità risultante sarebbe
    /// negativa (o se l'articolo non esiste: il chiamante distingue rileggendo).
    #[instrument(skip(self), fields(clinic_id = %id.0, item_id = %id.1))]
    pub async fn adjust_stock(&self, id: &(i32, i32), delta: i32) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items SET quantity = quantity + ?
            WHERE clinic_id = ? AND item_id = ? AND quantity + ? >= 0
            "#,
        )
        .bind(delta)
        .bind(id.0)
        .bind(id.1)
        .bind(delta)
        .execute(&self.connection_pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!("Stock adjustment of {} refused", delta);
            return Ok(false);
        }
        info!("Stock adjusted by {}", delta);
        Ok(true)
    }
}

impl Create<InventoryItem, Scoped<CreateInventoryItemDTO>> for InventoryRepository {
    #[instrument(skip(self, data), fields(clinic_id = %data.clinic_id))]
    async fn create(&self, data: &Scoped<CreateInventoryItemDTO>) -> Result<InventoryItem, Error> {
        debug!("Creating inventory item");
        let item = &data.data;
        let result = sqlx::query(
            r#"
            INSERT INTO inventory_items (
                clinic_id, name, sku, category, quantity, unit, reorder_level, unit_cost,
                supplier, expiry_date
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.clinic_id)
        .bind(&item.name)
        .bind(&item.sku)
        .bind(&item.category)
        .bind(item.quantity)
        .bind(item.unit.as_deref().unwrap_or("pcs"))
        .bind(item.reorder_level)
        .bind(item.unit_cost)
        .bind(&item.supplier)
        .bind(item.expiry_date)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;
        info!("Inventory item created with id {}", new_id);
        self.read(&(data.clinic_id, new_id))
            .await?
            .ok_or(Error::RowNotFound)
    }
}

impl Read<InventoryItem, (i32, i32)> for InventoryRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, item_id = %id.1))]
    async fn read(&self, id: &(i32, i32)) -> Result<Option<InventoryItem>, Error> {
        let sql = format!(
            "SELECT {} FROM inventory_items WHERE clinic_id = ? AND item_id = ?",
            ITEM_COLUMNS
        );
        sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(id.0)
            .bind(id.1)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Update<InventoryItem, UpdateInventoryItemDTO, (i32, i32)> for InventoryRepository {
    #[instrument(skip(self, data), fields(clinic_id = %id.0, item_id = %id.1))]
    async fn update(
        &self,
        id: &(i32, i32),
        data: &UpdateInventoryItemDTO,
    ) -> Result<InventoryItem, Error> {
        debug!("Updating inventory item");
        let mut query_builder = QueryBuilder::<MySql>::new("UPDATE inventory_items SET ");
        let mut separated = query_builder.separated(", ");
        separated.push("updated_at = CURRENT_TIMESTAMP(6)");
        if let Some(ref name) = data.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }
        if let Some(ref sku) = data.sku {
            separated.push("sku = ");
            separated.push_bind_unseparated(sku);
        }
        if let Some(ref category) = data.category {
            separated.push("category = ");
            separated.push_bind_unseparated(category);
        }
        if let Some(ref unit) = data.unit {
            separated.push("unit = ");
            separated.push_bind_unseparated(unit);
        }
        if let Some(reorder_level) = data.reorder_level {
            separated.push("reorder_level = ");
            separated.push_bind_unseparated(reorder_level);
        }
        if let Some(unit_cost) = data.unit_cost {
            separated.push("unit_cost = ");
            separated.push_bind_unseparated(unit_cost);
        }
        if let Some(ref supplier) = data.supplier {
            separated.push("supplier = ");
            separated.push_bind_unseparated(supplier);
        }
        if let Some(expiry_date) = data.expiry_date {
            separated.push("expiry_date = ");
            separated.push_bind_unseparated(expiry_date);
        }
        query_builder.push(" WHERE clinic_id = ");
        query_builder.push_bind(id.0);
        query_builder.push(" AND item_id = ");
        query_builder.push_bind(id.1);

        let result = query_builder.build().execute(&self.connection_pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<(i32, i32)> for InventoryRepository {
    #[instrument(skip(self), fields(clinic_id = %id.0, item_id = %id.1))]
    async fn delete(&self, id: &(i32, i32)) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM inventory_items WHERE clinic_id = ? AND item_id = ?")
            .bind(id.0)
            .bind(id.1)
            .execute(&self.connection_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        info!("Inventory item deleted");
        Ok(())
    }
}

#[cfg(all(test, feature = "db-tests"))]
mod tests {
    use super::*;

    fn gloves(quantity: i32) -> Scoped<CreateInventoryItemDTO> {
        Scoped::new(
            1,
            4,
            CreateInventoryItemDTO {
                name: "Nitrile gloves".to_string(),
                sku: "GLV-M".to_string(),
                category: Some("consumables".to_string()),
                quantity,
                unit: Some("box".to_string()),
                reorder_level: 5,
                unit_cost: 7.5,
                supplier: None,
                expiry_date: None,
            },
        )
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics")))]
    async fn stock_never_goes_negative(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = InventoryRepository::new(pool);
        let item = repo.create(&gloves(3)).await?;
        let id = (1, item.item_id);

        assert!(repo.adjust_stock(&id, -2).await?);
        assert!(!repo.adjust_stock(&id, -2).await?);
        assert_eq!(repo.read(&id).await?.unwrap().quantity, 1);
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics")))]
    async fn low_stock_lists_items_at_reorder_level(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = InventoryRepository::new(pool);
        repo.create(&gloves(5)).await?;

        let low = repo.low_stock(1).await?;
        assert_eq!(low.len(), 1);
        assert!(low[0].is_low_stock());
        assert!(repo.low_stock(2).await?.is_empty());
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "clinics")))]
    async fn sku_is_unique_per_clinic(pool: MySqlPool) -> sqlx::Result<()> {
        let repo = InventoryRepository::new(pool);
        repo.create(&gloves(1)).await?;
        let err = repo.create(&gloves(1)).await.unwrap_err();
        assert!(matches!(err, Error::Database(ref db) if db.is_unique_violation()));

        let mut other_clinic = gloves(1);
        other_clinic.clinic_id = 2;
        assert!(repo.create(&other_clinic).await.is_ok());
        Ok(())
    }
}
