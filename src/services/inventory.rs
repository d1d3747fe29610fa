//! Inventory services - Magazzino della clinica
//!
//! Il magazzino è visibile a tutti i ruoli della clinica; le modifiche sono riservate
//! ad admin, nurse e staff.

use crate::core::{AppError, AppState, ClinicContext, Json, Path, Query, require_role};
use crate::dtos::{
    ApiResponse, CreateInventoryItemDTO, InventoryListQuery, MessageResponse, PageRequest,
    Paginated, StockAdjustmentDTO, UpdateInventoryItemDTO,
};
use crate::entities::{InventoryItem, Role};
use crate::repositories::{Create, Delete, Read, Scoped, Update};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

const WRITERS: &[Role] = &[Role::Nurse, Role::Staff];

async fn load_item(state: &AppState, clinic_id: i32, item_id: i32) -> Result<InventoryItem, AppError> {
    state
        .inventory
        .read(&(clinic_id, item_id))
        .await?
        .ok_or_else(|| AppError::not_found("Inventory item not found"))
}

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id()))]
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<InventoryListQuery>,
) -> Result<Json<Paginated<InventoryItem>>, AppError> {
    debug!("Listing inventory");
    let page = PageRequest::new(query.page, query.limit);
    let (items, total) = state.inventory.list(ctx.clinic_id(), &query, page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id()))]
pub async fn list_low_stock(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
) -> Result<Json<ApiResponse<Vec<InventoryItem>>>, AppError> {
    let items = state.inventory.low_stock(ctx.clinic_id()).await?;
    debug!("{} items below reorder level", items.len());
    Ok(Json(ApiResponse::new(items)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), sku = %body.sku))]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Json(body): Json<CreateInventoryItemDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Creating inventory item");
    require_role(&ctx, WRITERS)?;
    body.validate()?;

    // SKU duplicato nella clinica -> 409 dal vincolo UNIQUE
    let item = state
        .inventory
        .create(&Scoped::new(ctx.clinic_id(), ctx.user_id, body))
        .await?;

    info!("Inventory item {} created", item.item_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::new(item))))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), item_id = %item_id))]
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(item_id): Path<i32>,
) -> Result<Json<ApiResponse<InventoryItem>>, AppError> {
    let item = load_item(&state, ctx.clinic_id(), item_id).await?;
    Ok(Json(ApiResponse::new(item)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), item_id = %item_id))]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(item_id): Path<i32>,
    Json(body): Json<UpdateInventoryItemDTO>,
) -> Result<Json<ApiResponse<InventoryItem>>, AppError> {
    debug!("Updating inventory item");
    require_role(&ctx, WRITERS)?;
    body.validate()?;
    load_item(&state, ctx.clinic_id(), item_id).await?;

    let item = state
        .inventory
        .update(&(ctx.clinic_id(), item_id), &body)
        .await?;

    info!("Inventory item updated");
    Ok(Json(ApiResponse::new(item)))
}

#[instrument(skip(state, ctx, body), fields(clinic_id = %ctx.clinic_id(), item_id = %item_id, delta = %body.delta))]
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(item_id): Path<i32>,
    Json(body): Json<StockAdjustmentDTO>,
) -> Result<Json<ApiResponse<InventoryItem>>, AppError> {
    debug!("Adjusting stock");
    // 1. Ruoli ammessi e validazione
    // 2. UPDATE condizionato: la quantità non scende mai sotto zero
    // 3. Se nessuna riga cambia, si rilegge per distinguere 404 da 400
    require_role(&ctx, WRITERS)?;
    body.validate()?;
    if body.delta == 0 {
        return Err(AppError::bad_request("Stock adjustment cannot be zero"));
    }

    let id = (ctx.clinic_id(), item_id);
    let applied = state.inventory.adjust_stock(&id, body.delta).await?;
    let item = load_item(&state, id.0, id.1).await?;

    if !applied {
        warn!(
            "Insufficient stock for item {}: have {}, delta {}",
            item_id, item.quantity, body.delta
        );
        return Err(AppError::bad_request("Insufficient stock")
            .with_details(format!("Available quantity is {}", item.quantity)));
    }

    info!(
        "Stock of item {} is now {} ({})",
        item_id,
        item.quantity,
        body.reason.as_deref().unwrap_or("no reason")
    );
    Ok(Json(ApiResponse::new(item)))
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), item_id = %item_id))]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Path(item_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&ctx, WRITERS)?;
    state.inventory.delete(&(ctx.clinic_id(), item_id)).await?;
    info!("Inventory item deleted");
    Ok(Json(MessageResponse::new("Inventory item deleted")))
}
