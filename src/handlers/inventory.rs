// src/handlers/inventory.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::AppError,
        validation::{validate_not_negative, validate_rate},
    },
    config::AppState,
    middleware::rbac::{PermInventoryWrite, RequirePermission},
    models::{
        inventory::{
            AdjustMode, NewProduct, NewWarehouse, Product, ProductStock, StockChange, Warehouse,
        },
        sales::{CreateStockTransfer, StockTransferDetail},
    },
};

// ---
// Payload: CreateProduct
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Café torrado 1kg")]
    pub name: String,

    pub sku: Option<String>,

    #[validate(custom(function = "validate_not_negative"))]
    #[schema(example = "45.90")]
    pub unit_price: Decimal,

    #[validate(custom(function = "validate_rate"))]
    #[serde(default)]
    #[schema(example = "18")]
    pub vat_rate: Decimal,
}

// POST /api/products
#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Inventory",
    request_body = CreateProductPayload,
    responses(
        (status = 201, description = "Produto criado com estoque zero", body = Product)
    ),
    security(("api_jwt" = []))
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermInventoryWrite>,
    Json(payload): Json<CreateProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let product = app_state
        .inventory_service
        .create_product(NewProduct {
            name: payload.name.trim().to_string(),
            sku: payload.sku,
            unit_price: payload.unit_price,
            vat_rate: payload.vat_rate,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

// GET /api/products/{id}
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "Inventory",
    responses(
        (status = 200, description = "Produto com saldo por depósito", body = ProductStock),
        (status = 404, description = "Produto não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do produto")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_product(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (product, warehouses) = app_state.inventory_service.get_product(id).await?;
    Ok(Json(ProductStock { product, warehouses }))
}

// ---
// Payload: StockAdjustment
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustmentPayload {
    pub warehouse_id: Option<Uuid>,

    #[schema(example = "add")]
    pub mode: AdjustMode,

    #[validate(custom(function = "validate_not_negative"))]
    #[schema(example = "10")]
    pub quantity: Decimal,

    pub note: Option<String>,
}

// POST /api/products/{id}/stock-adjustments
#[utoipa::path(
    post,
    path = "/api/products/{id}/stock-adjustments",
    tag = "Inventory",
    request_body = StockAdjustmentPayload,
    responses(
        (status = 200, description = "Saldo ajustado", body = StockChange),
        (status = 409, description = "O ajuste deixaria o estoque negativo")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do produto")
    ),
    security(("api_jwt" = []))
)]
pub async fn adjust_stock(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermInventoryWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StockAdjustmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let change = app_state
        .inventory_service
        .adjust_stock(id, payload.warehouse_id, payload.quantity, payload.mode, payload.note)
        .await?;

    Ok(Json(change))
}

// ---
// Payload: CreateWarehouse
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWarehousePayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Depósito Central")]
    pub name: String,
}

// POST /api/warehouses
#[utoipa::path(
    post,
    path = "/api/warehouses",
    tag = "Inventory",
    request_body = CreateWarehousePayload,
    responses(
        (status = 201, description = "Depósito criado", body = Warehouse)
    ),
    security(("api_jwt" = []))
)]
pub async fn create_warehouse(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermInventoryWrite>,
    Json(payload): Json<CreateWarehousePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let warehouse = app_state
        .inventory_service
        .create_warehouse(NewWarehouse {
            name: payload.name.trim().to_string(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(warehouse)))
}

// POST /api/stock-transfers
#[utoipa::path(
    post,
    path = "/api/stock-transfers",
    tag = "Inventory",
    request_body = CreateStockTransfer,
    responses(
        (status = 201, description = "Transferência entre depósitos registrada", body = StockTransferDetail),
        (status = 409, description = "Estoque insuficiente na origem ou depósitos iguais")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_stock_transfer(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermInventoryWrite>,
    Json(payload): Json<CreateStockTransfer>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let detail = app_state.transfer_service.create_transfer(payload).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}
