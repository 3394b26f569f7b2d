// src/handlers/sales.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{PermFinanceWrite, PermSalesWrite, RequirePermission},
    models::sales::{
        CreatePayment, CreateReturn, CreateSale, ExternalInvoice, Payment, ReturnDetail, Sale,
        SaleDetail,
    },
};

// =============================================================================
//  VENDAS
// =============================================================================

// POST /api/sales
#[utoipa::path(
    post,
    path = "/api/sales",
    tag = "Sales",
    request_body = CreateSale,
    responses(
        (status = 201, description = "Venda registrada (estoque, número e financeiro na mesma transação)", body = SaleDetail),
        (status = 409, description = "Estoque ou saldo insuficiente")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_sale(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSalesWrite>,
    Json(payload): Json<CreateSale>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sale = app_state.sales_service.create_sale(payload).await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

// GET /api/sales/{id}
#[utoipa::path(
    get,
    path = "/api/sales/{id}",
    tag = "Sales",
    responses(
        (status = 200, description = "Venda com itens", body = SaleDetail),
        (status = 404, description = "Venda não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da venda")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_sale(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let sale = app_state.sales_service.get_sale(id).await?;
    Ok(Json(sale))
}

// POST /api/sales/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/sales/{id}/cancel",
    tag = "Sales",
    responses(
        (status = 200, description = "Venda cancelada, estoque e financeiro estornados", body = Sale),
        (status = 409, description = "Venda já cancelada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da venda")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_sale(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSalesWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let sale = app_state.sales_service.cancel_sale(id).await?;
    Ok(Json(sale))
}

// POST /api/sales/import
#[utoipa::path(
    post,
    path = "/api/sales/import",
    tag = "Sales",
    request_body = ExternalInvoice,
    responses(
        (status = 201, description = "Documento importado como venda", body = SaleDetail),
        (status = 409, description = "Documento já importado")
    ),
    security(("api_jwt" = []))
)]
pub async fn import_external_invoice(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSalesWrite>,
    Json(payload): Json<ExternalInvoice>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sale = app_state.sales_service.import_external_invoice(payload).await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

// =============================================================================
//  DEVOLUÇÕES E PAGAMENTOS
// =============================================================================

// POST /api/returns
#[utoipa::path(
    post,
    path = "/api/returns",
    tag = "Sales",
    request_body = CreateReturn,
    responses(
        (status = 201, description = "Devolução registrada", body = ReturnDetail),
        (status = 409, description = "Quantidade maior que a disponível ou venda cancelada")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_return(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSalesWrite>,
    Json(payload): Json<CreateReturn>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let detail = app_state.sales_service.create_return(payload).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

// POST /api/payments
#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "Finance",
    request_body = CreatePayment,
    responses(
        (status = 201, description = "Pagamento registrado", body = Payment),
        (status = 409, description = "Saldo insuficiente na conta")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_payment(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermFinanceWrite>,
    Json(payload): Json<CreatePayment>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let payment = app_state.payment_service.create_payment(payload).await?;

    Ok((StatusCode::CREATED, Json(payment)))
}
