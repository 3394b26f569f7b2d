// src/handlers/finance.rs

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
        validation::{validate_not_negative, validate_positive},
    },
    config::AppState,
    middleware::rbac::{PermFinanceWrite, RequirePermission},
    models::finance::{
        Account, AccountMovement, AccountStatement, AccountType, ManualMovementKind, NewAccount,
        TransferReceipt,
    },
};

fn default_currency() -> String {
    "TRY".to_string()
}

// =============================================================================
//  CONTAS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Caixa da loja")]
    pub name: String,

    #[schema(example = "cash")]
    pub account_type: AccountType,

    #[validate(length(equal = 3, message = "A moeda deve ter 3 letras (ISO 4217)."))]
    #[serde(default = "default_currency")]
    #[schema(example = "TRY")]
    pub currency: String,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    #[schema(example = "50000.00")]
    pub opening_balance: Decimal,
}

// POST /api/accounts
#[utoipa::path(
    post,
    path = "/api/accounts",
    tag = "Finance",
    request_body = CreateAccountPayload,
    responses(
        (status = 201, description = "Conta criada; saldo atual = saldo de abertura", body = Account)
    ),
    security(("api_jwt" = []))
)]
pub async fn create_account(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermFinanceWrite>,
    Json(payload): Json<CreateAccountPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let account = app_state
        .ledger_service
        .create_account(NewAccount {
            name: payload.name.trim().to_string(),
            account_type: payload.account_type,
            currency: payload.currency.to_uppercase(),
            opening_balance: payload.opening_balance,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

// GET /api/accounts/{id}
#[utoipa::path(
    get,
    path = "/api/accounts/{id}",
    tag = "Finance",
    responses(
        (status = 200, description = "Conta com extrato", body = AccountStatement),
        (status = 404, description = "Conta não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da conta")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_account(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let statement = app_state.ledger_service.get_account(id).await?;
    Ok(Json(statement))
}

// =============================================================================
//  LANÇAMENTOS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMovementPayload {
    #[schema(example = "income")]
    pub kind: ManualMovementKind,

    #[validate(custom(function = "validate_positive"))]
    #[schema(example = "12500.00")]
    pub amount: Decimal,

    pub description: Option<String>,
}

// POST /api/accounts/{id}/movements
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/movements",
    tag = "Finance",
    request_body = AddMovementPayload,
    responses(
        (status = 201, description = "Lançamento registrado", body = AccountMovement),
        (status = 409, description = "Saldo insuficiente")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da conta")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_movement(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermFinanceWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddMovementPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let movement = app_state
        .ledger_service
        .add_movement(id, payload.kind, payload.amount, payload.description)
        .await?;

    Ok((StatusCode::CREATED, Json(movement)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountTransferPayload {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,

    #[validate(custom(function = "validate_positive"))]
    #[schema(example = "10000.00")]
    pub amount: Decimal,

    pub description: Option<String>,
}

// POST /api/accounts/transfers
#[utoipa::path(
    post,
    path = "/api/accounts/transfers",
    tag = "Finance",
    request_body = AccountTransferPayload,
    responses(
        (status = 201, description = "Transferência registrada (saída + entrada)", body = TransferReceipt),
        (status = 409, description = "Saldo insuficiente ou mesma conta")
    ),
    security(("api_jwt" = []))
)]
pub async fn transfer(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermFinanceWrite>,
    Json(payload): Json<AccountTransferPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let receipt = app_state
        .ledger_service
        .transfer(
            payload.from_account_id,
            payload.to_account_id,
            payload.amount,
            payload.description,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}
