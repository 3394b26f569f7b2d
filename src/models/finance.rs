// src/models/finance.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "account_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Cash, // Caixa
    Bank, // Banco
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "movement_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementCategory {
    Income,
    Expense,
    TransferIn,
    TransferOut,
    Sale,
    Refund,
    PaymentIn,
    PaymentOut,
}

/// Lançamento manual: entrada soma, saída subtrai.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ManualMovementKind {
    Income,
    Expense,
}

impl ManualMovementKind {
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            ManualMovementKind::Income => amount,
            ManualMovementKind::Expense => -amount,
        }
    }

    pub fn category(self) -> MovementCategory {
        match self {
            ManualMovementKind::Income => MovementCategory::Income,
            ManualMovementKind::Expense => MovementCategory::Expense,
        }
    }
}

/// Origem de um lançamento (venda, devolução, pagamento...). Guardada só para rastreio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub kind: &'static str,
    pub id: Uuid,
}

impl Reference {
    pub fn new(kind: &'static str, id: Uuid) -> Self {
        Self { kind, id }
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,

    #[schema(ignore)]
    pub tenant_id: Uuid,

    #[schema(example = "Kasa")]
    pub name: String,

    pub account_type: AccountType,

    #[schema(example = "TRY")]
    pub currency: String,

    #[schema(example = "50000.00")]
    pub opening_balance: Decimal,

    #[schema(example = "62500.00")]
    pub current_balance: Decimal,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub account_type: AccountType,
    pub currency: String,
    pub opening_balance: Decimal,
}

/// Linha imutável do extrato de uma conta.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountMovement {
    pub id: Uuid,

    #[schema(ignore)]
    pub tenant_id: Uuid,

    pub account_id: Uuid,
    pub category: MovementCategory,

    #[schema(example = "-150.00")]
    pub amount: Decimal, // Positivo = Entrada, Negativo = Saída

    #[schema(example = "62500.00")]
    pub balance_after: Decimal,

    pub description: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub transfer_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountTransfer {
    pub id: Uuid,

    #[schema(ignore)]
    pub tenant_id: Uuid,

    pub from_account_id: Uuid,
    pub to_account_id: Uuid,

    #[schema(example = "10000.00")]
    pub amount: Decimal,

    pub description: Option<String>,
    pub out_movement_id: Uuid,
    pub in_movement_id: Uuid,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transfer: AccountTransfer,
    pub out_movement: AccountMovement,
    pub in_movement: AccountMovement,
}

/// Conta com o extrato completo, em ordem de gravação.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatement {
    pub account: Account,
    pub movements: Vec<AccountMovement>,
}
