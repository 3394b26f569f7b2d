// src/models/crm.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- ENUMS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "customer_transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CustomerTransactionKind {
    Debt,   // Cliente passa a dever (valor negativo)
    Credit, // Cliente paga / recebe crédito (valor positivo)
}

impl CustomerTransactionKind {
    /// O sinal do valor precisa bater com o tipo do lançamento.
    pub fn accepts(self, signed_amount: Decimal) -> bool {
        match self {
            CustomerTransactionKind::Debt => signed_amount < Decimal::ZERO,
            CustomerTransactionKind::Credit => signed_amount > Decimal::ZERO,
        }
    }
}

// --- CLIENTE ---

// Convenção de saldo: negativo = o cliente deve ao tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,

    #[schema(ignore)]
    pub tenant_id: Uuid,

    #[schema(example = "Yılmaz Gıda Ltd.")]
    pub name: String,

    #[schema(example = "1234567890")]
    pub tax_id: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,

    #[schema(example = "-1180.00")]
    pub balance: Decimal,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Alteração parcial: só os campos `Some` entram no UPDATE.
#[derive(Debug, Clone, Default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

// --- CONTA CORRENTE DO CLIENTE ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountTransaction {
    pub id: Uuid,

    #[schema(ignore)]
    pub tenant_id: Uuid,

    pub customer_id: Uuid,
    pub kind: CustomerTransactionKind,

    #[schema(example = "-1180.00")]
    pub amount: Decimal,

    pub balance_after: Decimal,
    pub description: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Cliente + conta corrente, na ordem em que os lançamentos aconteceram.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStatement {
    #[serde(flatten)]
    pub customer: Customer,
    pub transactions: Vec<AccountTransaction>,
}
