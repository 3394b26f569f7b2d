// src/models/inventory.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- 1. Produtos ---
// `stock_quantity` é o total do tenant (soma dos depósitos + estoque sem depósito).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "Zeytinyağı 1L")]
    pub name: String,
    pub sku: Option<String>,
    #[schema(example = "250.00")]
    pub unit_price: Decimal,
    #[schema(example = "20")]
    pub vat_rate: Decimal,
    #[schema(example = "25")]
    pub stock_quantity: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
}

// --- 2. Depósitos ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "Merkez Depo")]
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWarehouse {
    pub name: String,
}

// --- 3. Saldo por depósito ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseStock {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

// --- 4. Movimentações de Estoque ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "stock_movement_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StockMovementType {
    Sale,
    SaleCancel,
    Return,
    TransferOut,
    TransferIn,
    Adjustment,
    Import,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Option<Uuid>,
    pub movement_type: StockMovementType,
    pub quantity: Decimal, // com sinal
    pub quantity_after: Decimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// --- 5. Ajuste manual ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdjustMode {
    Add,
    Subtract,
    Set,
}

impl AdjustMode {
    /// Calcula a nova quantidade a partir da atual. Nunca devolve valor negativo.
    pub fn apply(self, current: Decimal, value: Decimal) -> Result<Decimal, AppError> {
        if value.is_sign_negative() {
            return Err(AppError::invalid("A quantidade do ajuste não pode ser negativa."));
        }

        let target = match self {
            AdjustMode::Add => current + value,
            AdjustMode::Subtract => current - value,
            AdjustMode::Set => value,
        };

        if target < Decimal::ZERO {
            return Err(AppError::conflict("Estoque insuficiente"));
        }
        Ok(target)
    }
}

/// Resultado de uma mutação de contador: quantidade final + registro gravado (se houve delta).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
    pub product_id: Uuid,
    pub warehouse_id: Option<Uuid>,
    pub new_quantity: Decimal,
    pub movement: Option<StockMovement>,
}

/// Produto + saldo por depósito.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductStock {
    #[serde(flatten)]
    pub product: Product,
    pub warehouses: Vec<WarehouseStock>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_modes() {
        let q = Decimal::from(25);
        assert_eq!(AdjustMode::Add.apply(q, Decimal::from(5)).unwrap(), Decimal::from(30));
        assert_eq!(AdjustMode::Subtract.apply(q, Decimal::from(5)).unwrap(), Decimal::from(20));
        assert_eq!(AdjustMode::Set.apply(q, Decimal::from(7)).unwrap(), Decimal::from(7));
        assert_eq!(AdjustMode::Subtract.apply(q, q).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn adjust_never_goes_negative() {
        let err = AdjustMode::Subtract
            .apply(Decimal::from(25), Decimal::from(30))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = AdjustMode::Set.apply(Decimal::from(25), Decimal::from(-1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
