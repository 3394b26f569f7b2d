// src/services/inventory_service.rs

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{begin_transaction, TxSettings},
        error::AppError,
    },
    db::{inventory_repo::StockMovementRow, InventoryRepository},
    middleware::tenancy,
    models::{
        finance::Reference,
        inventory::{
            AdjustMode, NewProduct, NewWarehouse, Product, StockChange, StockMovementType,
            Warehouse, WarehouseStock,
        },
    },
};

/// Uma mutação de contador de estoque.
#[derive(Debug, Clone)]
pub struct StockMutation {
    pub product_id: Uuid,
    pub warehouse_id: Option<Uuid>,
    pub delta: Decimal,
    pub movement_type: StockMovementType,
    pub reference: Option<Reference>,
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct InventoryService {
    repo: InventoryRepository,
    pool: PgPool,
    tx: TxSettings,
}

impl InventoryService {
    pub fn new(repo: InventoryRepository, pool: PgPool, tx: TxSettings) -> Self {
        Self { repo, pool, tx }
    }

    // ---
    // Controle de concorrência do estoque
    // ---

    /// Núcleo de toda mutação de estoque, dentro da transação de quem chama.
    ///
    /// 1. trava a linha do produto (sempre o primeiro bloqueio);
    /// 2. se houver depósito, trava a linha `(depósito, produto)`; linha ausente = quantidade 0;
    /// 3. saída maior que o saldo travado: `Conflict("Estoque insuficiente")`;
    /// 4. aplica o delta ao total do produto e, se houver, ao depósito;
    /// 5. grava o `StockMovement` com a quantidade resultante.
    pub async fn apply(
        &self,
        conn: &mut PgConnection,
        mutation: StockMutation,
    ) -> Result<StockChange, AppError> {
        let product = self.repo.lock_product(&mut *conn, mutation.product_id).await?;

        let current = match mutation.warehouse_id {
            Some(warehouse_id) => {
                self.repo.find_warehouse(&mut *conn, warehouse_id).await?;
                self.repo
                    .lock_warehouse_stock(&mut *conn, warehouse_id, product.id)
                    .await?
                    .map(|s| s.quantity)
                    .unwrap_or(Decimal::ZERO)
            }
            None => product.stock_quantity,
        };

        if mutation.delta.is_zero() {
            return Ok(StockChange {
                product_id: product.id,
                warehouse_id: mutation.warehouse_id,
                new_quantity: current,
                movement: None,
            });
        }

        if current + mutation.delta < Decimal::ZERO {
            tracing::debug!(
                product_id = %product.id,
                available = %current,
                requested = %(-mutation.delta),
                "estoque insuficiente"
            );
            return Err(AppError::conflict(format!(
                "Estoque insuficiente para '{}'.",
                product.name
            )));
        }

        let product_total = self
            .repo
            .apply_product_delta(&mut *conn, product.id, mutation.delta)
            .await?;

        let new_quantity = match mutation.warehouse_id {
            Some(warehouse_id) => {
                self.repo
                    .apply_warehouse_delta(&mut *conn, warehouse_id, product.id, mutation.delta)
                    .await?
            }
            None => product_total,
        };

        let movement = self
            .repo
            .insert_movement(
                &mut *conn,
                &StockMovementRow {
                    product_id: product.id,
                    warehouse_id: mutation.warehouse_id,
                    movement_type: mutation.movement_type,
                    quantity: mutation.delta,
                    quantity_after: new_quantity,
                    reference: mutation.reference,
                    note: mutation.note,
                    created_by: tenancy::current_user_id(),
                },
            )
            .await?;

        Ok(StockChange {
            product_id: product.id,
            warehouse_id: mutation.warehouse_id,
            new_quantity,
            movement: Some(movement),
        })
    }

    /// Saída de estoque de uma linha de venda ou de documento importado.
    /// Produto inativo não é vendido. Devolve o produto (para precificar a linha)
    /// e o saldo resultante.
    pub async fn decrement_for_sale(
        &self,
        conn: &mut PgConnection,
        product_id: Uuid,
        warehouse_id: Option<Uuid>,
        quantity: Decimal,
        movement_type: StockMovementType,
        reference: Option<Reference>,
    ) -> Result<(Product, Decimal), AppError> {
        let product = self.repo.find_product(&mut *conn, product_id).await?;
        if !product.is_active {
            return Err(AppError::conflict(format!(
                "O produto '{}' está inativo.",
                product.name
            )));
        }

        let new_quantity = self
            .decrement(conn, product_id, warehouse_id, quantity, movement_type, reference)
            .await?;
        Ok((product, new_quantity))
    }

    pub async fn decrement(
        &self,
        conn: &mut PgConnection,
        product_id: Uuid,
        warehouse_id: Option<Uuid>,
        quantity: Decimal,
        movement_type: StockMovementType,
        reference: Option<Reference>,
    ) -> Result<Decimal, AppError> {
        ensure_positive_quantity(quantity)?;
        let change = self
            .apply(
                conn,
                StockMutation {
                    product_id,
                    warehouse_id,
                    delta: -quantity,
                    movement_type,
                    reference,
                    note: None,
                },
            )
            .await?;
        Ok(change.new_quantity)
    }

    pub async fn increment_stock(
        &self,
        conn: &mut PgConnection,
        product_id: Uuid,
        warehouse_id: Option<Uuid>,
        quantity: Decimal,
        movement_type: StockMovementType,
        reference: Option<Reference>,
    ) -> Result<Decimal, AppError> {
        ensure_positive_quantity(quantity)?;
        let change = self
            .apply(
                conn,
                StockMutation {
                    product_id,
                    warehouse_id,
                    delta: quantity,
                    movement_type,
                    reference,
                    note: None,
                },
            )
            .await?;
        Ok(change.new_quantity)
    }

    /// Ajuste manual (`add`, `subtract`, `set`) com transação própria.
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        warehouse_id: Option<Uuid>,
        value: Decimal,
        mode: AdjustMode,
        note: Option<String>,
    ) -> Result<StockChange, AppError> {
        if value.is_sign_negative() {
            return Err(AppError::invalid("A quantidade do ajuste não pode ser negativa."));
        }

        let mut tx = begin_transaction(&self.pool, &self.tx).await?;

        // Trava na mesma ordem de `apply` para ler o saldo que será ajustado.
        let product = self.repo.lock_product(&mut *tx, product_id).await?;
        let current = match warehouse_id {
            Some(warehouse_id) => self
                .repo
                .lock_warehouse_stock(&mut *tx, warehouse_id, product.id)
                .await?
                .map(|s| s.quantity)
                .unwrap_or(Decimal::ZERO),
            None => product.stock_quantity,
        };

        let target = mode.apply(current, value)?;
        let change = self
            .apply(
                &mut tx,
                StockMutation {
                    product_id,
                    warehouse_id,
                    delta: target - current,
                    movement_type: StockMovementType::Adjustment,
                    reference: None,
                    note,
                },
            )
            .await?;

        tx.commit().await?;
        Ok(change)
    }

    // ---
    // Cadastro
    // ---

    pub async fn create_product(&self, new: NewProduct) -> Result<Product, AppError> {
        self.repo.create_product(&self.pool, &new).await
    }

    /// Busca por nome (sem diferenciar maiúsculas) ou cria com estoque zero.
    pub async fn resolve_or_create_product(
        &self,
        conn: &mut PgConnection,
        name: &str,
        unit_price: Decimal,
        vat_rate: Decimal,
    ) -> Result<Product, AppError> {
        if let Some(product) = self.repo.find_product_by_name(&mut *conn, name).await? {
            return Ok(product);
        }

        tracing::info!(name = %name.trim(), "Produto criado a partir de documento importado");
        self.repo
            .create_product(
                &mut *conn,
                &NewProduct {
                    name: name.trim().to_string(),
                    sku: None,
                    unit_price,
                    vat_rate,
                },
            )
            .await
    }

    pub async fn get_product(&self, id: Uuid) -> Result<(Product, Vec<WarehouseStock>), AppError> {
        let product = self.repo.find_product(&self.pool, id).await?;
        let stocks = self.repo.stocks_for_product(&self.pool, id).await?;
        Ok((product, stocks))
    }

    pub async fn create_warehouse(&self, new: NewWarehouse) -> Result<Warehouse, AppError> {
        self.repo.create_warehouse(&self.pool, &new).await
    }

    pub async fn find_warehouse(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Warehouse, AppError> {
        self.repo.find_warehouse(conn, id).await
    }
}

fn ensure_positive_quantity(quantity: Decimal) -> Result<(), AppError> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::invalid("A quantidade deve ser maior que zero."));
    }
    Ok(())
}
