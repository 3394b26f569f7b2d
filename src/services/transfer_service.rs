// src/services/transfer_service.rs

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{begin_transaction, TxSettings},
        error::AppError,
    },
    db::{
        sales_repo::{StockTransferItemRow, StockTransferRow},
        SalesRepository,
    },
    middleware::tenancy,
    models::{
        finance::Reference,
        inventory::StockMovementType,
        sales::{CreateStockTransfer, DocumentKind, StockTransferDetail},
    },
    services::{
        inventory_service::InventoryService, numbering_service::NumberingService,
        tenancy_service::TenantService,
    },
};

#[derive(Clone)]
pub struct TransferService {
    repo: SalesRepository,
    tenant_service: TenantService,
    inventory_service: InventoryService,
    numbering_service: NumberingService,
    pool: PgPool,
    tx: TxSettings,
}

impl TransferService {
    pub fn new(
        repo: SalesRepository,
        tenant_service: TenantService,
        inventory_service: InventoryService,
        numbering_service: NumberingService,
        pool: PgPool,
        tx: TxSettings,
    ) -> Self {
        Self {
            repo,
            tenant_service,
            inventory_service,
            numbering_service,
            pool,
            tx,
        }
    }

    /// Move quantidades entre dois depósitos. O total do produto não muda: cada linha
    /// gera uma saída na origem e uma entrada no destino com a mesma referência.
    pub async fn create_transfer(
        &self,
        cmd: CreateStockTransfer,
    ) -> Result<StockTransferDetail, AppError> {
        if cmd.from_warehouse_id == cmd.to_warehouse_id {
            return Err(AppError::conflict("Os depósitos de origem e destino devem ser diferentes."));
        }

        let mut tx = begin_transaction(&self.pool, &self.tx).await?;
        let tenant_id = self.tenant_service.ensure_operational(&mut tx).await?;

        for warehouse_id in [cmd.from_warehouse_id, cmd.to_warehouse_id] {
            let warehouse = self.inventory_service.find_warehouse(&mut tx, warehouse_id).await?;
            if !warehouse.is_active {
                return Err(AppError::conflict(format!(
                    "O depósito '{}' está inativo.",
                    warehouse.name
                )));
            }
        }

        let transfer_id = Uuid::new_v4();
        let reference = Some(Reference::new("stock_transfer", transfer_id));

        let mut lines = cmd.lines.clone();
        lines.sort_by_key(|l| l.product_id);

        for line in &lines {
            self.inventory_service
                .decrement(
                    &mut tx,
                    line.product_id,
                    Some(cmd.from_warehouse_id),
                    line.quantity,
                    StockMovementType::TransferOut,
                    reference,
                )
                .await?;
            self.inventory_service
                .increment_stock(
                    &mut tx,
                    line.product_id,
                    Some(cmd.to_warehouse_id),
                    line.quantity,
                    StockMovementType::TransferIn,
                    reference,
                )
                .await?;
        }

        let transfer_number = self
            .numbering_service
            .next_for(&mut tx, tenant_id, DocumentKind::StockTransfer, Utc::now())
            .await?;

        let header = self
            .repo
            .insert_stock_transfer(
                &mut *tx,
                &StockTransferRow {
                    id: transfer_id,
                    transfer_number,
                    from_warehouse_id: cmd.from_warehouse_id,
                    to_warehouse_id: cmd.to_warehouse_id,
                    notes: cmd.notes.clone(),
                    created_by: tenancy::current_user_id(),
                },
            )
            .await?;

        let mut items = Vec::with_capacity(cmd.lines.len());
        for line in &cmd.lines {
            items.push(
                self.repo
                    .insert_stock_transfer_item(
                        &mut *tx,
                        &StockTransferItemRow {
                            transfer_id,
                            product_id: line.product_id,
                            quantity: line.quantity,
                        },
                    )
                    .await?,
            );
        }

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            number = %header.transfer_number,
            lines = items.len(),
            "🚚 Transferência entre depósitos registrada"
        );
        Ok(StockTransferDetail { header, items })
    }
}
