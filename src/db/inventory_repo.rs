// src/db/inventory_repo.rs

use rust_decimal::Decimal;
use sqlx::{query_builder::Separated, Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::scoped_repo::{push_tenant_predicate, InsertRow, ScopedRepository, TenantEntity},
    models::{
        finance::Reference,
        inventory::{
            NewProduct, NewWarehouse, Product, StockMovement, StockMovementType, Warehouse,
            WarehouseStock,
        },
    },
};

impl TenantEntity for Product {
    const TABLE: &'static str = "products";
    const ENTITY: &'static str = "Produto";
}

impl TenantEntity for Warehouse {
    const TABLE: &'static str = "warehouses";
    const ENTITY: &'static str = "Depósito";
    const UPDATED_AT: Option<&'static str> = None;
}

impl TenantEntity for WarehouseStock {
    const TABLE: &'static str = "warehouse_stocks";
    const ENTITY: &'static str = "Estoque do depósito";
}

impl TenantEntity for StockMovement {
    const TABLE: &'static str = "stock_movements";
    const ENTITY: &'static str = "Movimentação de estoque";
    const UPDATED_AT: Option<&'static str> = None;
}

impl InsertRow for NewProduct {
    const COLUMNS: &'static [&'static str] = &["name", "sku", "unit_price", "vat_rate"];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.name.clone())
            .push_bind(self.sku.clone())
            .push_bind(self.unit_price)
            .push_bind(self.vat_rate);
    }
}

impl InsertRow for NewWarehouse {
    const COLUMNS: &'static [&'static str] = &["name"];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values.push_bind(self.name.clone());
    }
}

#[derive(Debug, Clone)]
pub struct StockMovementRow {
    pub product_id: Uuid,
    pub warehouse_id: Option<Uuid>,
    pub movement_type: StockMovementType,
    pub quantity: Decimal,
    pub quantity_after: Decimal,
    pub reference: Option<Reference>,
    pub note: Option<String>,
    pub created_by: Option<Uuid>,
}

impl InsertRow for StockMovementRow {
    const COLUMNS: &'static [&'static str] = &[
        "product_id",
        "warehouse_id",
        "movement_type",
        "quantity",
        "quantity_after",
        "reference_type",
        "reference_id",
        "note",
        "created_by",
    ];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.product_id)
            .push_bind(self.warehouse_id)
            .push_bind(self.movement_type)
            .push_bind(self.quantity)
            .push_bind(self.quantity_after)
            .push_bind(self.reference.map(|r| r.kind))
            .push_bind(self.reference.map(|r| r.id))
            .push_bind(self.note.clone())
            .push_bind(self.created_by);
    }
}

#[derive(Clone)]
pub struct InventoryRepository {
    products: ScopedRepository<Product>,
    warehouses: ScopedRepository<Warehouse>,
    stocks: ScopedRepository<WarehouseStock>,
    movements: ScopedRepository<StockMovement>,
}

impl InventoryRepository {
    pub fn new(require_context: bool) -> Self {
        Self {
            products: ScopedRepository::new(require_context),
            warehouses: ScopedRepository::new(require_context),
            stocks: ScopedRepository::new(require_context),
            movements: ScopedRepository::new(require_context),
        }
    }

    // ---
    // Produtos
    // ---

    pub async fn create_product<'e, E>(&self, executor: E, new: &NewProduct) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.products.create(executor, new).await
    }

    pub async fn find_product<'e, E>(&self, executor: E, id: Uuid) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.products.find_by_id(executor, id).await
    }

    /// Trava a linha do produto. Sempre o primeiro bloqueio de uma mutação de estoque.
    pub async fn lock_product<'e, E>(&self, executor: E, id: Uuid) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.products.find_by_id_for_update(executor, id).await
    }

    /// Casamento por nome, sem diferenciar maiúsculas (usado na importação de documentos).
    /// Não trava: o bloqueio do produto acontece depois, na ordem crescente de id.
    pub async fn find_product_by_name<'e, E>(
        &self,
        executor: E,
        name: &str,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = self.products.scoped_query(None)?;
        qb.push(" AND lower(name) = lower(")
            .push_bind(name.trim().to_string())
            .push(") ORDER BY created_at ASC LIMIT 1");

        let product = qb.build_query_as::<Product>().fetch_optional(executor).await?;
        Ok(product)
    }

    pub async fn apply_product_delta<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        delta: Decimal,
    ) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let scope = self.products.scope()?;
        let mut qb = QueryBuilder::<Postgres>::new(
            "UPDATE products SET stock_quantity = stock_quantity + ",
        );
        qb.push_bind(delta)
            .push(", updated_at = NOW() WHERE id = ")
            .push_bind(product_id);
        push_tenant_predicate(&mut qb, scope, None, "tenant_id");
        qb.push(" RETURNING stock_quantity");

        qb.build_query_scalar::<Decimal>()
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::not_found(Product::ENTITY))
    }

    // ---
    // Depósitos
    // ---

    pub async fn create_warehouse<'e, E>(
        &self,
        executor: E,
        new: &NewWarehouse,
    ) -> Result<Warehouse, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.warehouses.create(executor, new).await
    }

    pub async fn find_warehouse<'e, E>(&self, executor: E, id: Uuid) -> Result<Warehouse, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.warehouses.find_by_id(executor, id).await
    }

    /// Trava o saldo do par (depósito, produto). `None` = ainda não existe (quantidade 0).
    pub async fn lock_warehouse_stock<'e, E>(
        &self,
        executor: E,
        warehouse_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<WarehouseStock>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = self.stocks.scoped_query(None)?;
        qb.push(" AND warehouse_id = ")
            .push_bind(warehouse_id)
            .push(" AND product_id = ")
            .push_bind(product_id)
            .push(" FOR UPDATE");

        let stock = qb.build_query_as::<WarehouseStock>().fetch_optional(executor).await?;
        Ok(stock)
    }

    /// Soma `delta` ao saldo do depósito, criando a linha se ainda não existir.
    ///
    /// O CHECK `quantity >= 0` vale para a linha proposta no INSERT antes do
    /// ON CONFLICT, então ela nunca leva o delta negativo. Uma saída só chega aqui
    /// com a linha existente e travada por `lock_warehouse_stock`.
    pub async fn apply_warehouse_delta<'e, E>(
        &self,
        executor: E,
        warehouse_id: Uuid,
        product_id: Uuid,
        delta: Decimal,
    ) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tenant_id = self.stocks.scope()?.require_tenant()?;

        let quantity = sqlx::query_scalar::<_, Decimal>(
            r#"
            INSERT INTO warehouse_stocks (tenant_id, warehouse_id, product_id, quantity)
            VALUES ($1, $2, $3, GREATEST($4::numeric, 0))
            ON CONFLICT (warehouse_id, product_id) DO UPDATE
                SET quantity = warehouse_stocks.quantity + $4::numeric,
                    updated_at = NOW()
            RETURNING quantity
            "#,
        )
        .bind(tenant_id)
        .bind(warehouse_id)
        .bind(product_id)
        .bind(delta)
        .fetch_one(executor)
        .await?;

        Ok(quantity)
    }

    pub async fn stocks_for_product<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
    ) -> Result<Vec<WarehouseStock>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = self.stocks.scoped_query(None)?;
        qb.push(" AND product_id = ")
            .push_bind(product_id)
            .push(" ORDER BY warehouse_id");

        let stocks = qb.build_query_as::<WarehouseStock>().fetch_all(executor).await?;
        Ok(stocks)
    }

    // ---
    // Histórico
    // ---

    pub async fn insert_movement<'e, E>(
        &self,
        executor: E,
        row: &StockMovementRow,
    ) -> Result<StockMovement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.movements.create(executor, row).await
    }
}
