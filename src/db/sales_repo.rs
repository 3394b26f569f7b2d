// src/db/sales_repo.rs

use rust_decimal::Decimal;
use sqlx::{query_builder::Separated, Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::scoped_repo::{push_tenant_predicate, InsertRow, ScopedRepository, TenantEntity, UpdateRow},
    models::sales::{
        DocumentStatus, EDocument, Payment, PaymentDirection, PaymentMethod, ReturnItem, Sale,
        SaleItem, SaleReturn, SaleStatus, StockTransfer, StockTransferItem,
    },
};

// --- Mapeamento das tabelas ---

impl TenantEntity for Sale {
    const TABLE: &'static str = "sales";
    const ENTITY: &'static str = "Venda";
}

impl TenantEntity for SaleItem {
    const TABLE: &'static str = "sale_items";
    const ENTITY: &'static str = "Item da venda";
    const UPDATED_AT: Option<&'static str> = None;
}

impl TenantEntity for SaleReturn {
    const TABLE: &'static str = "sale_returns";
    const ENTITY: &'static str = "Devolução";
    const UPDATED_AT: Option<&'static str> = None;
}

impl TenantEntity for ReturnItem {
    const TABLE: &'static str = "return_items";
    const ENTITY: &'static str = "Item da devolução";
    const UPDATED_AT: Option<&'static str> = None;
}

impl TenantEntity for StockTransfer {
    const TABLE: &'static str = "stock_transfers";
    const ENTITY: &'static str = "Transferência de estoque";
    const UPDATED_AT: Option<&'static str> = None;
}

impl TenantEntity for StockTransferItem {
    const TABLE: &'static str = "stock_transfer_items";
    const ENTITY: &'static str = "Item da transferência";
    const UPDATED_AT: Option<&'static str> = None;
}

impl TenantEntity for Payment {
    const TABLE: &'static str = "payments";
    const ENTITY: &'static str = "Pagamento";
    const UPDATED_AT: Option<&'static str> = None;
}

impl TenantEntity for EDocument {
    const TABLE: &'static str = "e_documents";
    const ENTITY: &'static str = "Documento eletrônico";
}

// --- Linhas de INSERT ---

#[derive(Debug, Clone)]
pub struct SaleRow {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub vat_total: Decimal,
    pub grand_total: Decimal,
    pub external_document_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

impl InsertRow for SaleRow {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "invoice_number",
        "customer_id",
        "warehouse_id",
        "account_id",
        "payment_method",
        "subtotal",
        "discount_total",
        "vat_total",
        "grand_total",
        "external_document_id",
        "notes",
        "created_by",
    ];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.id)
            .push_bind(self.invoice_number.clone())
            .push_bind(self.customer_id)
            .push_bind(self.warehouse_id)
            .push_bind(self.account_id)
            .push_bind(self.payment_method)
            .push_bind(self.subtotal)
            .push_bind(self.discount_total)
            .push_bind(self.vat_total)
            .push_bind(self.grand_total)
            .push_bind(self.external_document_id.clone())
            .push_bind(self.notes.clone())
            .push_bind(self.created_by);
    }
}

#[derive(Debug, Clone)]
pub struct SaleItemRow {
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_rate: Decimal,
    pub vat_rate: Decimal,
    pub line_subtotal: Decimal,
    pub discount_amount: Decimal,
    pub vat_amount: Decimal,
    pub line_total: Decimal,
}

impl InsertRow for SaleItemRow {
    const COLUMNS: &'static [&'static str] = &[
        "sale_id",
        "product_id",
        "product_name",
        "quantity",
        "unit_price",
        "discount_rate",
        "vat_rate",
        "line_subtotal",
        "discount_amount",
        "vat_amount",
        "line_total",
    ];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.sale_id)
            .push_bind(self.product_id)
            .push_bind(self.product_name.clone())
            .push_bind(self.quantity)
            .push_bind(self.unit_price)
            .push_bind(self.discount_rate)
            .push_bind(self.vat_rate)
            .push_bind(self.line_subtotal)
            .push_bind(self.discount_amount)
            .push_bind(self.vat_amount)
            .push_bind(self.line_total);
    }
}

#[derive(Debug, Clone)]
pub struct ReturnRow {
    pub id: Uuid,
    pub return_number: String,
    pub sale_id: Uuid,
    pub refund_account_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub reason: Option<String>,
    pub created_by: Option<Uuid>,
}

impl InsertRow for ReturnRow {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "return_number",
        "sale_id",
        "refund_account_id",
        "total_amount",
        "reason",
        "created_by",
    ];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.id)
            .push_bind(self.return_number.clone())
            .push_bind(self.sale_id)
            .push_bind(self.refund_account_id)
            .push_bind(self.total_amount)
            .push_bind(self.reason.clone())
            .push_bind(self.created_by);
    }
}

#[derive(Debug, Clone)]
pub struct ReturnItemRow {
    pub return_id: Uuid,
    pub sale_item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub line_total: Decimal,
}

impl InsertRow for ReturnItemRow {
    const COLUMNS: &'static [&'static str] =
        &["return_id", "sale_item_id", "product_id", "quantity", "line_total"];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.return_id)
            .push_bind(self.sale_item_id)
            .push_bind(self.product_id)
            .push_bind(self.quantity)
            .push_bind(self.line_total);
    }
}

#[derive(Debug, Clone)]
pub struct StockTransferRow {
    pub id: Uuid,
    pub transfer_number: String,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

impl InsertRow for StockTransferRow {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "transfer_number",
        "from_warehouse_id",
        "to_warehouse_id",
        "notes",
        "created_by",
    ];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.id)
            .push_bind(self.transfer_number.clone())
            .push_bind(self.from_warehouse_id)
            .push_bind(self.to_warehouse_id)
            .push_bind(self.notes.clone())
            .push_bind(self.created_by);
    }
}

#[derive(Debug, Clone)]
pub struct StockTransferItemRow {
    pub transfer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
}

impl InsertRow for StockTransferItemRow {
    const COLUMNS: &'static [&'static str] = &["transfer_id", "product_id", "quantity"];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.transfer_id)
            .push_bind(self.product_id)
            .push_bind(self.quantity);
    }
}

#[derive(Debug, Clone)]
pub struct PaymentRow {
    pub id: Uuid,
    pub payment_number: String,
    pub customer_id: Uuid,
    pub account_id: Uuid,
    pub direction: PaymentDirection,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
}

impl InsertRow for PaymentRow {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "payment_number",
        "customer_id",
        "account_id",
        "direction",
        "amount",
        "description",
        "created_by",
    ];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.id)
            .push_bind(self.payment_number.clone())
            .push_bind(self.customer_id)
            .push_bind(self.account_id)
            .push_bind(self.direction)
            .push_bind(self.amount)
            .push_bind(self.description.clone())
            .push_bind(self.created_by);
    }
}

#[derive(Debug, Clone)]
pub struct EDocumentRow {
    pub document_number: String,
    pub sale_id: Uuid,
}

impl InsertRow for EDocumentRow {
    const COLUMNS: &'static [&'static str] = &["document_number", "sale_id"];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.document_number.clone())
            .push_bind(self.sale_id);
    }
}

// --- Alterações ---

struct SaleCancellation;

impl UpdateRow for SaleCancellation {
    fn push_assignments<'args>(&self, set: &mut Separated<'_, 'args, Postgres, &'static str>) -> usize {
        set.push("status = ").push_bind_unseparated(SaleStatus::Cancelled);
        set.push("cancelled_at = NOW()");
        2
    }
}

struct StatusChange {
    status: DocumentStatus,
    note: Option<String>,
}

impl UpdateRow for StatusChange {
    fn push_assignments<'args>(&self, set: &mut Separated<'_, 'args, Postgres, &'static str>) -> usize {
        set.push("status = ").push_bind_unseparated(self.status);
        set.push("status_note = ").push_bind_unseparated(self.note.clone());
        2
    }
}

#[derive(Clone)]
pub struct SalesRepository {
    sales: ScopedRepository<Sale>,
    items: ScopedRepository<SaleItem>,
    returns: ScopedRepository<SaleReturn>,
    return_items: ScopedRepository<ReturnItem>,
    transfers: ScopedRepository<StockTransfer>,
    transfer_items: ScopedRepository<StockTransferItem>,
    payments: ScopedRepository<Payment>,
    documents: ScopedRepository<EDocument>,
}

impl SalesRepository {
    pub fn new(require_context: bool) -> Self {
        Self {
            sales: ScopedRepository::new(require_context),
            items: ScopedRepository::new(require_context),
            returns: ScopedRepository::new(require_context),
            return_items: ScopedRepository::new(require_context),
            transfers: ScopedRepository::new(require_context),
            transfer_items: ScopedRepository::new(require_context),
            payments: ScopedRepository::new(require_context),
            documents: ScopedRepository::new(require_context),
        }
    }

    // =========================================================================
    //  VENDAS
    // =========================================================================

    pub async fn insert_sale<'e, E>(&self, executor: E, row: &SaleRow) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.sales.create(executor, row).await
    }

    pub async fn insert_sale_item<'e, E>(&self, executor: E, row: &SaleItemRow) -> Result<SaleItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.items.create(executor, row).await
    }

    pub async fn find_sale<'e, E>(&self, executor: E, id: Uuid) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.sales.find_by_id(executor, id).await
    }

    pub async fn lock_sale<'e, E>(&self, executor: E, id: Uuid) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.sales.find_by_id_for_update(executor, id).await
    }

    pub async fn sale_items<'e, E>(&self, executor: E, sale_id: Uuid) -> Result<Vec<SaleItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = self.items.scoped_query(Some("si"))?;
        qb.push(" AND si.sale_id = ")
            .push_bind(sale_id)
            .push(" ORDER BY si.created_at ASC, si.id ASC");

        let items = qb.build_query_as::<SaleItem>().fetch_all(executor).await?;
        Ok(items)
    }

    pub async fn lock_sale_item<'e, E>(&self, executor: E, id: Uuid) -> Result<SaleItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.items.find_by_id_for_update(executor, id).await
    }

    pub async fn find_sale_by_external_id<'e, E>(
        &self,
        executor: E,
        external_id: &str,
    ) -> Result<Option<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = self.sales.scoped_query(None)?;
        qb.push(" AND external_document_id = ")
            .push_bind(external_id.to_string());

        let sale = qb.build_query_as::<Sale>().fetch_optional(executor).await?;
        Ok(sale)
    }

    pub async fn mark_sale_cancelled<'e, E>(&self, executor: E, id: Uuid) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.sales.update(executor, id, &SaleCancellation).await
    }

    pub async fn add_returned_quantity<'e, E>(
        &self,
        executor: E,
        sale_item_id: Uuid,
        quantity: Decimal,
    ) -> Result<SaleItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let scope = self.items.scope()?;
        let mut qb = QueryBuilder::<Postgres>::new(
            "UPDATE sale_items SET returned_quantity = returned_quantity + ",
        );
        qb.push_bind(quantity).push(" WHERE id = ").push_bind(sale_item_id);
        push_tenant_predicate(&mut qb, scope, None, "tenant_id");
        qb.push(" RETURNING *");

        qb.build_query_as::<SaleItem>()
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::not_found(SaleItem::ENTITY))
    }

    // =========================================================================
    //  DEVOLUÇÕES
    // =========================================================================

    pub async fn insert_return<'e, E>(&self, executor: E, row: &ReturnRow) -> Result<SaleReturn, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.returns.create(executor, row).await
    }

    pub async fn insert_return_item<'e, E>(
        &self,
        executor: E,
        row: &ReturnItemRow,
    ) -> Result<ReturnItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.return_items.create(executor, row).await
    }

    // =========================================================================
    //  TRANSFERÊNCIAS DE ESTOQUE
    // =========================================================================

    pub async fn insert_stock_transfer<'e, E>(
        &self,
        executor: E,
        row: &StockTransferRow,
    ) -> Result<StockTransfer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.transfers.create(executor, row).await
    }

    pub async fn insert_stock_transfer_item<'e, E>(
        &self,
        executor: E,
        row: &StockTransferItemRow,
    ) -> Result<StockTransferItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.transfer_items.create(executor, row).await
    }

    // =========================================================================
    //  PAGAMENTOS
    // =========================================================================

    pub async fn insert_payment<'e, E>(&self, executor: E, row: &PaymentRow) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.payments.create(executor, row).await
    }

    // =========================================================================
    //  DOCUMENTOS ELETRÔNICOS
    // =========================================================================

    pub async fn insert_edocument<'e, E>(&self, executor: E, row: &EDocumentRow) -> Result<EDocument, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.documents.create(executor, row).await
    }

    pub async fn lock_edocument<'e, E>(&self, executor: E, id: Uuid) -> Result<EDocument, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.documents.find_by_id_for_update(executor, id).await
    }

    pub async fn set_edocument_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: DocumentStatus,
        note: Option<String>,
    ) -> Result<EDocument, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.documents
            .update(executor, id, &StatusChange { status, note })
            .await
    }
}
