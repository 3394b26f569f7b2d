// src/services/sales_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{begin_transaction, TxSettings},
        error::AppError,
    },
    db::{
        sales_repo::{ReturnItemRow, ReturnRow, SaleItemRow, SaleRow},
        SalesRepository,
    },
    middleware::tenancy,
    models::{
        crm::CustomerTransactionKind,
        finance::{MovementCategory, Reference},
        inventory::StockMovementType,
        sales::{
            refund_for, CreateReturn, CreateSale, DocumentKind, ExternalInvoice, LinePricing,
            PaymentMethod, ReturnDetail, Sale, SaleDetail, SaleItem, SaleStatus, SaleTotals,
        },
    },
    services::{
        crm_service::CrmService,
        inventory_service::InventoryService,
        ledger_service::{LedgerService, Posting},
        numbering_service::NumberingService,
        tenancy_service::TenantService,
    },
};

/// Linha já resolvida para um produto existente. Preço/IVA `None` = cadastro do produto.
#[derive(Debug, Clone)]
struct DraftLine {
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Option<Decimal>,
    discount_rate: Decimal,
    vat_rate: Option<Decimal>,
}

/// Tudo o que `CreateSale` e a importação têm em comum.
#[derive(Debug, Clone)]
struct SaleDraft {
    customer_id: Option<Uuid>,
    warehouse_id: Option<Uuid>,
    account_id: Option<Uuid>,
    payment_method: PaymentMethod,
    lines: Vec<DraftLine>,
    movement_type: StockMovementType,
    external_document_id: Option<String>,
    notes: Option<String>,
}

#[derive(Clone)]
pub struct SalesService {
    repo: SalesRepository,
    tenant_service: TenantService,
    crm_service: CrmService,
    inventory_service: InventoryService,
    ledger_service: LedgerService,
    numbering_service: NumberingService,
    pool: PgPool,
    tx: TxSettings,
}

impl SalesService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: SalesRepository,
        tenant_service: TenantService,
        crm_service: CrmService,
        inventory_service: InventoryService,
        ledger_service: LedgerService,
        numbering_service: NumberingService,
        pool: PgPool,
        tx: TxSettings,
    ) -> Self {
        Self {
            repo,
            tenant_service,
            crm_service,
            inventory_service,
            ledger_service,
            numbering_service,
            pool,
            tx,
        }
    }

    // =========================================================================
    //  CRIAR VENDA
    // =========================================================================

    /// Venda completa em uma única transação: estoque, número, cabeçalho, itens e
    /// o lançamento financeiro (dívida do cliente ou entrada no caixa). Qualquer falha
    /// desfaz tudo.
    pub async fn create_sale(&self, cmd: CreateSale) -> Result<SaleDetail, AppError> {
        if cmd.payment_method.is_credit() && cmd.customer_id.is_none() {
            return Err(AppError::invalid("Venda a prazo exige um cliente."));
        }

        let mut tx = begin_transaction(&self.pool, &self.tx).await?;
        let tenant_id = self.tenant_service.ensure_operational(&mut tx).await?;

        let draft = SaleDraft {
            customer_id: cmd.customer_id,
            warehouse_id: cmd.warehouse_id,
            account_id: cmd.account_id,
            payment_method: cmd.payment_method,
            lines: cmd
                .lines
                .into_iter()
                .map(|l| DraftLine {
                    product_id: l.product_id,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    discount_rate: l.discount_rate,
                    vat_rate: l.vat_rate,
                })
                .collect(),
            movement_type: StockMovementType::Sale,
            external_document_id: None,
            notes: cmd.notes,
        };

        let detail = self.write_sale(&mut tx, tenant_id, draft).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            invoice = %detail.sale.invoice_number,
            total = %detail.sale.grand_total,
            "🧾 Venda registrada"
        );
        Ok(detail)
    }

    async fn write_sale(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        draft: SaleDraft,
    ) -> Result<SaleDetail, AppError> {
        self.resolve_references(&mut *conn, &draft).await?;

        let sale_id = Uuid::new_v4();
        let reference = Some(Reference::new("sale", sale_id));

        // Estoque primeiro, em ordem crescente de produto (ordem fixa de bloqueio).
        let mut order: Vec<usize> = (0..draft.lines.len()).collect();
        order.sort_by_key(|&i| draft.lines[i].product_id);

        let mut priced: Vec<Option<SaleItemRow>> = vec![None; draft.lines.len()];
        for i in order {
            let line = &draft.lines[i];
            let (product, _) = self
                .inventory_service
                .decrement_for_sale(
                    &mut *conn,
                    line.product_id,
                    draft.warehouse_id,
                    line.quantity,
                    draft.movement_type,
                    reference,
                )
                .await?;

            let unit_price = line.unit_price.unwrap_or(product.unit_price);
            let vat_rate = line.vat_rate.unwrap_or(product.vat_rate);
            let pricing = LinePricing::compute(line.quantity, unit_price, line.discount_rate, vat_rate);

            priced[i] = Some(SaleItemRow {
                sale_id,
                product_id: product.id,
                product_name: product.name,
                quantity: line.quantity,
                unit_price,
                discount_rate: line.discount_rate,
                vat_rate,
                line_subtotal: pricing.subtotal,
                discount_amount: pricing.discount,
                vat_amount: pricing.vat,
                line_total: pricing.total,
            });
        }
        let rows: Vec<SaleItemRow> = priced.into_iter().flatten().collect();

        let mut totals = SaleTotals::default();
        for row in &rows {
            totals.add(&LinePricing {
                subtotal: row.line_subtotal,
                discount: row.discount_amount,
                vat: row.vat_amount,
                total: row.line_total,
            });
        }

        let invoice_number = self
            .numbering_service
            .next_for(&mut *conn, tenant_id, DocumentKind::Invoice, Utc::now())
            .await?;

        let sale = self
            .repo
            .insert_sale(
                &mut *conn,
                &SaleRow {
                    id: sale_id,
                    invoice_number,
                    customer_id: draft.customer_id,
                    warehouse_id: draft.warehouse_id,
                    account_id: draft.account_id,
                    payment_method: draft.payment_method,
                    subtotal: totals.subtotal,
                    discount_total: totals.discount,
                    vat_total: totals.vat,
                    grand_total: totals.total,
                    external_document_id: draft.external_document_id,
                    notes: draft.notes,
                    created_by: tenancy::current_user_id(),
                },
            )
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(self.repo.insert_sale_item(&mut *conn, row).await?);
        }

        // Lado financeiro
        if sale.grand_total > Decimal::ZERO {
            match (sale.payment_method, sale.customer_id, sale.account_id) {
                (PaymentMethod::Credit, Some(customer_id), _) => {
                    self.ledger_service
                        .post_customer_transaction(
                            &mut *conn,
                            customer_id,
                            -sale.grand_total,
                            CustomerTransactionKind::Debt,
                            reference,
                            Some(format!("Venda {}", sale.invoice_number)),
                        )
                        .await?;
                }
                (PaymentMethod::Credit, None, _) => {
                    return Err(AppError::invalid("Venda a prazo exige um cliente."));
                }
                (_, _, Some(account_id)) => {
                    self.ledger_service
                        .post_movement(
                            &mut *conn,
                            Posting {
                                account_id,
                                amount: sale.grand_total,
                                category: MovementCategory::Sale,
                                reference,
                                description: Some(format!("Venda {}", sale.invoice_number)),
                            },
                        )
                        .await?;
                }
                _ => {}
            }
        }

        Ok(SaleDetail { sale, items })
    }

    /// Cliente, depósito e conta citados pela venda precisam ser do tenant e estar
    /// ativos, mesmo quando nenhum lançamento passa por eles (ex.: conta numa venda a
    /// prazo). Id de outro tenant e id inexistente dão o mesmo `NotFound`.
    async fn resolve_references(
        &self,
        conn: &mut PgConnection,
        draft: &SaleDraft,
    ) -> Result<(), AppError> {
        if let Some(customer_id) = draft.customer_id {
            let customer = self.crm_service.find_customer_in(&mut *conn, customer_id).await?;
            if !customer.is_active {
                return Err(AppError::conflict(format!(
                    "O cliente '{}' está inativo.",
                    customer.name
                )));
            }
        }

        if let Some(warehouse_id) = draft.warehouse_id {
            let warehouse = self.inventory_service.find_warehouse(&mut *conn, warehouse_id).await?;
            if !warehouse.is_active {
                return Err(AppError::conflict(format!(
                    "O depósito '{}' está inativo.",
                    warehouse.name
                )));
            }
        }

        if let Some(account_id) = draft.account_id {
            self.ledger_service.find_active_account(&mut *conn, account_id).await?;
        }
        Ok(())
    }

    // =========================================================================
    //  CANCELAR VENDA
    // =========================================================================

    /// Devolve ao estoque o que ainda não foi devolvido, estorna o saldo em aberto
    /// (crédito ao cliente ou estorno no caixa) e marca a venda como cancelada.
    pub async fn cancel_sale(&self, sale_id: Uuid) -> Result<Sale, AppError> {
        let mut tx = begin_transaction(&self.pool, &self.tx).await?;
        let tenant_id = self.tenant_service.ensure_operational(&mut tx).await?;

        let sale = self.repo.lock_sale(&mut *tx, sale_id).await?;
        if sale.status == SaleStatus::Cancelled {
            return Err(AppError::conflict(format!(
                "A venda {} já está cancelada.",
                sale.invoice_number
            )));
        }

        let reference = Some(Reference::new("sale_cancel", sale.id));
        let mut items = self.repo.sale_items(&mut *tx, sale.id).await?;
        items.sort_by_key(|i| i.product_id);

        for item in &items {
            let remaining = item.quantity - item.returned_quantity;
            if remaining > Decimal::ZERO {
                self.inventory_service
                    .increment_stock(
                        &mut tx,
                        item.product_id,
                        sale.warehouse_id,
                        remaining,
                        StockMovementType::SaleCancel,
                        reference,
                    )
                    .await?;
            }
        }

        let outstanding = outstanding_amount(&sale, &items);
        if outstanding > Decimal::ZERO {
            let description = Some(format!("Cancelamento da venda {}", sale.invoice_number));
            match (sale.payment_method, sale.customer_id, sale.account_id) {
                (PaymentMethod::Credit, Some(customer_id), _) => {
                    self.ledger_service
                        .post_customer_transaction(
                            &mut tx,
                            customer_id,
                            outstanding,
                            CustomerTransactionKind::Credit,
                            reference,
                            description,
                        )
                        .await?;
                }
                (PaymentMethod::Credit, None, _) => {}
                (_, _, Some(account_id)) => {
                    self.ledger_service
                        .post_movement(
                            &mut tx,
                            Posting {
                                account_id,
                                amount: -outstanding,
                                category: MovementCategory::Refund,
                                reference,
                                description,
                            },
                        )
                        .await?;
                }
                _ => {}
            }
        }

        let cancelled = self.repo.mark_sale_cancelled(&mut *tx, sale.id).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            invoice = %cancelled.invoice_number,
            "❌ Venda cancelada"
        );
        Ok(cancelled)
    }

    // =========================================================================
    //  DEVOLUÇÃO
    // =========================================================================

    pub async fn create_return(&self, cmd: CreateReturn) -> Result<ReturnDetail, AppError> {
        let mut tx = begin_transaction(&self.pool, &self.tx).await?;
        let tenant_id = self.tenant_service.ensure_operational(&mut tx).await?;

        let sale = self.repo.lock_sale(&mut *tx, cmd.sale_id).await?;
        if sale.status != SaleStatus::Completed {
            return Err(AppError::conflict("Só é possível devolver itens de uma venda concluída."));
        }

        // A conta do reembolso é resolvida antes de qualquer escrita.
        let refund_account_id = if sale.payment_method.is_credit() {
            None
        } else {
            cmd.refund_account_id.or(sale.account_id)
        };
        if let Some(account_id) = refund_account_id {
            self.ledger_service.find_active_account(&mut tx, account_id).await?;
        }

        let return_id = Uuid::new_v4();
        let reference = Some(Reference::new("sale_return", return_id));

        // 1. Itens da venda (trava + limite do que ainda pode voltar)
        let mut lines = cmd.lines.clone();
        lines.sort_by_key(|l| l.sale_item_id);

        let mut accepted: Vec<(SaleItem, Decimal, Decimal)> = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = self.repo.lock_sale_item(&mut *tx, line.sale_item_id).await?;
            if item.sale_id != sale.id {
                return Err(AppError::not_found("Item da venda"));
            }

            let available = item.quantity - item.returned_quantity;
            if line.quantity > available {
                return Err(AppError::conflict(format!(
                    "Quantidade devolvida maior que a disponível para '{}' (disponível: {}).",
                    item.product_name, available
                )));
            }

            let refund = refund_for(&item, item.returned_quantity + line.quantity)
                - refund_for(&item, item.returned_quantity);
            let updated = self
                .repo
                .add_returned_quantity(&mut *tx, item.id, line.quantity)
                .await?;
            accepted.push((updated, line.quantity, refund));
        }

        // 2. Estoque, em ordem crescente de produto
        let mut by_product: Vec<&(SaleItem, Decimal, Decimal)> = accepted.iter().collect();
        by_product.sort_by_key(|(item, _, _)| item.product_id);
        for (item, quantity, _) in by_product {
            self.inventory_service
                .increment_stock(
                    &mut tx,
                    item.product_id,
                    sale.warehouse_id,
                    *quantity,
                    StockMovementType::Return,
                    reference,
                )
                .await?;
        }

        // 3. Documento
        let total: Decimal = accepted.iter().map(|(_, _, refund)| *refund).sum();

        let return_number = self
            .numbering_service
            .next_for(&mut tx, tenant_id, DocumentKind::Return, Utc::now())
            .await?;

        let header = self
            .repo
            .insert_return(
                &mut *tx,
                &ReturnRow {
                    id: return_id,
                    return_number,
                    sale_id: sale.id,
                    refund_account_id,
                    total_amount: total,
                    reason: cmd.reason,
                    created_by: tenancy::current_user_id(),
                },
            )
            .await?;

        let mut items = Vec::with_capacity(accepted.len());
        for (item, quantity, refund) in &accepted {
            items.push(
                self.repo
                    .insert_return_item(
                        &mut *tx,
                        &ReturnItemRow {
                            return_id,
                            sale_item_id: item.id,
                            product_id: item.product_id,
                            quantity: *quantity,
                            line_total: *refund,
                        },
                    )
                    .await?,
            );
        }

        // 4. Reembolso
        if total > Decimal::ZERO {
            let description = Some(format!("Devolução {}", header.return_number));
            match (sale.payment_method, sale.customer_id, refund_account_id) {
                (PaymentMethod::Credit, Some(customer_id), _) => {
                    self.ledger_service
                        .post_customer_transaction(
                            &mut tx,
                            customer_id,
                            total,
                            CustomerTransactionKind::Credit,
                            reference,
                            description,
                        )
                        .await?;
                }
                (_, _, Some(account_id)) => {
                    self.ledger_service
                        .post_movement(
                            &mut tx,
                            Posting {
                                account_id,
                                amount: -total,
                                category: MovementCategory::Refund,
                                reference,
                                description,
                            },
                        )
                        .await?;
                }
                _ => {}
            }
        }

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            number = %header.return_number,
            total = %header.total_amount,
            "↩️ Devolução registrada"
        );
        Ok(ReturnDetail { header, items })
    }

    // =========================================================================
    //  IMPORTAÇÃO DE DOCUMENTO EXTERNO
    // =========================================================================

    /// Importa um documento já normalizado pelo parser. O mesmo `external_id` nunca
    /// gera duas vendas: a checagem prévia devolve `Conflict` sem escrever nada e a
    /// restrição única `(tenant_id, external_document_id)` cobre importações simultâneas.
    pub async fn import_external_invoice(&self, doc: ExternalInvoice) -> Result<SaleDetail, AppError> {
        let external_id = doc.external_id.trim().to_string();
        if external_id.is_empty() {
            return Err(AppError::invalid("O identificador externo é obrigatório."));
        }

        let mut tx = begin_transaction(&self.pool, &self.tx).await?;
        let tenant_id = self.tenant_service.ensure_operational(&mut tx).await?;

        if let Some(existing) = self.repo.find_sale_by_external_id(&mut *tx, &external_id).await? {
            return Err(AppError::conflict(format!(
                "Documento {external_id} já importado na venda {}.",
                existing.invoice_number
            )));
        }

        let customer = self
            .crm_service
            .resolve_or_create_customer(&mut tx, &doc.customer.name, &doc.customer.tax_id)
            .await?;

        let mut lines = Vec::with_capacity(doc.lines.len());
        for line in &doc.lines {
            let product = self
                .inventory_service
                .resolve_or_create_product(&mut tx, &line.name, line.unit_price, line.vat_rate)
                .await?;
            lines.push(DraftLine {
                product_id: product.id,
                quantity: line.quantity,
                unit_price: Some(line.unit_price),
                discount_rate: Decimal::ZERO,
                vat_rate: Some(line.vat_rate),
            });
        }

        let notes = match doc.issue_date {
            Some(date) => format!("Importado do documento {external_id} ({date})"),
            None => format!("Importado do documento {external_id}"),
        };

        let draft = SaleDraft {
            customer_id: Some(customer.id),
            warehouse_id: doc.warehouse_id,
            account_id: doc.account_id,
            payment_method: doc.payment_method,
            lines,
            movement_type: StockMovementType::Import,
            external_document_id: Some(external_id),
            notes: Some(notes),
        };

        let detail = self.write_sale(&mut tx, tenant_id, draft).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            invoice = %detail.sale.invoice_number,
            external_id = ?detail.sale.external_document_id,
            "📥 Documento externo importado"
        );
        Ok(detail)
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn get_sale(&self, sale_id: Uuid) -> Result<SaleDetail, AppError> {
        let sale = self.repo.find_sale(&self.pool, sale_id).await?;
        let items = self.repo.sale_items(&self.pool, sale_id).await?;
        Ok(SaleDetail { sale, items })
    }
}

/// Parte do total ainda não reembolsada por devoluções.
fn outstanding_amount(sale: &Sale, items: &[SaleItem]) -> Decimal {
    let refunded: Decimal = items
        .iter()
        .map(|item| refund_for(item, item.returned_quantity))
        .sum();
    sale.grand_total - refunded
}
