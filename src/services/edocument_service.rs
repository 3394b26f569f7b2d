// src/services/edocument_service.rs

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{begin_transaction, TxSettings},
        error::AppError,
    },
    db::{sales_repo::EDocumentRow, SalesRepository},
    models::sales::{DocumentKind, DocumentStatus, EDocument, SaleStatus},
    services::{numbering_service::NumberingService, tenancy_service::TenantService},
};

#[derive(Clone)]
pub struct EDocumentService {
    repo: SalesRepository,
    tenant_service: TenantService,
    numbering_service: NumberingService,
    pool: PgPool,
    tx: TxSettings,
}

impl EDocumentService {
    pub fn new(
        repo: SalesRepository,
        tenant_service: TenantService,
        numbering_service: NumberingService,
        pool: PgPool,
        tx: TxSettings,
    ) -> Self {
        Self {
            repo,
            tenant_service,
            numbering_service,
            pool,
            tx,
        }
    }

    /// Abre o documento eletrônico de uma venda em `draft`.
    pub async fn create(&self, sale_id: Uuid) -> Result<EDocument, AppError> {
        let mut tx = begin_transaction(&self.pool, &self.tx).await?;
        let tenant_id = self.tenant_service.ensure_operational(&mut tx).await?;

        // Trava a venda: um cancelamento concorrente espera o commit.
        let sale = self.repo.lock_sale(&mut *tx, sale_id).await?;
        if sale.status == SaleStatus::Cancelled {
            return Err(AppError::conflict(format!(
                "A venda {} está cancelada.",
                sale.invoice_number
            )));
        }

        let document_number = self
            .numbering_service
            .next_for(&mut tx, tenant_id, DocumentKind::EDocument, Utc::now())
            .await?;

        let document = self
            .repo
            .insert_edocument(
                &mut *tx,
                &EDocumentRow {
                    document_number,
                    sale_id: sale.id,
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            number = %document.document_number,
            sale = %sale.invoice_number,
            "📄 Documento eletrônico criado"
        );
        Ok(document)
    }

    /// Valida a transição com a linha travada e grava o novo estado.
    pub async fn transition(
        &self,
        id: Uuid,
        next: DocumentStatus,
        note: Option<String>,
    ) -> Result<EDocument, AppError> {
        let mut tx = begin_transaction(&self.pool, &self.tx).await?;
        let tenant_id = self.tenant_service.ensure_operational(&mut tx).await?;

        let current = self.repo.lock_edocument(&mut *tx, id).await?;
        current.status.ensure_transition(next)?;

        let updated = self
            .repo
            .set_edocument_status(&mut *tx, current.id, next, note)
            .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            number = %updated.document_number,
            from = ?current.status,
            to = ?updated.status,
            "Documento eletrônico atualizado"
        );
        Ok(updated)
    }
}
