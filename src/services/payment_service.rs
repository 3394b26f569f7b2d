// src/services/payment_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{begin_transaction, TxSettings},
        error::AppError,
    },
    db::{sales_repo::PaymentRow, SalesRepository},
    middleware::tenancy,
    models::{
        crm::CustomerTransactionKind,
        finance::{MovementCategory, Reference},
        sales::{CreatePayment, DocumentKind, Payment, PaymentDirection},
    },
    services::{
        ledger_service::{LedgerService, Posting},
        numbering_service::NumberingService,
        tenancy_service::TenantService,
    },
};

#[derive(Clone)]
pub struct PaymentService {
    repo: SalesRepository,
    tenant_service: TenantService,
    ledger_service: LedgerService,
    numbering_service: NumberingService,
    pool: PgPool,
    tx: TxSettings,
}

/// Como cada direção aparece nos dois razões: conta corrente do cliente e caixa/banco.
fn legs(direction: PaymentDirection, amount: Decimal) -> (CustomerTransactionKind, Decimal, MovementCategory, Decimal) {
    match direction {
        PaymentDirection::Incoming => (
            CustomerTransactionKind::Credit,
            amount,
            MovementCategory::PaymentIn,
            amount,
        ),
        PaymentDirection::Outgoing => (
            CustomerTransactionKind::Debt,
            -amount,
            MovementCategory::PaymentOut,
            -amount,
        ),
    }
}

impl PaymentService {
    pub fn new(
        repo: SalesRepository,
        tenant_service: TenantService,
        ledger_service: LedgerService,
        numbering_service: NumberingService,
        pool: PgPool,
        tx: TxSettings,
    ) -> Self {
        Self {
            repo,
            tenant_service,
            ledger_service,
            numbering_service,
            pool,
            tx,
        }
    }

    /// Recebimento (`incoming`) ou pagamento (`outgoing`) ligado a um cliente.
    /// Os dois lados (cliente e conta) mudam juntos ou nenhum muda.
    pub async fn create_payment(&self, cmd: CreatePayment) -> Result<Payment, AppError> {
        if cmd.amount <= Decimal::ZERO {
            return Err(AppError::invalid("O valor do pagamento deve ser maior que zero."));
        }

        let mut tx = begin_transaction(&self.pool, &self.tx).await?;
        let tenant_id = self.tenant_service.ensure_operational(&mut tx).await?;

        let payment_id = Uuid::new_v4();
        let reference = Some(Reference::new("payment", payment_id));

        let payment_number = self
            .numbering_service
            .next_for(&mut tx, tenant_id, DocumentKind::Payment, Utc::now())
            .await?;
        let description = cmd
            .description
            .clone()
            .or_else(|| Some(format!("Pagamento {payment_number}")));

        let (kind, customer_amount, category, account_amount) = legs(cmd.direction, cmd.amount);

        self.ledger_service
            .post_customer_transaction(
                &mut tx,
                cmd.customer_id,
                customer_amount,
                kind,
                reference,
                description.clone(),
            )
            .await?;

        self.ledger_service
            .post_movement(
                &mut tx,
                Posting {
                    account_id: cmd.account_id,
                    amount: account_amount,
                    category,
                    reference,
                    description,
                },
            )
            .await?;

        let payment = self
            .repo
            .insert_payment(
                &mut *tx,
                &PaymentRow {
                    id: payment_id,
                    payment_number,
                    customer_id: cmd.customer_id,
                    account_id: cmd.account_id,
                    direction: cmd.direction,
                    amount: cmd.amount,
                    description: cmd.description,
                    created_by: tenancy::current_user_id(),
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            number = %payment.payment_number,
            direction = ?payment.direction,
            amount = %payment.amount,
            "💰 Pagamento registrado"
        );
        Ok(payment)
    }
}
