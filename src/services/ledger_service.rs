// src/services/ledger_service.rs

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{begin_transaction, TxSettings},
        error::AppError,
    },
    db::{
        crm_repo::TransactionRow,
        finance_repo::{MovementRow, TransferRow},
        CrmRepository, FinanceRepository,
    },
    middleware::tenancy,
    models::{
        crm::{AccountTransaction, CustomerTransactionKind},
        finance::{
            Account, AccountMovement, AccountStatement, ManualMovementKind, MovementCategory,
            NewAccount, Reference, TransferReceipt,
        },
    },
};

/// Um lançamento em conta (caixa/banco).
#[derive(Debug, Clone)]
pub struct Posting {
    pub account_id: Uuid,
    pub amount: Decimal, // com sinal
    pub category: MovementCategory,
    pub reference: Option<Reference>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct LedgerService {
    finance_repo: FinanceRepository,
    crm_repo: CrmRepository,
    pool: PgPool,
    tx: TxSettings,
}

impl LedgerService {
    pub fn new(
        finance_repo: FinanceRepository,
        crm_repo: CrmRepository,
        pool: PgPool,
        tx: TxSettings,
    ) -> Self {
        Self { finance_repo, crm_repo, pool, tx }
    }

    // =========================================================================
    //  BLOCOS (rodam dentro da transação de quem chama)
    // =========================================================================

    /// Aplica o lançamento ao saldo (incremento atômico) e grava a linha do extrato
    /// com o saldo resultante. A conta é travada antes de qualquer lançamento: conta
    /// inativa não movimenta valores e saídas nunca deixam o saldo negativo.
    pub async fn post_movement(
        &self,
        conn: &mut PgConnection,
        posting: Posting,
    ) -> Result<AccountMovement, AppError> {
        self.post(conn, posting, None).await
    }

    async fn post(
        &self,
        conn: &mut PgConnection,
        posting: Posting,
        transfer_id: Option<Uuid>,
    ) -> Result<AccountMovement, AppError> {
        if posting.amount.is_zero() {
            return Err(AppError::invalid("O valor do lançamento não pode ser zero."));
        }

        let account = self.finance_repo.lock_account(&mut *conn, posting.account_id).await?;
        ensure_active(&account)?;
        if posting.amount.is_sign_negative() {
            ensure_funds(&account, -posting.amount)?;
        }

        let (_, balance_after) = self
            .finance_repo
            .apply_balance_delta(&mut *conn, posting.account_id, posting.amount)
            .await?;

        self.finance_repo
            .insert_movement(
                &mut *conn,
                &MovementRow {
                    account_id: posting.account_id,
                    category: posting.category,
                    amount: posting.amount,
                    balance_after,
                    description: posting.description,
                    reference: posting.reference,
                    transfer_id,
                    created_by: tenancy::current_user_id(),
                },
            )
            .await
    }

    /// Lançamento na conta corrente do cliente. `Debt` exige valor negativo, `Credit` positivo.
    pub async fn post_customer_transaction(
        &self,
        conn: &mut PgConnection,
        customer_id: Uuid,
        signed_amount: Decimal,
        kind: CustomerTransactionKind,
        reference: Option<Reference>,
        description: Option<String>,
    ) -> Result<AccountTransaction, AppError> {
        if !kind.accepts(signed_amount) {
            return Err(AppError::invalid(
                "O sinal do valor não corresponde ao tipo do lançamento.",
            ));
        }

        let (_, balance_after) = self
            .crm_repo
            .apply_balance_delta(&mut *conn, customer_id, signed_amount)
            .await?;

        self.crm_repo
            .insert_transaction(
                &mut *conn,
                &TransactionRow {
                    customer_id,
                    kind,
                    amount: signed_amount,
                    balance_after,
                    description,
                    reference,
                    created_by: tenancy::current_user_id(),
                },
            )
            .await
    }

    /// Conta citada por um documento (venda, devolução): precisa ser do tenant e estar ativa.
    pub async fn find_active_account(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Account, AppError> {
        let account = self.finance_repo.find_account(conn, id).await?;
        ensure_active(&account)?;
        Ok(account)
    }

    /// Transferência entre contas dentro de uma transação já aberta.
    pub async fn transfer_in(
        &self,
        conn: &mut PgConnection,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransferReceipt, AppError> {
        validate_transfer(from_account_id, to_account_id, amount)?;

        // Ordem fixa: origem antes do destino.
        let source = self.finance_repo.lock_account(&mut *conn, from_account_id).await?;
        let destination = self.finance_repo.lock_account(&mut *conn, to_account_id).await?;

        ensure_active(&source)?;
        ensure_active(&destination)?;
        ensure_funds(&source, amount)?;

        // O id é gerado aqui para ligar os dois lançamentos; a linha da transferência
        // vem por último (a FK de account_movements.transfer_id é DEFERRABLE).
        let transfer_id = Uuid::new_v4();
        let reference = Some(Reference::new("account_transfer", transfer_id));

        let out_movement = self
            .post(
                conn,
                Posting {
                    account_id: from_account_id,
                    amount: -amount,
                    category: MovementCategory::TransferOut,
                    reference,
                    description: description.clone(),
                },
                Some(transfer_id),
            )
            .await?;

        let in_movement = self
            .post(
                conn,
                Posting {
                    account_id: to_account_id,
                    amount,
                    category: MovementCategory::TransferIn,
                    reference,
                    description: description.clone(),
                },
                Some(transfer_id),
            )
            .await?;

        let transfer = self
            .finance_repo
            .insert_transfer(
                &mut *conn,
                &TransferRow {
                    id: transfer_id,
                    from_account_id,
                    to_account_id,
                    amount,
                    description,
                    out_movement_id: out_movement.id,
                    in_movement_id: in_movement.id,
                    created_by: tenancy::current_user_id(),
                },
            )
            .await?;

        Ok(TransferReceipt {
            transfer,
            out_movement,
            in_movement,
        })
    }

    // =========================================================================
    //  OPERAÇÕES (cada uma com a própria transação)
    // =========================================================================

    pub async fn transfer(
        &self,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransferReceipt, AppError> {
        // Erros de formato antes de abrir a transação.
        validate_transfer(from_account_id, to_account_id, amount)?;

        let mut tx = begin_transaction(&self.pool, &self.tx).await?;
        let receipt = self
            .transfer_in(&mut tx, from_account_id, to_account_id, amount, description)
            .await?;
        tx.commit().await?;

        tracing::info!(
            transfer_id = %receipt.transfer.id,
            tenant_id = %receipt.transfer.tenant_id,
            "💸 Transferência entre contas registrada"
        );
        Ok(receipt)
    }

    /// Entrada ou saída manual de caixa/banco.
    pub async fn add_movement(
        &self,
        account_id: Uuid,
        kind: ManualMovementKind,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<AccountMovement, AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::invalid("O valor deve ser maior que zero."));
        }

        let mut tx = begin_transaction(&self.pool, &self.tx).await?;
        let movement = self
            .post_movement(
                &mut tx,
                Posting {
                    account_id,
                    amount: kind.signed(amount),
                    category: kind.category(),
                    reference: None,
                    description,
                },
            )
            .await?;
        tx.commit().await?;

        Ok(movement)
    }

    pub async fn create_account(&self, new: NewAccount) -> Result<Account, AppError> {
        if new.opening_balance.is_sign_negative() {
            return Err(AppError::invalid("O saldo de abertura não pode ser negativo."));
        }
        self.finance_repo.create_account(&self.pool, &new).await
    }

    pub async fn get_account(&self, id: Uuid) -> Result<AccountStatement, AppError> {
        let account = self.finance_repo.find_account(&self.pool, id).await?;
        let movements = self
            .finance_repo
            .movements_for_account(&self.pool, id)
            .await?;
        Ok(AccountStatement { account, movements })
    }
}

fn validate_transfer(from: Uuid, to: Uuid, amount: Decimal) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::invalid("O valor da transferência deve ser maior que zero."));
    }
    if from == to {
        return Err(AppError::conflict("Origem e destino da transferência são a mesma conta."));
    }
    Ok(())
}

fn ensure_active(account: &Account) -> Result<(), AppError> {
    if !account.is_active {
        return Err(AppError::conflict(format!(
            "A conta '{}' está inativa e não pode movimentar valores.",
            account.name
        )));
    }
    Ok(())
}

fn ensure_funds(account: &Account, amount: Decimal) -> Result<(), AppError> {
    if account.current_balance < amount {
        return Err(AppError::conflict(format!(
            "Saldo insuficiente na conta '{}'.",
            account.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_shape_is_checked_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(validate_transfer(a, b, Decimal::from(10)).is_ok());
        assert!(matches!(
            validate_transfer(a, b, Decimal::ZERO),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_transfer(a, a, Decimal::from(10)),
            Err(AppError::Conflict(_))
        ));
    }
}
