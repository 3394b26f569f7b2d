// src/db/finance_repo.rs

use rust_decimal::Decimal;
use sqlx::{query_builder::Separated, Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::scoped_repo::{push_tenant_predicate, InsertRow, ScopedRepository, TenantEntity},
    models::finance::{
        Account, AccountMovement, AccountTransfer, MovementCategory, NewAccount, Reference,
    },
};

impl TenantEntity for Account {
    const TABLE: &'static str = "accounts";
    const ENTITY: &'static str = "Conta";
}

impl TenantEntity for AccountMovement {
    const TABLE: &'static str = "account_movements";
    const ENTITY: &'static str = "Movimentação";
    const UPDATED_AT: Option<&'static str> = None;
}

impl TenantEntity for AccountTransfer {
    const TABLE: &'static str = "account_transfers";
    const ENTITY: &'static str = "Transferência";
    const UPDATED_AT: Option<&'static str> = None;
}

impl InsertRow for NewAccount {
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "account_type",
        "currency",
        "opening_balance",
        "current_balance",
    ];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.name.clone())
            .push_bind(self.account_type)
            .push_bind(self.currency.clone())
            .push_bind(self.opening_balance)
            // Conta nasce com o saldo de abertura, sem movimentação.
            .push_bind(self.opening_balance);
    }
}

/// Linha do extrato a ser gravada.
#[derive(Debug, Clone)]
pub struct MovementRow {
    pub account_id: Uuid,
    pub category: MovementCategory,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub reference: Option<Reference>,
    pub transfer_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

impl InsertRow for MovementRow {
    const COLUMNS: &'static [&'static str] = &[
        "account_id",
        "category",
        "amount",
        "balance_after",
        "description",
        "reference_type",
        "reference_id",
        "transfer_id",
        "created_by",
    ];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.account_id)
            .push_bind(self.category)
            .push_bind(self.amount)
            .push_bind(self.balance_after)
            .push_bind(self.description.clone())
            .push_bind(self.reference.map(|r| r.kind))
            .push_bind(self.reference.map(|r| r.id))
            .push_bind(self.transfer_id)
            .push_bind(self.created_by);
    }
}

#[derive(Debug, Clone)]
pub struct TransferRow {
    pub id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
    pub out_movement_id: Uuid,
    pub in_movement_id: Uuid,
    pub created_by: Option<Uuid>,
}

impl InsertRow for TransferRow {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "from_account_id",
        "to_account_id",
        "amount",
        "description",
        "out_movement_id",
        "in_movement_id",
        "created_by",
    ];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.id)
            .push_bind(self.from_account_id)
            .push_bind(self.to_account_id)
            .push_bind(self.amount)
            .push_bind(self.description.clone())
            .push_bind(self.out_movement_id)
            .push_bind(self.in_movement_id)
            .push_bind(self.created_by);
    }
}

#[derive(Clone)]
pub struct FinanceRepository {
    accounts: ScopedRepository<Account>,
    movements: ScopedRepository<AccountMovement>,
    transfers: ScopedRepository<AccountTransfer>,
}

impl FinanceRepository {
    pub fn new(require_context: bool) -> Self {
        Self {
            accounts: ScopedRepository::new(require_context),
            movements: ScopedRepository::new(require_context),
            transfers: ScopedRepository::new(require_context),
        }
    }

    // =========================================================================
    //  CONTAS (Caixa / Banco)
    // =========================================================================

    pub async fn create_account<'e, E>(&self, executor: E, new: &NewAccount) -> Result<Account, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.accounts.create(executor, new).await
    }

    pub async fn find_account<'e, E>(&self, executor: E, id: Uuid) -> Result<Account, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.accounts.find_by_id(executor, id).await
    }

    pub async fn lock_account<'e, E>(&self, executor: E, id: Uuid) -> Result<Account, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.accounts.find_by_id_for_update(executor, id).await
    }

    /// Soma `delta` ao saldo no próprio banco (`saldo = saldo + delta`) e devolve
    /// `(tenant_id, novo saldo)`. Nunca lê-e-regrava.
    pub async fn apply_balance_delta<'e, E>(
        &self,
        executor: E,
        account_id: Uuid,
        delta: Decimal,
    ) -> Result<(Uuid, Decimal), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let scope = self.accounts.scope()?;
        let mut qb = QueryBuilder::<Postgres>::new(
            "UPDATE accounts SET current_balance = current_balance + ",
        );
        qb.push_bind(delta)
            .push(", updated_at = NOW() WHERE id = ")
            .push_bind(account_id);
        push_tenant_predicate(&mut qb, scope, None, "tenant_id");
        qb.push(" RETURNING tenant_id, current_balance");

        qb.build_query_as::<(Uuid, Decimal)>()
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::not_found(Account::ENTITY))
    }

    // =========================================================================
    //  EXTRATO
    // =========================================================================

    pub async fn insert_movement<'e, E>(
        &self,
        executor: E,
        row: &MovementRow,
    ) -> Result<AccountMovement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.movements.create(executor, row).await
    }

    pub async fn movements_for_account<'e, E>(
        &self,
        executor: E,
        account_id: Uuid,
    ) -> Result<Vec<AccountMovement>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = self.movements.scoped_query(None)?;
        qb.push(" AND account_id = ")
            .push_bind(account_id)
            .push(" ORDER BY created_at ASC, id ASC");

        let movements = qb.build_query_as::<AccountMovement>().fetch_all(executor).await?;
        Ok(movements)
    }

    // =========================================================================
    //  TRANSFERÊNCIAS
    // =========================================================================

    pub async fn insert_transfer<'e, E>(
        &self,
        executor: E,
        row: &TransferRow,
    ) -> Result<AccountTransfer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.transfers.create(executor, row).await
    }
}
