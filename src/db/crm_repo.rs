// src/db/crm_repo.rs

use rust_decimal::Decimal;
use sqlx::{query_builder::Separated, Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::scoped_repo::{push_tenant_predicate, InsertRow, ScopedRepository, TenantEntity, UpdateRow},
    models::{
        crm::{AccountTransaction, Customer, CustomerPatch, CustomerTransactionKind, NewCustomer},
        finance::Reference,
    },
};

impl TenantEntity for Customer {
    const TABLE: &'static str = "customers";
    const ENTITY: &'static str = "Cliente";
}

impl TenantEntity for AccountTransaction {
    const TABLE: &'static str = "account_transactions";
    const ENTITY: &'static str = "Lançamento";
    const UPDATED_AT: Option<&'static str> = None;
}

impl InsertRow for NewCustomer {
    const COLUMNS: &'static [&'static str] = &["name", "tax_id", "email", "phone"];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.name.clone())
            .push_bind(self.tax_id.clone())
            .push_bind(self.email.clone())
            .push_bind(self.phone.clone());
    }
}

impl UpdateRow for CustomerPatch {
    fn push_assignments<'args>(&self, set: &mut Separated<'_, 'args, Postgres, &'static str>) -> usize {
        let mut written = 0;
        if let Some(name) = &self.name {
            set.push("name = ").push_bind_unseparated(name.clone());
            written += 1;
        }
        if let Some(email) = &self.email {
            set.push("email = ").push_bind_unseparated(email.clone());
            written += 1;
        }
        if let Some(phone) = &self.phone {
            set.push("phone = ").push_bind_unseparated(phone.clone());
            written += 1;
        }
        if let Some(is_active) = self.is_active {
            set.push("is_active = ").push_bind_unseparated(is_active);
            written += 1;
        }
        written
    }
}

#[derive(Debug, Clone)]
pub struct TransactionRow {
    pub customer_id: Uuid,
    pub kind: CustomerTransactionKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub reference: Option<Reference>,
    pub created_by: Option<Uuid>,
}

impl InsertRow for TransactionRow {
    const COLUMNS: &'static [&'static str] = &[
        "customer_id",
        "kind",
        "amount",
        "balance_after",
        "description",
        "reference_type",
        "reference_id",
        "created_by",
    ];

    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.customer_id)
            .push_bind(self.kind)
            .push_bind(self.amount)
            .push_bind(self.balance_after)
            .push_bind(self.description.clone())
            .push_bind(self.reference.map(|r| r.kind))
            .push_bind(self.reference.map(|r| r.id))
            .push_bind(self.created_by);
    }
}

#[derive(Clone)]
pub struct CrmRepository {
    customers: ScopedRepository<Customer>,
    transactions: ScopedRepository<AccountTransaction>,
}

impl CrmRepository {
    pub fn new(require_context: bool) -> Self {
        Self {
            customers: ScopedRepository::new(require_context),
            transactions: ScopedRepository::new(require_context),
        }
    }

    // =========================================================================
    //  CLIENTES
    // =========================================================================

    pub async fn create_customer<'e, E>(&self, executor: E, new: &NewCustomer) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.customers.create(executor, new).await
    }

    pub async fn find_customer<'e, E>(&self, executor: E, id: Uuid) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.customers.find_by_id(executor, id).await
    }

    pub async fn update_customer<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        patch: &CustomerPatch,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.customers.update(executor, id, patch).await
    }

    pub async fn delete_customer<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.customers.delete(executor, id).await
    }

    /// Busca pelo número fiscal (usado na importação).
    pub async fn find_by_tax_id<'e, E>(
        &self,
        executor: E,
        tax_id: &str,
    ) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = self.customers.scoped_query(None)?;
        qb.push(" AND tax_id = ")
            .push_bind(tax_id.to_string());

        let customer = qb.build_query_as::<Customer>().fetch_optional(executor).await?;
        Ok(customer)
    }

    /// Incremento atômico do saldo do cliente. Devolve `(tenant_id, novo saldo)`.
    pub async fn apply_balance_delta<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
        delta: Decimal,
    ) -> Result<(Uuid, Decimal), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let scope = self.customers.scope()?;
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE customers SET balance = balance + ");
        qb.push_bind(delta)
            .push(", updated_at = NOW() WHERE id = ")
            .push_bind(customer_id);
        push_tenant_predicate(&mut qb, scope, None, "tenant_id");
        qb.push(" RETURNING tenant_id, balance");

        qb.build_query_as::<(Uuid, Decimal)>()
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::not_found(Customer::ENTITY))
    }

    // =========================================================================
    //  CONTA CORRENTE
    // =========================================================================

    pub async fn insert_transaction<'e, E>(
        &self,
        executor: E,
        row: &TransactionRow,
    ) -> Result<AccountTransaction, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.transactions.create(executor, row).await
    }

    pub async fn transactions_for_customer<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
    ) -> Result<Vec<AccountTransaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = self.transactions.scoped_query(None)?;
        qb.push(" AND customer_id = ")
            .push_bind(customer_id)
            .push(" ORDER BY created_at ASC, id ASC");

        let rows = qb.build_query_as::<AccountTransaction>().fetch_all(executor).await?;
        Ok(rows)
    }
}
