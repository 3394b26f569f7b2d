// src/services/crm_service.rs

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CrmRepository,
    models::crm::{AccountTransaction, Customer, CustomerPatch, NewCustomer},
};

#[derive(Clone)]
pub struct CrmService {
    repo: CrmRepository,
    pool: PgPool,
}

impl CrmService {
    pub fn new(repo: CrmRepository, pool: PgPool) -> Self {
        Self { repo, pool }
    }

    pub async fn create_customer(&self, new: NewCustomer) -> Result<Customer, AppError> {
        let new = NewCustomer {
            tax_id: normalize_tax_id(new.tax_id),
            ..new
        };
        self.repo.create_customer(&self.pool, &new).await
    }

    pub async fn get_customer(&self, id: Uuid) -> Result<(Customer, Vec<AccountTransaction>), AppError> {
        let customer = self.repo.find_customer(&self.pool, id).await?;
        let transactions = self.repo.transactions_for_customer(&self.pool, id).await?;
        Ok((customer, transactions))
    }

    pub async fn update_customer(&self, id: Uuid, patch: CustomerPatch) -> Result<Customer, AppError> {
        self.repo.update_customer(&self.pool, id, &patch).await
    }

    /// Leitura dentro de uma transação aberta (ex.: conferir o cliente de uma venda a prazo).
    pub async fn find_customer_in(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Customer, AppError> {
        self.repo.find_customer(conn, id).await
    }

    /// Casamento pelo número fiscal; sem correspondência, cria o cliente.
    pub async fn resolve_or_create_customer(
        &self,
        conn: &mut PgConnection,
        name: &str,
        tax_id: &str,
    ) -> Result<Customer, AppError> {
        let tax_id = normalize_tax_id(Some(tax_id.to_string()))
            .ok_or_else(|| AppError::invalid("O número fiscal do cliente é obrigatório."))?;

        if let Some(customer) = self.repo.find_by_tax_id(&mut *conn, &tax_id).await? {
            return Ok(customer);
        }

        self.repo
            .create_customer(
                &mut *conn,
                &NewCustomer {
                    name: name.trim().to_string(),
                    tax_id: Some(tax_id),
                    ..Default::default()
                },
            )
            .await
    }

    /// Clientes com lançamentos na conta corrente não podem ser apagados (FK → `Conflict`);
    /// nesse caso o caminho é desativar via `update_customer`.
    pub async fn delete_customer(&self, id: Uuid) -> Result<(), AppError> {
        self.repo.delete_customer(&self.pool, id).await
    }
}

/// Número fiscal sem espaços; vazio vira `None`.
pub fn normalize_tax_id(tax_id: Option<String>) -> Option<String> {
    tax_id
        .map(|t| t.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|t| !t.is_empty())
}
