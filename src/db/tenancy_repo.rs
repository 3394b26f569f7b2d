// src/db/tenancy_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    middleware::tenancy::Scope,
    models::tenancy::{Tenant, TenantStatus},
};

#[derive(Clone)]
pub struct TenantRepository {
    require_context: bool,
}

impl TenantRepository {
    pub fn new(require_context: bool) -> Self {
        Self { require_context }
    }

    pub fn scope(&self) -> Result<Scope, AppError> {
        Scope::current(self.require_context)
    }

    /// Lê o status do tenant com `FOR SHARE`: um tenant não pode ser suspenso
    /// no meio de uma operação que já passou pela verificação.
    pub async fn status_for_share<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<TenantStatus, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_scalar::<_, TenantStatus>(
            "SELECT status FROM tenants WHERE id = $1 FOR SHARE",
        )
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("Tenant"))
    }

    /// Listagem de plataforma. Quem chama garante que o contexto é de superadmin.
    pub async fn list_all<'e, E>(&self, executor: E) -> Result<Vec<Tenant>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tenants = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY name ASC")
            .fetch_all(executor)
            .await?;
        Ok(tenants)
    }
}
