// src/services/tenancy_service.rs

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::TenantRepository,
    middleware::tenancy::{self, Scope, UnscopedReason},
    models::tenancy::{Tenant, TenantStatus},
};

#[derive(Clone)]
pub struct TenantService {
    tenant_repo: TenantRepository,
    pool: PgPool,
}

impl TenantService {
    pub fn new(tenant_repo: TenantRepository, pool: PgPool) -> Self {
        Self { tenant_repo, pool }
    }

    /// Primeiro passo de todo orquestrador, já dentro da transação:
    /// exige um tenant concreto e recusa tenants suspensos.
    pub async fn ensure_operational(&self, conn: &mut PgConnection) -> Result<Uuid, AppError> {
        let tenant_id = self.tenant_repo.scope()?.require_tenant()?;

        match self.tenant_repo.status_for_share(&mut *conn, tenant_id).await? {
            TenantStatus::Suspended => Err(AppError::forbidden("Tenant suspenso.")),
            TenantStatus::Active | TenantStatus::Trial => Ok(tenant_id),
        }
    }

    /// Listagem de todos os tenants. Caminho explícito de administração da plataforma:
    /// só um superadmin sem tenant ativo (sem impersonação) chega ao SELECT.
    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, AppError> {
        let is_superadmin = tenancy::current().is_some_and(|ctx| ctx.is_superadmin());
        match self.tenant_repo.scope()? {
            Scope::Unscoped(UnscopedReason::PlatformAdmin) if is_superadmin => {
                self.tenant_repo.list_all(&self.pool).await
            }
            _ => Err(AppError::forbidden(
                "Listagem disponível apenas para a administração da plataforma.",
            )),
        }
    }
}
