// src/middleware/tenancy.rs

use std::collections::HashSet;
use std::future::Future;

use uuid::Uuid;

use crate::common::error::AppError;

/// Cargo da plataforma: o único autorizado a operar sem tenant ou a impersonar outro tenant.
pub const SUPERADMIN_ROLE: &str = "superadmin";

/// Cabeçalho HTTP com o tenant alvo da impersonação.
pub const IMPERSONATION_HEADER: &str = "x-impersonate-tenant";

tokio::task_local! {
    // Um valor por chamada. Nunca é visto por outra task concorrente,
    // e tasks criadas com tokio::spawn NÃO herdam o contexto.
    static CURRENT_CONTEXT: TenantContext;
}

// ---
// Identidade verificada (vem da camada de autenticação)
// ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub role: String,
    pub permissions: HashSet<String>,
}

/// O fato de a chamada estar impersonando outro tenant fica registrado no contexto,
/// nunca misturado em silêncio com o tenant de origem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Impersonation {
    pub home_tenant_id: Option<Uuid>,
    pub target_tenant_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TenantContext {
    tenant_id: Option<Uuid>,
    user_id: Uuid,
    role: String,
    permissions: HashSet<String>,
    impersonation: Option<Impersonation>,
}

impl TenantContext {
    /// Monta o contexto da chamada a partir da identidade verificada.
    ///
    /// - identidade com tenant: usa esse tenant;
    /// - superadmin + tenant de impersonação: o tenant alvo substitui o da identidade
    ///   e a impersonação fica anexada ao contexto (e vai para o log de auditoria);
    /// - qualquer outro cargo pedindo impersonação: `Forbidden`;
    /// - cargo comum sem tenant: `Forbidden` (só a plataforma opera sem tenant).
    pub fn establish(identity: Identity, impersonate: Option<Uuid>) -> Result<Self, AppError> {
        let is_superadmin = identity.role == SUPERADMIN_ROLE;

        let (tenant_id, impersonation) = match impersonate {
            Some(target) if is_superadmin => {
                tracing::warn!(
                    target: "audit",
                    user_id = %identity.user_id,
                    home_tenant_id = ?identity.tenant_id,
                    target_tenant_id = %target,
                    "impersonação de tenant"
                );
                (
                    Some(target),
                    Some(Impersonation {
                        home_tenant_id: identity.tenant_id,
                        target_tenant_id: target,
                    }),
                )
            }
            Some(target) => {
                tracing::warn!(
                    target: "audit",
                    user_id = %identity.user_id,
                    role = %identity.role,
                    target_tenant_id = %target,
                    "impersonação recusada"
                );
                return Err(AppError::forbidden(
                    "Apenas a plataforma pode acessar outro tenant.",
                ));
            }
            None => (identity.tenant_id, None),
        };

        if tenant_id.is_none() && !is_superadmin {
            return Err(AppError::forbidden("Usuário sem tenant associado."));
        }

        Ok(Self {
            tenant_id,
            user_id: identity.user_id,
            role: identity.role,
            permissions: identity.permissions,
            impersonation,
        })
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn permissions(&self) -> &HashSet<String> {
        &self.permissions
    }

    pub fn impersonation(&self) -> Option<Impersonation> {
        self.impersonation
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == SUPERADMIN_ROLE
    }

    pub fn has_permission(&self, slug: &str) -> bool {
        self.is_superadmin() || self.permissions.contains(slug)
    }
}

/// Executa `f` com `ctx` disponível implicitamente para todo código chamado por ela,
/// inclusive através de pontos de suspensão (`.await`).
pub async fn run_with<F>(ctx: TenantContext, f: F) -> F::Output
where
    F: Future,
{
    CURRENT_CONTEXT.scope(ctx, f).await
}

pub fn current() -> Option<TenantContext> {
    CURRENT_CONTEXT.try_with(|ctx| ctx.clone()).ok()
}

pub fn current_tenant_id() -> Option<Uuid> {
    CURRENT_CONTEXT.try_with(|ctx| ctx.tenant_id).ok().flatten()
}

pub fn current_user_id() -> Option<Uuid> {
    CURRENT_CONTEXT.try_with(|ctx| ctx.user_id).ok()
}

pub fn current_role() -> Option<String> {
    CURRENT_CONTEXT.try_with(|ctx| ctx.role.clone()).ok()
}

pub fn current_permissions() -> HashSet<String> {
    CURRENT_CONTEXT
        .try_with(|ctx| ctx.permissions.clone())
        .unwrap_or_default()
}

// ---
// Escopo de dados
// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnscopedReason {
    /// Superadmin sem tenant e sem impersonação: administração da plataforma.
    PlatformAdmin,
    /// Nenhum contexto foi estabelecido para esta chamada.
    NoContext,
}

/// Escopo que a camada de dados aplica a cada consulta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Tenant(Uuid),
    Unscoped(UnscopedReason),
}

impl Scope {
    /// Resolve o escopo a partir do contexto ambiente.
    ///
    /// Sem contexto a consulta segue sem filtro de tenant (modo plataforma), a menos que
    /// `require_context` esteja ligado. Os dois casos de modo sem filtro são logados.
    pub fn current(require_context: bool) -> Result<Scope, AppError> {
        match current() {
            Some(ctx) => match ctx.tenant_id() {
                Some(tenant_id) => Ok(Scope::Tenant(tenant_id)),
                None => {
                    tracing::warn!(
                        target: "audit",
                        user_id = %ctx.user_id(),
                        "acesso sem filtro de tenant (plataforma)"
                    );
                    Ok(Scope::Unscoped(UnscopedReason::PlatformAdmin))
                }
            },
            None if require_context => Err(AppError::forbidden(
                "Contexto de tenant não estabelecido.",
            )),
            None => {
                tracing::warn!(target: "audit", "acesso sem contexto de tenant");
                Ok(Scope::Unscoped(UnscopedReason::NoContext))
            }
        }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            Scope::Tenant(id) => Some(*id),
            Scope::Unscoped(_) => None,
        }
    }

    /// Escritas que carimbam `tenant_id` precisam de um tenant concreto.
    pub fn require_tenant(&self) -> Result<Uuid, AppError> {
        self.tenant_id()
            .ok_or_else(|| AppError::forbidden("Esta operação exige um tenant."))
    }
}
