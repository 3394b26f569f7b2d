// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{common::error::AppError, middleware::tenancy::TenantContext};

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// 2. O Extractor (Guardião). Superadmin passa por todos.
pub struct RequirePermission<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // O contexto é colocado pelo auth_guard.
        let ctx = parts
            .extensions
            .get::<TenantContext>()
            .ok_or(AppError::InvalidToken)?;

        let required_perm = T::slug();
        if !ctx.has_permission(required_perm) {
            tracing::warn!(
                target: "audit",
                user_id = %ctx.user_id(),
                permission = required_perm,
                "permissão negada"
            );
            return Err(AppError::forbidden(format!(
                "Você precisa da permissão '{}' para realizar esta ação.",
                required_perm
            )));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

pub struct PermSalesWrite;
impl PermissionDef for PermSalesWrite {
    fn slug() -> &'static str { "sales:write" }
}

pub struct PermInventoryWrite;
impl PermissionDef for PermInventoryWrite {
    fn slug() -> &'static str { "inventory:write" }
}

pub struct PermFinanceWrite;
impl PermissionDef for PermFinanceWrite {
    fn slug() -> &'static str { "finance:write" }
}

pub struct PermCrmWrite;
impl PermissionDef for PermCrmWrite {
    fn slug() -> &'static str { "crm:write" }
}
