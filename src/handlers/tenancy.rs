// src/handlers/tenancy.rs

use axum::{extract::State, response::IntoResponse, Json};

use crate::{common::error::AppError, config::AppState, models::tenancy::Tenant};

// GET /api/platform/tenants
#[utoipa::path(
    get,
    path = "/api/platform/tenants",
    tag = "Platform",
    responses(
        (status = 200, description = "Todos os tenants (sem filtro)", body = [Tenant]),
        (status = 403, description = "Apenas superadmin sem impersonação")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_tenants(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let tenants = app_state.tenant_service.list_tenants().await?;
    Ok(Json(tenants))
}

// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Platform",
    responses(
        (status = 200, description = "Serviço no ar", body = String)
    )
)]
pub async fn health() -> &'static str {
    "OK"
}
