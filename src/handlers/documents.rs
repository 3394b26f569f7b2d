// src/handlers/documents.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{PermSalesWrite, RequirePermission},
    models::sales::{DocumentStatus, EDocument},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEDocumentPayload {
    pub sale_id: Uuid,
}

// POST /api/e-documents
#[utoipa::path(
    post,
    path = "/api/e-documents",
    tag = "E-Documents",
    request_body = CreateEDocumentPayload,
    responses(
        (status = 201, description = "Documento eletrônico criado em rascunho", body = EDocument),
        (status = 409, description = "Venda cancelada")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_edocument(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSalesWrite>,
    Json(payload): Json<CreateEDocumentPayload>,
) -> Result<impl IntoResponse, AppError> {
    let document = app_state.edocument_service.create(payload.sale_id).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPayload {
    #[schema(example = "pending")]
    pub status: DocumentStatus,

    #[validate(length(max = 500, message = "A observação deve ter no máximo 500 caracteres"))]
    pub note: Option<String>,
}

// POST /api/e-documents/{id}/transition
#[utoipa::path(
    post,
    path = "/api/e-documents/{id}/transition",
    tag = "E-Documents",
    request_body = TransitionPayload,
    responses(
        (status = 200, description = "Estado atualizado", body = EDocument),
        (status = 409, description = "Transição não permitida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do documento eletrônico")
    ),
    security(("api_jwt" = []))
)]
pub async fn transition_edocument(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSalesWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let document = app_state
        .edocument_service
        .transition(id, payload.status, payload.note)
        .await?;

    Ok(Json(document))
}
