use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// SQLSTATEs do Postgres que representam disputa por linha ou violação de invariante.
// Nenhum deles é re-tentado aqui: quem chamou decide se repete a operação.
const PG_DEADLOCK_DETECTED: &str = "40P01";
const PG_SERIALIZATION_FAILURE: &str = "40001";
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";
const PG_QUERY_CANCELED: &str = "57014";
const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_CHECK_VIOLATION: &str = "23514";
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum AppError {
    /// Entidade inexistente OU fora do escopo do tenant atual (indistinguíveis de propósito).
    #[error("{0} não encontrado")]
    NotFound(String),

    /// Um invariante de domínio seria violado (estoque, saldo, duplicidade, transição de estado).
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Erro de banco de dados")]
    DatabaseError(sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn not_found(entity: &str) -> Self {
        AppError::NotFound(entity.to_string())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    /// Código estável que o cliente pode usar para distinguir os resultados.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::ValidationError(_) | AppError::InvalidInput(_) => "VALIDATION_ERROR",
            AppError::InvalidToken | AppError::JwtError(_) => "INVALID_TOKEN",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidToken | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// Classifica o erro do sqlx na entrada, para que os serviços só vejam a taxonomia do domínio.
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = e {
            return AppError::NotFound("Registro".into());
        }

        if let Some(db_err) = e.as_database_error() {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            match code.as_str() {
                PG_DEADLOCK_DETECTED | PG_SERIALIZATION_FAILURE => {
                    return AppError::Conflict(
                        "Operação concorrente em andamento. Tente novamente.".into(),
                    );
                }
                PG_LOCK_NOT_AVAILABLE | PG_QUERY_CANCELED => {
                    return AppError::Conflict(
                        "Tempo de espera por bloqueio esgotado. Tente novamente.".into(),
                    );
                }
                PG_UNIQUE_VIOLATION => {
                    let constraint = db_err.constraint().unwrap_or("unique");
                    return AppError::Conflict(format!("Registro duplicado ({constraint})."));
                }
                PG_CHECK_VIOLATION => {
                    let constraint = db_err.constraint().unwrap_or("check");
                    return AppError::Conflict(format!("Restrição violada ({constraint})."));
                }
                PG_FOREIGN_KEY_VIOLATION => {
                    return AppError::Conflict(
                        "O registro está em uso por outros lançamentos.".into(),
                    );
                }
                _ => {}
            }
        }

        AppError::DatabaseError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                json!({
                    "code": code,
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                })
            }
            AppError::NotFound(entity) => json!({
                "code": code,
                "error": format!("{entity} não encontrado."),
            }),
            AppError::Conflict(msg) | AppError::Forbidden(msg) | AppError::InvalidInput(msg) => {
                json!({ "code": code, "error": msg })
            }
            AppError::InvalidToken | AppError::JwtError(_) => json!({
                "code": code,
                "error": "Token de autenticação inválido ou ausente.",
            }),
            // Detalhes do banco nunca vão para o cliente, só para o log.
            e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                json!({ "code": code, "error": "Ocorreu um erro inesperado." })
            }
        };

        (status, Json(body)).into_response()
    }
}
