// src/models/auth.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Conteúdo do JWT emitido pela camada de autenticação.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid, // id do usuário
    #[serde(default)]
    pub tenant_id: Option<Uuid>, // None = usuário da plataforma
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: usize,
    pub iat: usize,
}
