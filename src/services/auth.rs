// src/services/auth.rs

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    middleware::tenancy::Identity,
    models::auth::Claims,
};

/// Confere os tokens emitidos pelo serviço de login (HS256, segredo compartilhado).
#[derive(Clone)]
pub struct TokenVerifier {
    jwt_secret: String,
}

impl TokenVerifier {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::InvalidToken)?;

        let claims = token_data.claims;
        Ok(Identity {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            role: claims.role,
            permissions: claims.permissions.into_iter().collect(),
        })
    }

    /// Emite um token para a identidade. Usado pelas ferramentas internas e pelos testes.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let mut permissions: Vec<String> = identity.permissions.iter().cloned().collect();
        permissions.sort();

        let claims = Claims {
            sub: identity.user_id,
            tenant_id: identity.tenant_id,
            role: identity.role.clone(),
            permissions,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
