// src/middleware/auth.rs

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::{self, TenantContext, IMPERSONATION_HEADER},
};

// ---
// Guard: token → identidade → contexto do tenant
// ---
/// Valida o Bearer token, resolve a impersonação e executa o resto da requisição
/// dentro do contexto do tenant. O contexto também vai para as extensions,
/// onde os extratores (ex.: `RequirePermission`) o encontram.
pub async fn auth_guard(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = {
        let token = bearer_token(request.headers()).ok_or(AppError::InvalidToken)?;
        app_state.token_verifier.verify(token)?
    };
    let impersonate = impersonation_target(request.headers())?;

    let ctx = TenantContext::establish(identity, impersonate)?;
    request.extensions_mut().insert(ctx.clone());

    Ok(tenancy::run_with(ctx, next.run(request)).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Lê `x-impersonate-tenant`. Ausente → `None`; presente mas inválido → erro de validação.
fn impersonation_target(headers: &HeaderMap) -> Result<Option<Uuid>, AppError> {
    let Some(value) = headers.get(IMPERSONATION_HEADER) else {
        return Ok(None);
    };

    let raw = value
        .to_str()
        .map_err(|_| AppError::invalid("Cabeçalho x-impersonate-tenant contém caracteres inválidos."))?;

    Uuid::parse_str(raw.trim())
        .map(Some)
        .map_err(|_| AppError::invalid("Cabeçalho x-impersonate-tenant inválido (não é um UUID)."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn impersonation_header_must_be_a_uuid() {
        let mut headers = HeaderMap::new();
        assert!(matches!(impersonation_target(&headers), Ok(None)));

        let target = Uuid::new_v4();
        headers.insert(
            IMPERSONATION_HEADER,
            HeaderValue::from_str(&target.to_string()).unwrap(),
        );
        assert_eq!(impersonation_target(&headers).unwrap(), Some(target));

        headers.insert(IMPERSONATION_HEADER, HeaderValue::from_static("loja-1"));
        assert!(matches!(
            impersonation_target(&headers),
            Err(AppError::InvalidInput(_))
        ));
    }
}
