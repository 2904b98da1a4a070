// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::{
    common::error::AppError,
    config::AppState,
    models::auth::{Claims, CurrentUser},
};

// O middleware em si. A identidade é emitida pelo serviço externo de
// autenticação; aqui só validamos o token e expomos id + papel do ator.
pub async fn auth_guard(
    State(app_state): State<AppState>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let auth_header = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok());

    if let Some(auth_header) = auth_header {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            let token_data = decode::<Claims>(
                token,
                &DecodingKey::from_secret(app_state.jwt_secret.as_bytes()),
                &Validation::default(),
            )?;

            let user = CurrentUser {
                id: token_data.claims.sub,
                role: token_data.claims.role,
            };

            // Insere o ator nos "extensions" da requisição
            request.extensions_mut().insert(user);
            return Ok(next.run(request).await);
        }
    }

    Err(AppError::InvalidToken)
}

// Extrator para obter o ator autenticado diretamente nos handlers
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or(AppError::InvalidToken)
    }
}
