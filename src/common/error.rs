use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

use crate::models::order::OrderStatus;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Cada variante de negócio carrega um código estável que os clientes podem
// usar para reagir sem fazer parse da mensagem.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Merchant não encontrado ou inativo")]
    MerchantNotFound,

    #[error("Merchant está inativo")]
    MerchantInactive,

    #[error("Produto não encontrado para este merchant")]
    ProductNotFound,

    #[error("Pedido não encontrado")]
    OrderNotFound,

    #[error("Alerta não encontrado ou já resolvido")]
    AlertNotFound,

    #[error("O valor mínimo do pedido é {0}")]
    BelowMinimumOrder(Decimal),

    #[error("Estoque insuficiente para '{0}'")]
    InsufficientStock(String),

    #[error("Transição de status inválida: {from:?} -> {to:?}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Dado obrigatório ausente para a transição: {0}")]
    MissingTransitionData(String),

    #[error("{0}")]
    RoleNotPermitted(String),

    #[error("Acesso negado")]
    AccessDenied,

    #[error("Nenhuma transição encontrada para reverter")]
    NoTransitionToRollback,

    #[error("Sincronização de estoque não habilitada para este merchant")]
    StockSyncDisabled,

    #[error("Token de autenticação inválido ou ausente")]
    InvalidToken,

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Código estável exposto na resposta JSON, independente da mensagem.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::MerchantNotFound => "MERCHANT_NOT_FOUND",
            AppError::MerchantInactive => "MERCHANT_INACTIVE",
            AppError::ProductNotFound => "PRODUCT_NOT_FOUND",
            AppError::OrderNotFound => "ORDER_NOT_FOUND",
            AppError::AlertNotFound => "ALERT_NOT_FOUND",
            AppError::BelowMinimumOrder(_) => "BELOW_MINIMUM_ORDER",
            AppError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            AppError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            AppError::MissingTransitionData(_) => "MISSING_TRANSITION_DATA",
            AppError::RoleNotPermitted(_) => "ROLE_NOT_PERMITTED",
            AppError::AccessDenied => "ACCESS_DENIED",
            AppError::NoTransitionToRollback => "NO_TRANSITION_TO_ROLLBACK",
            AppError::StockSyncDisabled => "SYNC_NOT_ENABLED",
            AppError::InvalidToken | AppError::JwtError(_) => "INVALID_TOKEN",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::MerchantNotFound
            | AppError::ProductNotFound
            | AppError::OrderNotFound
            | AppError::AlertNotFound
            | AppError::NoTransitionToRollback => StatusCode::NOT_FOUND,
            AppError::BelowMinimumOrder(_)
            | AppError::MerchantInactive
            | AppError::InvalidStatusTransition { .. }
            | AppError::MissingTransitionData(_)
            | AppError::StockSyncDisabled => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InsufficientStock(_) => StatusCode::CONFLICT,
            AppError::RoleNotPermitted(_) | AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::InvalidToken | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Detalhes de validação viram um mapa campo -> mensagens.
        if let AppError::ValidationError(errors) = &self {
            let mut details = std::collections::HashMap::new();
            for (field, field_errors) in errors.field_errors() {
                let messages: Vec<String> = field_errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .collect();
                details.insert(field.to_string(), messages);
            }
            let body = Json(json!({
                "code": self.error_code(),
                "error": "Um ou mais campos são inválidos.",
                "details": details,
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        let status = self.status_code();

        // Erros de infraestrutura não vazam detalhes; o `tracing` fica com a
        // mensagem completa que o `thiserror` nos deu.
        let message = match &self {
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                tracing::error!("Erro interno do servidor: {}", self);
                "Ocorreu um erro inesperado.".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "code": self.error_code(),
            "error": message,
        }));
        (status, body).into_response()
    }
}
