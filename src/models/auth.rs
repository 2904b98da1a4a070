// src/models/auth.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Papel do ator, como emitido pelo serviço de identidade no claim `role`.
// Também é persistido no log de transições (`changed_by_role`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum UserRole {
    Customer,
    MerchantOwner,
    Courier,
    Admin,
}

// Claims do JWT emitido pelo serviço de identidade externo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub exp: usize,
}

/// Identidade autenticada da requisição, extraída do token pelo middleware.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: UserRole,
}
