// src/handlers/stock.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::auth::{CurrentUser, UserRole},
    models::stock::StockUpdateItem,
};

// ---
// Payload: atualização em lote
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkStockUpdatePayload {
    #[validate(length(min = 1, message = "O lote precisa de pelo menos um item."), nested)]
    pub updates: Vec<StockUpdateItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockHistoryQuery {
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

#[utoipa::path(
    put,
    path = "/api/stock",
    tag = "Stock",
    request_body = StockUpdateItem,
    responses(
        (status = 200, description = "Estoque atualizado", body = crate::models::stock::StockSnapshot),
        (status = 403, description = "Ator não é o dono do produto"),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_stock_level(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<StockUpdateItem>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let snapshot = app_state
        .stock_service
        .update_stock_level(&app_state.db_pool, &payload, user.id)
        .await?;

    Ok(Json(snapshot))
}

#[utoipa::path(
    put,
    path = "/api/stock/bulk",
    tag = "Stock",
    request_body = BulkStockUpdatePayload,
    responses(
        (status = 200, description = "Todos os itens atualizados (tudo-ou-nada)", body = [crate::models::stock::StockSnapshot])
    ),
    security(("api_jwt" = []))
)]
pub async fn bulk_update_stock_levels(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<BulkStockUpdatePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let snapshots = app_state
        .stock_service
        .bulk_update_stock_levels(&app_state.db_pool, &payload.updates, user.id)
        .await?;

    Ok(Json(snapshots))
}

#[utoipa::path(
    get,
    path = "/api/stock/{product_id}/history",
    tag = "Stock",
    responses(
        (status = 200, description = "Histórico do produto, mais recente primeiro", body = [crate::models::stock::StockHistory])
    ),
    params(
        ("product_id" = Uuid, Path, description = "ID do Produto"),
        ("fromDate" = Option<DateTime<Utc>>, Query, description = "Filtro inicial"),
        ("toDate" = Option<DateTime<Utc>>, Query, description = "Filtro final")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_stock_history(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(query): Query<StockHistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let history = app_state
        .stock_service
        .get_stock_history(
            &app_state.db_pool,
            product_id,
            query.from_date,
            query.to_date,
            &user,
        )
        .await?;

    Ok(Json(history))
}

#[utoipa::path(
    post,
    path = "/api/stock/check/{merchant_id}",
    tag = "Stock",
    responses(
        (status = 200, description = "Alertas criados nesta varredura", body = [crate::models::stock::StockAlert])
    ),
    params(("merchant_id" = Uuid, Path, description = "ID do Merchant")),
    security(("api_jwt" = []))
)]
pub async fn check_stock_levels(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Path(merchant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;

    let alerts = app_state
        .stock_service
        .check_stock_levels_and_alert(&app_state.db_pool, merchant_id)
        .await?;

    Ok(Json(alerts))
}

#[utoipa::path(
    get,
    path = "/api/stock/alerts/{merchant_id}",
    tag = "Stock",
    responses(
        (status = 200, description = "Alertas abertos do merchant", body = [crate::models::stock::StockAlert])
    ),
    params(("merchant_id" = Uuid, Path, description = "ID do Merchant")),
    security(("api_jwt" = []))
)]
pub async fn get_stock_alerts(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Path(merchant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let alerts = app_state
        .stock_service
        .get_stock_alerts(&app_state.db_pool, merchant_id, &user)
        .await?;

    Ok(Json(alerts))
}

#[utoipa::path(
    post,
    path = "/api/stock/alerts/{alert_id}/resolve",
    tag = "Stock",
    responses(
        (status = 200, description = "Alerta resolvido", body = crate::models::stock::StockAlert),
        (status = 404, description = "Alerta não encontrado ou já resolvido")
    ),
    params(("alert_id" = Uuid, Path, description = "ID do Alerta")),
    security(("api_jwt" = []))
)]
pub async fn resolve_stock_alert(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Path(alert_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let alert = app_state
        .stock_service
        .resolve_alert(&app_state.db_pool, alert_id, &user)
        .await?;

    Ok(Json(alert))
}

#[utoipa::path(
    post,
    path = "/api/stock/sync/{merchant_id}",
    tag = "Stock",
    responses(
        (status = 204, description = "Sincronização registrada"),
        (status = 422, description = "Sincronização não habilitada")
    ),
    params(("merchant_id" = Uuid, Path, description = "ID do Merchant")),
    security(("api_jwt" = []))
)]
pub async fn synchronize_stock(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Path(merchant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;

    app_state
        .stock_service
        .synchronize_stock(&app_state.db_pool, merchant_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn require_staff(user: &CurrentUser) -> Result<(), AppError> {
    match user.role {
        UserRole::Admin | UserRole::MerchantOwner => Ok(()),
        _ => Err(AppError::AccessDenied),
    }
}
