// src/handlers/orders.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::auth::CurrentUser,
    models::order::{ChangeOrderStatusPayload, CreateOrderPayload, RollbackStatusPayload},
};

#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "Orders",
    request_body = CreateOrderPayload,
    responses(
        (status = 201, description = "Pedido criado", body = crate::models::order::OrderResponse),
        (status = 404, description = "Merchant ou produto não encontrado"),
        (status = 409, description = "Estoque insuficiente"),
        (status = 422, description = "Abaixo do pedido mínimo")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_order(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let order = app_state
        .order_service
        .create_order(&app_state.db_pool, user.id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}",
    tag = "Orders",
    responses(
        (status = 200, description = "Pedido do cliente autenticado", body = crate::models::order::OrderResponse),
        (status = 404, description = "Pedido não encontrado")
    ),
    params(("order_id" = Uuid, Path, description = "ID do Pedido")),
    security(("api_jwt" = []))
)]
pub async fn get_order(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let order = app_state
        .order_service
        .get_order(&app_state.db_pool, order_id, user.id)
        .await?;

    Ok(Json(order))
}

#[utoipa::path(
    post,
    path = "/api/orders/{order_id}/status",
    tag = "Orders",
    request_body = ChangeOrderStatusPayload,
    responses(
        (status = 200, description = "Transição aplicada", body = crate::models::order::OrderStatusTransitionLog),
        (status = 403, description = "Papel não permitido"),
        (status = 404, description = "Pedido não encontrado"),
        (status = 422, description = "Transição ilegal ou dado obrigatório ausente")
    ),
    params(("order_id" = Uuid, Path, description = "ID do Pedido")),
    security(("api_jwt" = []))
)]
pub async fn change_order_status(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<ChangeOrderStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let log = app_state
        .transition_service
        .change_order_status(&app_state.db_pool, order_id, &payload, &user)
        .await?;

    Ok(Json(log))
}

#[utoipa::path(
    post,
    path = "/api/orders/{order_id}/rollback",
    tag = "Orders",
    request_body = RollbackStatusPayload,
    responses(
        (status = 200, description = "Status anterior restaurado", body = crate::models::order::OrderStatusTransitionLog),
        (status = 404, description = "Pedido ou transição não encontrados")
    ),
    params(("order_id" = Uuid, Path, description = "ID do Pedido")),
    security(("api_jwt" = []))
)]
pub async fn rollback_order_status(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<RollbackStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let log = app_state
        .transition_service
        .rollback_last_status_change(&app_state.db_pool, order_id, payload.reason, &user)
        .await?;

    Ok(Json(log))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}/history",
    tag = "Orders",
    responses(
        (status = 200, description = "Histórico cronológico de transições", body = [crate::models::order::OrderStatusTransitionLog])
    ),
    params(("order_id" = Uuid, Path, description = "ID do Pedido")),
    security(("api_jwt" = []))
)]
pub async fn get_order_status_history(
    State(app_state): State<AppState>,
    _user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let history = app_state
        .transition_service
        .get_order_status_history(&app_state.db_pool, order_id)
        .await?;

    Ok(Json(history))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}/transitions",
    tag = "Orders",
    responses(
        (status = 200, description = "Transições disponíveis para o ator", body = [crate::models::order::AvailableTransition]),
        (status = 404, description = "Pedido não encontrado")
    ),
    params(("order_id" = Uuid, Path, description = "ID do Pedido")),
    security(("api_jwt" = []))
)]
pub async fn get_available_transitions(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transitions = app_state
        .transition_service
        .get_available_transitions(&app_state.db_pool, order_id, &user)
        .await?;

    Ok(Json(transitions))
}
