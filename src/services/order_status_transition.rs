// src/services/order_status_transition.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{Acquire, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CatalogRepository, OrderRepository},
    models::auth::{CurrentUser, UserRole},
    models::order::{
        AvailableTransition, ChangeOrderStatusPayload, OrderStatus, OrderStatusTransitionLog,
    },
    services::events::EventPublisher,
    services::order_status_validator::OrderStatusValidatorService,
    services::stock_service::StockService,
};

/// Motor da máquina de estados: aplica transições validadas, grava uma
/// entrada imutável de auditoria por transição e dispara a restauração de
/// estoque quando o pedido é cancelado.
#[derive(Clone)]
pub struct OrderStatusTransitionService {
    order_repo: OrderRepository,
    catalog_repo: CatalogRepository,
    stock_service: StockService,
    validator: OrderStatusValidatorService,
    events: Arc<dyn EventPublisher>,
}

impl OrderStatusTransitionService {
    pub fn new(
        order_repo: OrderRepository,
        catalog_repo: CatalogRepository,
        stock_service: StockService,
        validator: OrderStatusValidatorService,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            order_repo,
            catalog_repo,
            stock_service,
            validator,
            events,
        }
    }

    /// Aplica uma mudança de status. Tudo (status, log, restauração de
    /// estoque no cancelamento) acontece em uma transação; a notificação sai
    /// depois do commit e nunca desfaz a mudança.
    pub async fn change_order_status<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        payload: &ChangeOrderStatusPayload,
        actor: &CurrentUser,
    ) -> Result<OrderStatusTransitionLog, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        // 1. Carrega o pedido com lock: a validação decide sobre o status
        //    corrente, não sobre uma leitura velha de outro request.
        let order = self
            .order_repo
            .find_order_for_update(&mut *tx, order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;

        let merchant = self
            .catalog_repo
            .find_merchant(&mut *tx, order.merchant_id)
            .await?
            .ok_or(AppError::MerchantNotFound)?;

        let new_status = payload.new_status;

        // 2. Delegação ao validador
        self.validator
            .validate_transition(&order, &merchant, new_status, actor)?;

        let data = effective_data(payload);
        self.validator
            .ensure_required_data(order.status, new_status, data.as_ref())?;

        // 3. Campos que esta transição define no pedido
        let updates = TransitionUpdates::for_transition(new_status, actor, data.as_ref())?;

        let updated = self
            .order_repo
            .update_order_status(
                &mut *tx,
                order.id,
                new_status,
                updates.courier_id,
                updates.estimated_delivery_time,
                updates.actual_delivery_time,
                updates.cancellation_reason.as_deref(),
            )
            .await?;

        // 4. Auditoria
        let log = OrderStatusTransitionLog {
            id: Uuid::new_v4(),
            order_id: order.id,
            from_status: order.status,
            to_status: new_status,
            changed_by: actor.id,
            changed_by_role: actor.role,
            reason: payload
                .reason
                .clone()
                .or_else(|| updates.cancellation_reason.clone()),
            notes: payload.notes.clone(),
            changed_at: Utc::now(),
            is_rollback: false,
            rollback_from_log_id: None,
        };
        let log = self.order_repo.insert_transition_log(&mut *tx, &log).await?;

        // 5. Cancelamento devolve o estoque reduzido na criação, na mesma
        //    transação que a mudança de status.
        if new_status == OrderStatus::Cancelled {
            let lines = self.order_repo.list_order_lines(&mut *tx, order.id).await?;
            self.stock_service
                .restore_lines(&mut *tx, &order, &lines, Some(actor.id))
                .await?;
        }

        tx.commit().await?;

        self.events
            .order_status_changed(updated.id, &updated.order_number, order.status, new_status)
            .await;

        tracing::info!(
            order_id = %order.id,
            from = ?order.status,
            to = ?new_status,
            changed_by = %actor.id,
            role = ?actor.role,
            "transição de status aplicada"
        );

        Ok(log)
    }

    /// Reverte para o status imediatamente anterior registrado no log,
    /// gravando uma nova entrada marcada como rollback com referência à
    /// entrada desfeita. O histórico nunca é apagado.
    pub async fn rollback_last_status_change<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        reason: Option<String>,
        actor: &CurrentUser,
    ) -> Result<OrderStatusTransitionLog, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let order = self
            .order_repo
            .find_order_for_update(&mut *tx, order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;

        let last = self
            .order_repo
            .find_last_applied_transition(&mut *tx, order_id)
            .await?
            .ok_or(AppError::NoTransitionToRollback)?;

        let merchant = self
            .catalog_repo
            .find_merchant(&mut *tx, order.merchant_id)
            .await?
            .ok_or(AppError::MerchantNotFound)?;

        // Rollback anda contra o grafo; só a política de papel se aplica.
        self.validator
            .validate_actor(&order, &merchant, last.from_status, actor)?;

        let updated = self
            .order_repo
            .update_order_status(
                &mut *tx,
                order.id,
                last.from_status,
                None,
                None,
                None,
                None,
            )
            .await?;

        let log = OrderStatusTransitionLog {
            id: Uuid::new_v4(),
            order_id: order.id,
            from_status: order.status,
            to_status: last.from_status,
            changed_by: actor.id,
            changed_by_role: actor.role,
            reason: reason.or_else(|| Some("Rollback".to_string())),
            notes: Some(format!("Reversão da transição {}", last.id)),
            changed_at: Utc::now(),
            is_rollback: true,
            rollback_from_log_id: Some(last.id),
        };
        let log = self.order_repo.insert_transition_log(&mut *tx, &log).await?;

        tx.commit().await?;

        self.events
            .order_status_changed(updated.id, &updated.order_number, order.status, last.from_status)
            .await;

        Ok(log)
    }

    /// Histórico cronológico de transições. Lista vazia, não erro, quando
    /// o pedido ainda não transicionou.
    pub async fn get_order_status_history<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
    ) -> Result<Vec<OrderStatusTransitionLog>, AppError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        self.order_repo.list_transition_logs(executor, order_id).await
    }

    /// Transições disponíveis para o ator, com os dados que cada uma exige.
    pub async fn get_available_transitions<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        actor: &CurrentUser,
    ) -> Result<Vec<AvailableTransition>, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let order = self
            .order_repo
            .find_order(&mut *conn, order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;
        let merchant = self
            .catalog_repo
            .find_merchant(&mut *conn, order.merchant_id)
            .await?
            .ok_or(AppError::MerchantNotFound)?;

        let transitions = self
            .validator
            .valid_next_statuses(&order, &merchant, actor)
            .into_iter()
            .map(|to| AvailableTransition {
                to_status: to,
                required_data: self
                    .validator
                    .required_transition_data(order.status, to)
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            })
            .collect();

        Ok(transitions)
    }
}

/// Campos do pedido definidos por certas transições.
#[derive(Debug)]
struct TransitionUpdates {
    courier_id: Option<Uuid>,
    estimated_delivery_time: Option<DateTime<Utc>>,
    actual_delivery_time: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
}

impl TransitionUpdates {
    fn for_transition(
        to: OrderStatus,
        actor: &CurrentUser,
        data: Option<&Value>,
    ) -> Result<Self, AppError> {
        let mut updates = Self {
            courier_id: None,
            estimated_delivery_time: None,
            actual_delivery_time: None,
            cancellation_reason: None,
        };

        match to {
            OrderStatus::Confirmed => {
                let minutes = require_minutes(data, "estimatedPreparationTime")?;
                updates.estimated_delivery_time = Some(Utc::now() + Duration::minutes(minutes));
            }
            OrderStatus::PickedUp => {
                if actor.role == UserRole::Courier {
                    updates.courier_id = Some(actor.id);
                }
            }
            OrderStatus::OnTheWay => {
                let minutes = require_minutes(data, "estimatedDeliveryTime")?;
                updates.estimated_delivery_time = Some(Utc::now() + Duration::minutes(minutes));
            }
            OrderStatus::Delivered => {
                updates.actual_delivery_time = Some(Utc::now());
            }
            OrderStatus::Cancelled => {
                updates.cancellation_reason = data
                    .and_then(|d| d.get("cancellationReason"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
            }
            _ => {}
        }

        Ok(updates)
    }
}

/// Extrai um campo numérico (minutos) dos dados adicionais.
fn require_minutes(data: Option<&Value>, field: &str) -> Result<i64, AppError> {
    data.and_then(|d| d.get(field))
        .and_then(|v| v.as_i64())
        .filter(|m| *m > 0)
        .ok_or_else(|| AppError::MissingTransitionData(field.to_string()))
}

/// Dados efetivos da transição: o `reason` do payload serve de
/// `cancellationReason` quando os dados adicionais não o trazem.
fn effective_data(payload: &ChangeOrderStatusPayload) -> Option<Value> {
    let mut data = match &payload.additional_data {
        Some(Value::Object(map)) => map.clone(),
        _ => serde_json::Map::new(),
    };

    if !data.contains_key("cancellationReason") {
        if let Some(reason) = &payload.reason {
            data.insert("cancellationReason".to_string(), Value::String(reason.clone()));
        }
    }

    if data.is_empty() {
        None
    } else {
        Some(Value::Object(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(
        new_status: OrderStatus,
        reason: Option<&str>,
        additional_data: Option<Value>,
    ) -> ChangeOrderStatusPayload {
        ChangeOrderStatusPayload {
            new_status,
            reason: reason.map(str::to_string),
            notes: None,
            additional_data,
        }
    }

    #[test]
    fn payload_reason_feeds_cancellation_data() {
        let p = payload(OrderStatus::Cancelled, Some("desisti"), None);
        let data = effective_data(&p).unwrap();
        assert_eq!(data["cancellationReason"], "desisti");

        // dados adicionais explícitos têm precedência
        let p = payload(
            OrderStatus::Cancelled,
            Some("desisti"),
            Some(json!({ "cancellationReason": "loja fechada" })),
        );
        let data = effective_data(&p).unwrap();
        assert_eq!(data["cancellationReason"], "loja fechada");
    }

    #[test]
    fn confirmation_requires_positive_preparation_minutes() {
        let actor = CurrentUser {
            id: Uuid::new_v4(),
            role: UserRole::MerchantOwner,
        };

        let err = TransitionUpdates::for_transition(
            OrderStatus::Confirmed,
            &actor,
            Some(&json!({ "estimatedPreparationTime": -5 })),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_TRANSITION_DATA");

        let updates = TransitionUpdates::for_transition(
            OrderStatus::Confirmed,
            &actor,
            Some(&json!({ "estimatedPreparationTime": 25 })),
        )
        .unwrap();
        assert!(updates.estimated_delivery_time.is_some());
    }

    #[test]
    fn pickup_assigns_the_acting_courier() {
        let courier = CurrentUser {
            id: Uuid::new_v4(),
            role: UserRole::Courier,
        };
        let updates =
            TransitionUpdates::for_transition(OrderStatus::PickedUp, &courier, None).unwrap();
        assert_eq!(updates.courier_id, Some(courier.id));

        // admin marcando retirada não vira entregador do pedido
        let admin = CurrentUser {
            id: Uuid::new_v4(),
            role: UserRole::Admin,
        };
        let updates =
            TransitionUpdates::for_transition(OrderStatus::PickedUp, &admin, None).unwrap();
        assert_eq!(updates.courier_id, None);
    }

    #[test]
    fn delivery_stamps_actual_time_and_cancel_captures_reason() {
        let actor = CurrentUser {
            id: Uuid::new_v4(),
            role: UserRole::Admin,
        };

        let updates =
            TransitionUpdates::for_transition(OrderStatus::Delivered, &actor, None).unwrap();
        assert!(updates.actual_delivery_time.is_some());

        let updates = TransitionUpdates::for_transition(
            OrderStatus::Cancelled,
            &actor,
            Some(&json!({ "cancellationReason": "cliente ausente" })),
        )
        .unwrap();
        assert_eq!(
            updates.cancellation_reason.as_deref(),
            Some("cliente ausente")
        );
    }
}
