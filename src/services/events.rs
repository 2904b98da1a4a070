// src/services/events.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::order::{OrderResponse, OrderStatus};
use crate::models::stock::StockAlert;

/// Colaboradores externos notificados depois do commit: pagamento recebe o
/// total na criação, notificação recebe mudanças de status, dashboards
/// recebem alertas de estoque. Fire-and-forget: falha de publicação nunca
/// desfaz a transação que já foi commitada.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn order_created(&self, order: &OrderResponse);

    async fn order_status_changed(
        &self,
        order_id: Uuid,
        order_number: &str,
        from: OrderStatus,
        to: OrderStatus,
    );

    async fn stock_alerts_raised(&self, merchant_id: Uuid, alerts: &[StockAlert]);
}

/// Publicador padrão: registra os eventos no log estruturado. A entrega real
/// (push/SMS/e-mail, captura de pagamento) vive fora deste serviço.
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn order_created(&self, order: &OrderResponse) {
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            payment_method = %order.payment_method,
            "pedido criado"
        );
    }

    async fn order_status_changed(
        &self,
        order_id: Uuid,
        order_number: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) {
        tracing::info!(
            %order_id,
            %order_number,
            ?from,
            ?to,
            "status do pedido alterado"
        );
    }

    async fn stock_alerts_raised(&self, merchant_id: Uuid, alerts: &[StockAlert]) {
        tracing::info!(
            %merchant_id,
            count = alerts.len(),
            "alertas de estoque criados"
        );
    }
}
