// src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::auth::UserRole;

// --- Status do Pedido ---
// Enum fechado: um valor ilegal é erro de construção, não comparação de
// string em runtime. O grafo de transições é dado do tipo.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "order_status")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    PickedUp,
    OnTheWay,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::PickedUp,
        OrderStatus::OnTheWay,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Sucessores legais no grafo dirigido de transições.
    /// `Delivered` e `Cancelled` são terminais: nenhuma aresta sai deles.
    pub fn valid_transitions(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::Preparing, OrderStatus::Cancelled],
            OrderStatus::Preparing => &[OrderStatus::Ready, OrderStatus::Cancelled],
            OrderStatus::Ready => &[OrderStatus::PickedUp, OrderStatus::Cancelled],
            OrderStatus::PickedUp => &[OrderStatus::OnTheWay, OrderStatus::Cancelled],
            OrderStatus::OnTheWay => &[OrderStatus::Delivered, OrderStatus::Cancelled],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }
}

// --- Pedido ---
// Mutado apenas pelo motor de transições (status e timestamps); as linhas
// são imutáveis depois da criação.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub merchant_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub status: OrderStatus,
    pub sub_total: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub payment_method: String,
    pub payment_status: String,
    pub delivery_address: String,
    pub delivery_latitude: Decimal,
    pub delivery_longitude: Decimal,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

// Opção escolhida em uma linha, com o acréscimo de preço cobrado.
// Snapshot gravado como JSONB junto da linha.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineOption {
    pub name: String,
    pub extra_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_variant_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub notes: Option<String>,
    pub options: Option<Json<Vec<OrderLineOption>>>,
    pub created_at: DateTime<Utc>,
}

// --- Log de Transições ---
// Append-only: uma entrada por transição bem-sucedida, inclusive rollbacks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusTransitionLog {
    pub id: Uuid,
    pub order_id: Uuid,
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub changed_by: Uuid,
    pub changed_by_role: UserRole,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
    pub is_rollback: bool,
    pub rollback_from_log_id: Option<Uuid>,
}

// --- Respostas ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_variant_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub options: Option<Vec<OrderLineOption>>,
}

impl From<OrderLine> for OrderLineResponse {
    fn from(line: OrderLine) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            product_variant_id: line.product_variant_id,
            product_name: line.product_name,
            quantity: line.quantity,
            unit_price: line.unit_price,
            total_price: line.total_price,
            options: line.options.map(|o| o.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub merchant_id: Uuid,
    pub merchant_name: String,
    pub status: OrderStatus,
    pub sub_total: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub payment_method: String,
    pub payment_status: String,
    pub delivery_address: String,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineResponse>,
}

impl OrderResponse {
    pub fn from_parts(order: Order, merchant_name: String, lines: Vec<OrderLine>) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            merchant_id: order.merchant_id,
            merchant_name,
            status: order.status,
            sub_total: order.sub_total,
            delivery_fee: order.delivery_fee,
            discount: order.discount,
            total: order.total,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            delivery_address: order.delivery_address,
            estimated_delivery_time: order.estimated_delivery_time,
            created_at: order.created_at,
            lines: lines.into_iter().map(OrderLineResponse::from).collect(),
        }
    }
}

// --- Payloads de entrada ---

#[derive(Debug, Serialize, Deserialize, validator::Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemPayload {
    pub product_id: Uuid,
    pub product_variant_id: Option<Uuid>,
    #[validate(range(min = 1, message = "A quantidade deve ser pelo menos 1."))]
    pub quantity: i32,
    pub notes: Option<String>,
    pub options: Option<Vec<OrderLineOption>>,
}

#[derive(Debug, Deserialize, validator::Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderPayload {
    pub merchant_id: Uuid,

    #[validate(length(min = 1, message = "O pedido precisa de pelo menos um item."), nested)]
    pub items: Vec<OrderItemPayload>,

    #[validate(length(min = 5, message = "O endereço de entrega é obrigatório."))]
    pub delivery_address: String,

    pub delivery_latitude: Decimal,
    pub delivery_longitude: Decimal,

    #[validate(length(min = 1, message = "O método de pagamento é obrigatório."))]
    pub payment_method: String,

    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOrderStatusPayload {
    pub new_status: OrderStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    // Dados extras exigidos por certas transições, ex.:
    // {"estimatedPreparationTime": 20} ou {"cancellationReason": "..."}
    #[schema(value_type = Object)]
    pub additional_data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollbackStatusPayload {
    pub reason: Option<String>,
}

// Transição disponível para renderização de ações no cliente.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTransition {
    pub to_status: OrderStatus,
    pub required_data: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_successors() {
        assert!(OrderStatus::Delivered.valid_transitions().is_empty());
        assert!(OrderStatus::Cancelled.valid_transitions().is_empty());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn legal_edges_match_the_graph() {
        use OrderStatus::*;
        let legal = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Preparing),
            (Confirmed, Cancelled),
            (Preparing, Ready),
            (Preparing, Cancelled),
            (Ready, PickedUp),
            (Ready, Cancelled),
            (PickedUp, OnTheWay),
            (PickedUp, Cancelled),
            (OnTheWay, Delivered),
            (OnTheWay, Cancelled),
        ];

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "aresta {from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn no_status_transitions_to_itself() {
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn every_non_terminal_status_can_be_cancelled() {
        for status in OrderStatus::ALL {
            if !status.is_terminal() {
                assert!(status.can_transition_to(OrderStatus::Cancelled));
            }
        }
    }
}
