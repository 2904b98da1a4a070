// src/models/stock.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Causa da mudança de estoque ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "stock_change_type", rename_all = "SCREAMING_SNAKE_CASE")] // Banco
#[serde(rename_all = "SCREAMING_SNAKE_CASE")] // JSON
pub enum StockChangeType {
    Sale,             // Vira "SALE"
    Return,           // Vira "RETURN"
    ManualAdjustment, // Vira "MANUAL_ADJUSTMENT"
    Correction,
    Transfer,
    Sync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "stock_alert_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockAlertType {
    LowStock,
    OutOfStock,
    Overstock,
}

// --- Livro-razão (Histórico) ---
// Imutável: uma entrada por mutação de quantidade, gravada na mesma
// transação que a mutação que descreve.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockHistory {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_variant_id: Option<Uuid>,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub change_amount: i32,
    pub change_type: StockChangeType,
    pub reason: Option<String>,
    pub changed_by: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub reference_number: Option<String>,
    pub changed_at: DateTime<Utc>,
}

// --- Alerta de Estoque ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAlert {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub product_id: Uuid,
    pub product_variant_id: Option<Uuid>,
    pub alert_type: StockAlertType,
    pub current_stock: i32,
    pub minimum_stock: i32,
    pub maximum_stock: Option<i32>,
    pub message: String,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// --- Configuração de alertas por merchant ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockSettings {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub low_stock_alerts: bool,
    pub default_minimum_stock: i32,
    pub default_maximum_stock: i32,
    pub enable_stock_sync: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockSettings {
    /// Tipo de alerta que a quantidade atual dispara, se algum.
    pub fn alert_type_for(&self, quantity: i32) -> Option<StockAlertType> {
        if quantity == 0 {
            Some(StockAlertType::OutOfStock)
        } else if quantity <= self.default_minimum_stock {
            Some(StockAlertType::LowStock)
        } else if self.default_maximum_stock > 0 && quantity >= self.default_maximum_stock {
            Some(StockAlertType::Overstock)
        } else {
            None
        }
    }
}

// --- Snapshot devolvido pelas operações administrativas de estoque ---
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub product_id: Uuid,
    pub product_variant_id: Option<Uuid>,
    pub stock_quantity: i32,
    pub is_available: bool,
}

// --- Requisição de ajuste administrativo ---
// Também usada em lote: qualquer item inválido aborta o lote inteiro.
#[derive(Debug, Clone, Serialize, Deserialize, validator::Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateItem {
    pub product_id: Uuid,
    pub product_variant_id: Option<Uuid>,
    #[validate(range(min = 0, message = "A quantidade de estoque não pode ser negativa."))]
    pub new_stock_quantity: i32,
    pub reason: Option<String>,
}

// --- Mudança de estoque como valor ---
// A decisão de negócio (pode reduzir? qual o novo saldo? disponível?) é
// separada da persistência: o serviço calcula um `StockChange` e então grava
// quantidade e histórico na mesma transação.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub previous_quantity: i32,
    pub new_quantity: i32,
}

impl StockChange {
    /// Redução por venda. `None` quando o saldo é insuficiente: o novo
    /// saldo nunca fica negativo.
    pub fn reduction(current: i32, quantity: i32) -> Option<Self> {
        if current < quantity {
            return None;
        }
        Some(Self {
            previous_quantity: current,
            new_quantity: current - quantity,
        })
    }

    /// Devolução por cancelamento: o espelho exato da redução.
    pub fn restoration(current: i32, quantity: i32) -> Self {
        Self {
            previous_quantity: current,
            new_quantity: current + quantity,
        }
    }

    /// Ajuste administrativo direto para um valor absoluto.
    pub fn manual(current: i32, new_quantity: i32) -> Self {
        Self {
            previous_quantity: current,
            new_quantity,
        }
    }

    pub fn change_amount(&self) -> i32 {
        self.new_quantity - self.previous_quantity
    }

    pub fn is_available(&self) -> bool {
        self.new_quantity > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_never_goes_negative() {
        // estoque 5, pedido de 10: recusado, saldo permanece 5
        assert_eq!(StockChange::reduction(5, 10), None);
        assert_eq!(StockChange::reduction(0, 1), None);

        let change = StockChange::reduction(100, 10).unwrap();
        assert_eq!(change.new_quantity, 90);
        assert_eq!(change.change_amount(), -10);
        assert!(change.is_available());
    }

    #[test]
    fn availability_flips_exactly_at_zero() {
        let depleted = StockChange::reduction(10, 10).unwrap();
        assert_eq!(depleted.new_quantity, 0);
        assert!(!depleted.is_available());

        let almost = StockChange::reduction(10, 9).unwrap();
        assert_eq!(almost.new_quantity, 1);
        assert!(almost.is_available());

        let restored = StockChange::restoration(0, 1);
        assert!(restored.is_available());
    }

    #[test]
    fn reduce_then_restore_round_trips() {
        let reduce = StockChange::reduction(37, 12).unwrap();
        let restore = StockChange::restoration(reduce.new_quantity, 12);
        assert_eq!(restore.new_quantity, 37);
        assert_eq!(reduce.change_amount() + restore.change_amount(), 0);
    }

    #[test]
    fn repeated_reduction_keeps_decrementing() {
        // A operação NÃO é idempotente: reduzir duas vezes para o mesmo
        // pedido desconta duas vezes. É contrato do chamador invocar no
        // máximo uma vez por pedido.
        let first = StockChange::reduction(20, 5).unwrap();
        let second = StockChange::reduction(first.new_quantity, 5).unwrap();
        assert_eq!(second.new_quantity, 10);
    }

    #[test]
    fn ledger_deltas_sum_to_net_change() {
        let initial = 50;
        let mut current = initial;
        let mut deltas = Vec::new();

        for (kind, qty) in [("r", 10), ("r", 5), ("v", 8), ("r", 20)] {
            let change = match kind {
                "r" => StockChange::reduction(current, qty).unwrap(),
                _ => StockChange::restoration(current, qty),
            };
            assert_eq!(
                change.new_quantity - change.previous_quantity,
                change.change_amount()
            );
            deltas.push(change.change_amount());
            current = change.new_quantity;
        }

        let sum: i32 = deltas.iter().sum();
        assert_eq!(sum, current - initial);
    }

    #[test]
    fn manual_adjustment_recomputes_availability() {
        let zeroed = StockChange::manual(42, 0);
        assert!(!zeroed.is_available());
        assert_eq!(zeroed.change_amount(), -42);

        let refilled = StockChange::manual(0, 7);
        assert!(refilled.is_available());
    }

    #[test]
    fn settings_pick_the_right_alert_type() {
        let settings = StockSettings {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            low_stock_alerts: true,
            default_minimum_stock: 10,
            default_maximum_stock: 1000,
            enable_stock_sync: false,
            last_sync_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };

        assert_eq!(settings.alert_type_for(0), Some(StockAlertType::OutOfStock));
        assert_eq!(settings.alert_type_for(5), Some(StockAlertType::LowStock));
        assert_eq!(settings.alert_type_for(10), Some(StockAlertType::LowStock));
        assert_eq!(settings.alert_type_for(11), None);
        assert_eq!(
            settings.alert_type_for(1000),
            Some(StockAlertType::Overstock)
        );
    }
}
