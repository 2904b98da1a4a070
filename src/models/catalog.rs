// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- Merchant ---
// O motor só lê merchants: ownership, política de pedido mínimo e taxa de
// entrega vêm daqui. Cadastro e onboarding pertencem a outro contexto.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Merchant {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub minimum_order_amount: Decimal,
    pub delivery_fee: Decimal,
    pub average_delivery_time: i32,
    pub created_at: DateTime<Utc>,
}

// --- Produto ---
// `stock_quantity` e `is_available` são mutados exclusivamente pelo
// StockService; nenhum outro caminho escreve nesses campos.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub discounted_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub is_available: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Preço efetivo de venda: o preço com desconto tem preferência quando definido.
    pub fn effective_price(&self) -> Decimal {
        self.discounted_price.unwrap_or(self.price)
    }
}

// --- Variante de Produto ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
