// src/services/order_service.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{Acquire, Postgres};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CatalogRepository, OrderRepository},
    models::catalog::{Product, ProductVariant},
    models::order::{
        CreateOrderPayload, Order, OrderLine, OrderLineOption, OrderResponse, OrderStatus,
    },
    services::events::EventPublisher,
    services::stock_service::StockService,
};

/// Orquestrador da criação de pedidos: resolve merchant e produtos, calcula
/// preços com snapshot, aplica a política de pedido mínimo, reduz o estoque
/// e persiste pedido e linhas, tudo em uma única transação. Qualquer falha
/// no meio do caminho não deixa resíduo nenhum.
#[derive(Clone)]
pub struct OrderService {
    catalog_repo: CatalogRepository,
    order_repo: OrderRepository,
    stock_service: StockService,
    events: Arc<dyn EventPublisher>,
}

impl OrderService {
    pub fn new(
        catalog_repo: CatalogRepository,
        order_repo: OrderRepository,
        stock_service: StockService,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            catalog_repo,
            order_repo,
            stock_service,
            events,
        }
    }

    pub async fn create_order<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        payload: &CreateOrderPayload,
    ) -> Result<OrderResponse, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        // 1. Merchant precisa existir e estar ativo
        let merchant = self
            .catalog_repo
            .find_active_merchant(&mut *tx, payload.merchant_id)
            .await?
            .ok_or(AppError::MerchantNotFound)?;

        // 2. Resolve cada linha sob o merchant, travando as linhas de
        //    produto: nenhum outro pedido concorrente muda o saldo entre a
        //    resolução e a redução mais abaixo.
        let order_id = Uuid::new_v4();
        let mut lines = Vec::with_capacity(payload.items.len());
        let mut sub_total = Decimal::ZERO;

        for item in &payload.items {
            let product = self
                .catalog_repo
                .find_merchant_product_for_update(&mut *tx, item.product_id, merchant.id)
                .await?
                .ok_or(AppError::ProductNotFound)?;

            let variant = match item.product_variant_id {
                Some(variant_id) => Some(
                    self.catalog_repo
                        .find_variant_for_update(&mut *tx, variant_id, product.id)
                        .await?
                        .ok_or(AppError::ProductNotFound)?,
                ),
                None => None,
            };

            // 3. Snapshot de preço: o preço com desconto tem preferência
            let options = item.options.clone().unwrap_or_default();
            let unit_price = unit_price(&product, variant.as_ref());
            let total_price = line_total(unit_price, item.quantity, &options);
            sub_total += total_price;

            lines.push(OrderLine {
                id: Uuid::new_v4(),
                order_id,
                product_id: product.id,
                product_variant_id: variant.as_ref().map(|v| v.id),
                product_name: product.name.clone(),
                quantity: item.quantity,
                unit_price,
                total_price,
                notes: item.notes.clone(),
                options: if options.is_empty() {
                    None
                } else {
                    Some(Json(options))
                },
                created_at: Utc::now(),
            });
        }

        // 4. Política de pedido mínimo: rejeita o pedido inteiro
        if sub_total < merchant.minimum_order_amount {
            return Err(AppError::BelowMinimumOrder(merchant.minimum_order_amount));
        }

        // Cupons/descontos pertencem a outro contexto; aqui o desconto é zero
        let discount = Decimal::ZERO;
        let total = sub_total + merchant.delivery_fee - discount;

        let order = Order {
            id: order_id,
            order_number: generate_order_number(),
            user_id,
            merchant_id: merchant.id,
            courier_id: None,
            status: OrderStatus::Pending,
            sub_total,
            delivery_fee: merchant.delivery_fee,
            discount,
            total,
            payment_method: payload.payment_method.clone(),
            payment_status: "Pending".to_string(),
            delivery_address: payload.delivery_address.clone(),
            delivery_latitude: payload.delivery_latitude,
            delivery_longitude: payload.delivery_longitude,
            estimated_delivery_time: Some(
                Utc::now() + Duration::minutes(merchant.average_delivery_time.into()),
            ),
            actual_delivery_time: None,
            cancellation_reason: None,
            notes: payload.notes.clone(),
            created_at: Utc::now(),
            updated_at: None,
        };

        // 5. Persiste pedido e linhas
        let order = self.order_repo.insert_order(&mut *tx, &order).await?;
        let mut inserted_lines = Vec::with_capacity(lines.len());
        for line in &lines {
            inserted_lines.push(self.order_repo.insert_order_line(&mut *tx, line).await?);
        }

        // 6. Reduz o estoque de todas as linhas; estoque insuficiente em
        //    qualquer uma aborta o pedido inteiro (rollback da transação,
        //    inclusive das reduções já feitas para linhas anteriores)
        self.stock_service
            .reduce_lines(&mut *tx, &order, &inserted_lines, Some(user_id))
            .await?;

        // 7. Alertas de nível, na mesma transação que a redução
        let alerts = self
            .stock_service
            .check_levels(&mut *tx, merchant.id)
            .await?;

        tx.commit().await?;

        let response = OrderResponse::from_parts(order, merchant.name.clone(), inserted_lines);

        // Colaboradores externos, depois do commit
        self.events.order_created(&response).await;
        if !alerts.is_empty() {
            self.events.stock_alerts_raised(merchant.id, &alerts).await;
        }

        tracing::info!(
            order_id = %response.id,
            order_number = %response.order_number,
            merchant_id = %merchant.id,
            total = %response.total,
            "pedido criado"
        );

        Ok(response)
    }

    /// Pedido do próprio cliente, com linhas e nome do merchant.
    pub async fn get_order<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<OrderResponse, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let order = self
            .order_repo
            .find_order_for_user(&mut *conn, order_id, user_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;

        let merchant = self
            .catalog_repo
            .find_merchant(&mut *conn, order.merchant_id)
            .await?
            .ok_or(AppError::MerchantNotFound)?;

        let lines = self.order_repo.list_order_lines(&mut *conn, order_id).await?;

        Ok(OrderResponse::from_parts(order, merchant.name, lines))
    }
}

/// Preço unitário com snapshot: variante usa o próprio preço; produto usa o
/// preço com desconto quando definido.
fn unit_price(product: &Product, variant: Option<&ProductVariant>) -> Decimal {
    match variant {
        Some(v) => v.price,
        None => product.effective_price(),
    }
}

/// Subtotal da linha: preço unitário x quantidade + acréscimos das opções.
fn line_total(unit_price: Decimal, quantity: i32, options: &[OrderLineOption]) -> Decimal {
    let extras: Decimal = options.iter().map(|o| o.extra_price).sum();
    unit_price * Decimal::from(quantity) + extras
}

fn generate_order_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, discounted: Option<i64>) -> Product {
        Product {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            name: "Pão francês".to_string(),
            description: None,
            price: Decimal::new(price, 2),
            discounted_price: discounted.map(|d| Decimal::new(d, 2)),
            stock_quantity: 100,
            is_available: true,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn discounted_price_wins_when_present() {
        let p = product(1000, Some(800));
        assert_eq!(unit_price(&p, None), Decimal::new(800, 2));

        let full = product(1000, None);
        assert_eq!(unit_price(&full, None), Decimal::new(1000, 2));
    }

    #[test]
    fn variant_price_overrides_product_price() {
        let p = product(1000, Some(800));
        let v = ProductVariant {
            id: Uuid::new_v4(),
            product_id: p.id,
            name: "Integral".to_string(),
            price: Decimal::new(1200, 2),
            stock_quantity: 10,
            is_available: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(unit_price(&p, Some(&v)), Decimal::new(1200, 2));
    }

    #[test]
    fn line_total_adds_option_extras_once() {
        let options = vec![
            OrderLineOption {
                name: "Queijo extra".to_string(),
                extra_price: Decimal::new(300, 2),
            },
            OrderLineOption {
                name: "Embalagem presente".to_string(),
                extra_price: Decimal::new(150, 2),
            },
        ];

        // 3 x 10,00 + 3,00 + 1,50 = 34,50
        let total = line_total(Decimal::new(1000, 2), 3, &options);
        assert_eq!(total, Decimal::new(3450, 2));

        // sem opções: só preço x quantidade
        let total = line_total(Decimal::new(1000, 2), 3, &[]);
        assert_eq!(total, Decimal::new(3000, 2));
    }

    #[test]
    fn subtotal_below_minimum_is_rejected() {
        // merchant exige 100,00; carrinho soma 80,00
        let minimum = Decimal::new(10000, 2);
        let sub_total = line_total(Decimal::new(4000, 2), 2, &[]);
        assert_eq!(sub_total, Decimal::new(8000, 2));
        assert!(sub_total < minimum);

        let err = AppError::BelowMinimumOrder(minimum);
        assert_eq!(err.error_code(), "BELOW_MINIMUM_ORDER");
    }

    #[test]
    fn order_number_has_date_and_suffix() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 8); // AAAAMMDD
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));

        // dois pedidos não compartilham número
        assert_ne!(generate_order_number(), generate_order_number());
    }
}
