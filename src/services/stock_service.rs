// src/services/stock_service.rs

use std::sync::Arc;

use sqlx::{Acquire, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CatalogRepository, OrderRepository, StockRepository},
    models::auth::CurrentUser,
    models::auth::UserRole,
    models::catalog::Product,
    models::order::{Order, OrderLine},
    models::stock::{
        StockAlert, StockAlertType, StockChange, StockChangeType, StockHistory, StockSettings,
        StockSnapshot, StockUpdateItem,
    },
    services::events::EventPublisher,
};

/// Único caminho de mutação de `stock_quantity`: criação de pedido,
/// restauração por cancelamento e ajustes administrativos passam todos por
/// aqui, de modo que toda mudança de quantidade é gravada junto da sua
/// entrada no livro-razão, na mesma transação.
#[derive(Clone)]
pub struct StockService {
    catalog_repo: CatalogRepository,
    order_repo: OrderRepository,
    stock_repo: StockRepository,
    events: Arc<dyn EventPublisher>,
}

impl StockService {
    pub fn new(
        catalog_repo: CatalogRepository,
        order_repo: OrderRepository,
        stock_repo: StockRepository,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            catalog_repo,
            order_repo,
            stock_repo,
            events,
        }
    }

    // ---
    // Redução e restauração ligadas ao ciclo de vida do pedido
    // ---

    /// Reduz o estoque de todas as linhas de um pedido, em uma transação.
    ///
    /// NÃO é idempotente: chamar duas vezes para o mesmo pedido desconta
    /// duas vezes. É contrato do chamador invocar no máximo uma vez por
    /// pedido (a criação de pedido já o faz dentro da própria transação).
    pub async fn reduce_stock_for_order<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        changed_by: Option<Uuid>,
    ) -> Result<(), AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let order = self
            .order_repo
            .find_order(&mut *tx, order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;
        let lines = self.order_repo.list_order_lines(&mut *tx, order_id).await?;

        self.reduce_lines(&mut *tx, &order, &lines, changed_by).await?;
        let alerts = self.check_levels(&mut *tx, order.merchant_id).await?;

        tx.commit().await?;

        if !alerts.is_empty() {
            self.events
                .stock_alerts_raised(order.merchant_id, &alerts)
                .await;
        }
        Ok(())
    }

    /// Devolve ao estoque as quantidades reduzidas na criação do pedido.
    /// Espelho exato da redução: nunca devolve mais, nunca menos.
    pub async fn restore_stock_for_order<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        changed_by: Option<Uuid>,
    ) -> Result<(), AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let order = self
            .order_repo
            .find_order(&mut *tx, order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;
        let lines = self.order_repo.list_order_lines(&mut *tx, order_id).await?;

        self.restore_lines(&mut *tx, &order, &lines, changed_by).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Miolo da redução, para rodar dentro da transação do chamador
    /// (criação de pedido). Linha a linha: trava a linha do produto (ou da
    /// variante), re-checa o saldo depois do lock, decrementa e grava a
    /// entrada de venda no razão.
    pub(crate) async fn reduce_lines(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        lines: &[OrderLine],
        changed_by: Option<Uuid>,
    ) -> Result<(), AppError> {
        for line in lines {
            if let Some(variant_id) = line.product_variant_id {
                let variant = self
                    .catalog_repo
                    .find_variant_for_update(&mut *conn, variant_id, line.product_id)
                    .await?
                    .ok_or(AppError::ProductNotFound)?;

                let change = StockChange::reduction(variant.stock_quantity, line.quantity)
                    .ok_or_else(|| AppError::InsufficientStock(line.product_name.clone()))?;

                self.catalog_repo
                    .set_variant_stock(&mut *conn, variant.id, change.new_quantity, change.is_available())
                    .await?;
                self.stock_repo
                    .insert_history(
                        &mut *conn,
                        line.product_id,
                        Some(variant_id),
                        &change,
                        StockChangeType::Sale,
                        Some("Pedido criado"),
                        changed_by,
                        Some(order.id),
                        Some(&order.order_number),
                    )
                    .await?;
            } else {
                let product = self
                    .catalog_repo
                    .find_product_for_update(&mut *conn, line.product_id)
                    .await?
                    .ok_or(AppError::ProductNotFound)?;

                let change = StockChange::reduction(product.stock_quantity, line.quantity)
                    .ok_or_else(|| AppError::InsufficientStock(product.name.clone()))?;

                self.catalog_repo
                    .set_product_stock(&mut *conn, product.id, change.new_quantity, change.is_available())
                    .await?;
                self.stock_repo
                    .insert_history(
                        &mut *conn,
                        line.product_id,
                        None,
                        &change,
                        StockChangeType::Sale,
                        Some("Pedido criado"),
                        changed_by,
                        Some(order.id),
                        Some(&order.order_number),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Miolo da restauração, para rodar dentro da transação do chamador
    /// (cancelamento). Linha sem redução registrada no razão, ou já
    /// devolvida, é no-op silencioso: nada de quantidade, nada de histórico.
    pub(crate) async fn restore_lines(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        lines: &[OrderLine],
        changed_by: Option<Uuid>,
    ) -> Result<(), AppError> {
        for line in lines {
            let was_reduced = self
                .stock_repo
                .order_has_history(
                    &mut *conn,
                    order.id,
                    line.product_id,
                    line.product_variant_id,
                    StockChangeType::Sale,
                )
                .await?;
            let already_restored = self
                .stock_repo
                .order_has_history(
                    &mut *conn,
                    order.id,
                    line.product_id,
                    line.product_variant_id,
                    StockChangeType::Return,
                )
                .await?;

            if !was_reduced || already_restored {
                continue;
            }

            if let Some(variant_id) = line.product_variant_id {
                let variant = self
                    .catalog_repo
                    .find_variant_for_update(&mut *conn, variant_id, line.product_id)
                    .await?
                    .ok_or(AppError::ProductNotFound)?;

                let change = StockChange::restoration(variant.stock_quantity, line.quantity);

                self.catalog_repo
                    .set_variant_stock(&mut *conn, variant.id, change.new_quantity, change.is_available())
                    .await?;
                self.stock_repo
                    .insert_history(
                        &mut *conn,
                        line.product_id,
                        Some(variant_id),
                        &change,
                        StockChangeType::Return,
                        Some("Pedido cancelado"),
                        changed_by,
                        Some(order.id),
                        Some(&order.order_number),
                    )
                    .await?;
            } else {
                let product = self
                    .catalog_repo
                    .find_product_for_update(&mut *conn, line.product_id)
                    .await?
                    .ok_or(AppError::ProductNotFound)?;

                let change = StockChange::restoration(product.stock_quantity, line.quantity);

                self.catalog_repo
                    .set_product_stock(&mut *conn, product.id, change.new_quantity, change.is_available())
                    .await?;
                self.stock_repo
                    .insert_history(
                        &mut *conn,
                        line.product_id,
                        None,
                        &change,
                        StockChangeType::Return,
                        Some("Pedido cancelado"),
                        changed_by,
                        Some(order.id),
                        Some(&order.order_number),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    // ---
    // Ajustes administrativos
    // ---

    /// Define o nível absoluto de estoque de um produto (ou variante).
    /// Somente o merchant dono do produto pode ajustar.
    pub async fn update_stock_level<'e, E>(
        &self,
        executor: E,
        item: &StockUpdateItem,
        actor_id: Uuid,
    ) -> Result<StockSnapshot, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let snapshot = self.apply_update(&mut *tx, item, actor_id).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    /// Aplica vários ajustes em uma única transação: qualquer falha desfaz
    /// todos (tudo-ou-nada estrito).
    pub async fn bulk_update_stock_levels<'e, E>(
        &self,
        executor: E,
        items: &[StockUpdateItem],
        actor_id: Uuid,
    ) -> Result<Vec<StockSnapshot>, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let mut snapshots = Vec::with_capacity(items.len());
        for item in items {
            let snapshot = self.apply_update(&mut *tx, item, actor_id).await?;
            snapshots.push(snapshot);
        }

        tx.commit().await?;
        Ok(snapshots)
    }

    async fn apply_update(
        &self,
        conn: &mut PgConnection,
        item: &StockUpdateItem,
        actor_id: Uuid,
    ) -> Result<StockSnapshot, AppError> {
        if item.new_stock_quantity < 0 {
            let mut errors = validator::ValidationErrors::new();
            let mut err = validator::ValidationError::new("range");
            err.message = Some("A quantidade de estoque não pode ser negativa.".into());
            errors.add("newStockQuantity", err);
            return Err(AppError::ValidationError(errors));
        }

        let product = self
            .catalog_repo
            .find_product_for_update(&mut *conn, item.product_id)
            .await?
            .ok_or(AppError::ProductNotFound)?;

        self.authorize_owner(&mut *conn, &product, actor_id).await?;

        let reason = item.reason.as_deref();

        if let Some(variant_id) = item.product_variant_id {
            let variant = self
                .catalog_repo
                .find_variant_for_update(&mut *conn, variant_id, product.id)
                .await?
                .ok_or(AppError::ProductNotFound)?;

            let change = StockChange::manual(variant.stock_quantity, item.new_stock_quantity);

            self.catalog_repo
                .set_variant_stock(&mut *conn, variant.id, change.new_quantity, change.is_available())
                .await?;
            self.stock_repo
                .insert_history(
                    &mut *conn,
                    product.id,
                    Some(variant_id),
                    &change,
                    StockChangeType::ManualAdjustment,
                    reason,
                    Some(actor_id),
                    None,
                    None,
                )
                .await?;

            Ok(StockSnapshot {
                product_id: product.id,
                product_variant_id: Some(variant_id),
                stock_quantity: change.new_quantity,
                is_available: change.is_available(),
            })
        } else {
            let change = StockChange::manual(product.stock_quantity, item.new_stock_quantity);

            self.catalog_repo
                .set_product_stock(&mut *conn, product.id, change.new_quantity, change.is_available())
                .await?;
            self.stock_repo
                .insert_history(
                    &mut *conn,
                    product.id,
                    None,
                    &change,
                    StockChangeType::ManualAdjustment,
                    reason,
                    Some(actor_id),
                    None,
                    None,
                )
                .await?;

            Ok(StockSnapshot {
                product_id: product.id,
                product_variant_id: None,
                stock_quantity: change.new_quantity,
                is_available: change.is_available(),
            })
        }
    }

    async fn authorize_owner(
        &self,
        conn: &mut PgConnection,
        product: &Product,
        actor_id: Uuid,
    ) -> Result<(), AppError> {
        let merchant = self
            .catalog_repo
            .find_merchant(&mut *conn, product.merchant_id)
            .await?
            .ok_or(AppError::MerchantNotFound)?;
        if merchant.owner_id != actor_id {
            return Err(AppError::AccessDenied);
        }
        Ok(())
    }

    // ---
    // Alertas de nível de estoque
    // ---

    /// Varre os produtos ativos do merchant e cria os alertas que os níveis
    /// atuais disparam. Devolve os alertas criados para o chamador publicar
    /// depois do commit.
    pub async fn check_stock_levels_and_alert<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
    ) -> Result<Vec<StockAlert>, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let alerts = self.check_levels(&mut *tx, merchant_id).await?;
        tx.commit().await?;

        if !alerts.is_empty() {
            self.events.stock_alerts_raised(merchant_id, &alerts).await;
        }
        Ok(alerts)
    }

    /// Versão interna para compor com a transação do chamador.
    pub(crate) async fn check_levels(
        &self,
        conn: &mut PgConnection,
        merchant_id: Uuid,
    ) -> Result<Vec<StockAlert>, AppError> {
        // Sem configuração ativa ou com alertas desligados, nada a fazer.
        let Some(settings) = self
            .stock_repo
            .find_active_settings(&mut *conn, merchant_id)
            .await?
        else {
            return Ok(Vec::new());
        };
        if !settings.low_stock_alerts {
            return Ok(Vec::new());
        }

        let products = self
            .catalog_repo
            .list_active_products(&mut *conn, merchant_id)
            .await?;

        let mut created = Vec::new();
        for product in products {
            let Some(alert_type) = settings.alert_type_for(product.stock_quantity) else {
                continue;
            };

            // Invariante de deduplicação: no máximo um alerta não resolvido
            // de cada tipo por produto.
            let existing = self
                .stock_repo
                .find_unresolved_alert(&mut *conn, product.id, None, alert_type)
                .await?;
            if existing.is_some() {
                continue;
            }

            let message = alert_message(&product, alert_type, &settings);
            let alert = self
                .stock_repo
                .insert_alert(
                    &mut *conn,
                    merchant_id,
                    product.id,
                    None,
                    alert_type,
                    product.stock_quantity,
                    settings.default_minimum_stock,
                    Some(settings.default_maximum_stock),
                    &message,
                )
                .await?;
            created.push(alert);
        }

        Ok(created)
    }

    /// Alertas abertos de um merchant, visíveis ao dono ou a um admin.
    pub async fn get_stock_alerts<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
        actor: &CurrentUser,
    ) -> Result<Vec<StockAlert>, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        if actor.role != UserRole::Admin {
            let merchant = self
                .catalog_repo
                .find_merchant(&mut *conn, merchant_id)
                .await?
                .ok_or(AppError::MerchantNotFound)?;
            if merchant.owner_id != actor.id {
                return Err(AppError::AccessDenied);
            }
        }

        self.stock_repo.list_open_alerts(&mut *conn, merchant_id).await
    }

    /// Resolução explícita de um alerta, pelo dono do merchant ou admin.
    pub async fn resolve_alert<'e, E>(
        &self,
        executor: E,
        alert_id: Uuid,
        actor: &CurrentUser,
    ) -> Result<StockAlert, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let alert = self
            .stock_repo
            .resolve_alert(&mut *tx, alert_id)
            .await?
            .ok_or(AppError::AlertNotFound)?;

        if actor.role != UserRole::Admin {
            let merchant = self
                .catalog_repo
                .find_merchant(&mut *tx, alert.merchant_id)
                .await?
                .ok_or(AppError::MerchantNotFound)?;
            if merchant.owner_id != actor.id {
                return Err(AppError::AccessDenied);
            }
        }

        tx.commit().await?;
        Ok(alert)
    }

    // ---
    // Consultas e sincronização
    // ---

    /// Histórico de um produto, visível ao dono do merchant ou a um admin.
    pub async fn get_stock_history<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        from_date: Option<chrono::DateTime<chrono::Utc>>,
        to_date: Option<chrono::DateTime<chrono::Utc>>,
        actor: &CurrentUser,
    ) -> Result<Vec<StockHistory>, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let product = self
            .catalog_repo
            .find_product(&mut *conn, product_id)
            .await?
            .ok_or(AppError::ProductNotFound)?;

        if actor.role != UserRole::Admin {
            self.authorize_owner(&mut *conn, &product, actor.id).await?;
        }

        self.stock_repo
            .list_history(&mut *conn, product_id, from_date, to_date)
            .await
    }

    /// Sincronização com sistemas externos. A integração em si vive fora;
    /// aqui só é registrado o instante da última sincronização.
    pub async fn synchronize_stock<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let settings = self
            .stock_repo
            .find_active_settings(&mut *tx, merchant_id)
            .await?;
        match settings {
            Some(s) if s.enable_stock_sync => {}
            _ => return Err(AppError::StockSyncDisabled),
        }

        self.stock_repo.touch_sync_time(&mut *tx, merchant_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn alert_message(product: &Product, alert_type: StockAlertType, settings: &StockSettings) -> String {
    match alert_type {
        StockAlertType::OutOfStock => {
            format!("Produto '{}' sem estoque", product.name)
        }
        StockAlertType::LowStock => format!(
            "Produto '{}' com estoque baixo ({} restantes, mínimo {})",
            product.name, product.stock_quantity, settings.default_minimum_stock
        ),
        StockAlertType::Overstock => format!(
            "Produto '{}' acima do estoque máximo ({} em estoque, máximo {})",
            product.name, product.stock_quantity, settings.default_maximum_stock
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn product(stock: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            name: "Café torrado".to_string(),
            description: None,
            price: Decimal::new(2500, 2),
            discounted_price: None,
            stock_quantity: stock,
            is_available: stock > 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn settings(min: i32, max: i32) -> StockSettings {
        StockSettings {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            low_stock_alerts: true,
            default_minimum_stock: min,
            default_maximum_stock: max,
            enable_stock_sync: false,
            last_sync_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn alert_messages_name_the_product_and_levels() {
        let s = settings(10, 1000);

        let out = alert_message(&product(0), StockAlertType::OutOfStock, &s);
        assert!(out.contains("Café torrado"));
        assert!(out.contains("sem estoque"));

        let low = alert_message(&product(3), StockAlertType::LowStock, &s);
        assert!(low.contains("3 restantes"));
        assert!(low.contains("mínimo 10"));

        let over = alert_message(&product(1500), StockAlertType::Overstock, &s);
        assert!(over.contains("máximo 1000"));
    }
}
