// src/db/stock_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::stock::{StockAlert, StockAlertType, StockChange, StockChangeType, StockHistory,
        StockSettings},
};

#[derive(Clone)]
pub struct StockRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl StockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Livro-razão
    // ---

    /// Grava uma entrada no livro-razão. Sempre chamada na mesma transação
    /// que mutou a quantidade que ela descreve.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_history<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        product_variant_id: Option<Uuid>,
        change: &StockChange,
        change_type: StockChangeType,
        reason: Option<&str>,
        changed_by: Option<Uuid>,
        order_id: Option<Uuid>,
        reference_number: Option<&str>,
    ) -> Result<StockHistory, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let history = sqlx::query_as::<_, StockHistory>(
            r#"
            INSERT INTO stock_history (
                product_id, product_variant_id, previous_quantity, new_quantity,
                change_amount, change_type, reason, changed_by, order_id, reference_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(product_variant_id)
        .bind(change.previous_quantity)
        .bind(change.new_quantity)
        .bind(change.change_amount())
        .bind(change_type)
        .bind(reason)
        .bind(changed_by)
        .bind(order_id)
        .bind(reference_number)
        .fetch_one(executor)
        .await?;
        Ok(history)
    }

    /// Histórico de um produto, mais recente primeiro (até 100 entradas).
    pub async fn list_history<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<StockHistory>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let histories = sqlx::query_as::<_, StockHistory>(
            r#"
            SELECT * FROM stock_history
            WHERE product_id = $1
              AND ($2::timestamptz IS NULL OR changed_at >= $2)
              AND ($3::timestamptz IS NULL OR changed_at <= $3)
            ORDER BY changed_at DESC
            LIMIT 100
            "#,
        )
        .bind(product_id)
        .bind(from_date)
        .bind(to_date)
        .fetch_all(executor)
        .await?;
        Ok(histories)
    }

    /// Existe entrada deste tipo para o par pedido/produto?
    /// Decide o no-op da restauração: só devolve estoque que o razão mostra
    /// ter sido reduzido para o pedido e ainda não devolvido.
    pub async fn order_has_history<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        product_id: Uuid,
        product_variant_id: Option<Uuid>,
        change_type: StockChangeType,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM stock_history
                WHERE order_id = $1
                  AND product_id = $2
                  AND product_variant_id IS NOT DISTINCT FROM $3
                  AND change_type = $4
            )
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .bind(product_variant_id)
        .bind(change_type)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    // ---
    // Alertas
    // ---

    /// No máximo um alerta não resolvido de cada tipo por produto.
    pub async fn find_unresolved_alert<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        product_variant_id: Option<Uuid>,
        alert_type: StockAlertType,
    ) -> Result<Option<StockAlert>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let alert = sqlx::query_as::<_, StockAlert>(
            r#"
            SELECT * FROM stock_alerts
            WHERE product_id = $1
              AND product_variant_id IS NOT DISTINCT FROM $2
              AND alert_type = $3
              AND is_resolved = FALSE
            "#,
        )
        .bind(product_id)
        .bind(product_variant_id)
        .bind(alert_type)
        .fetch_optional(executor)
        .await?;
        Ok(alert)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_alert<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
        product_id: Uuid,
        product_variant_id: Option<Uuid>,
        alert_type: StockAlertType,
        current_stock: i32,
        minimum_stock: i32,
        maximum_stock: Option<i32>,
        message: &str,
    ) -> Result<StockAlert, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let alert = sqlx::query_as::<_, StockAlert>(
            r#"
            INSERT INTO stock_alerts (
                merchant_id, product_id, product_variant_id, alert_type,
                current_stock, minimum_stock, maximum_stock, message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(merchant_id)
        .bind(product_id)
        .bind(product_variant_id)
        .bind(alert_type)
        .bind(current_stock)
        .bind(minimum_stock)
        .bind(maximum_stock)
        .bind(message)
        .fetch_one(executor)
        .await?;
        Ok(alert)
    }

    pub async fn list_open_alerts<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
    ) -> Result<Vec<StockAlert>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let alerts = sqlx::query_as::<_, StockAlert>(
            "SELECT * FROM stock_alerts
             WHERE merchant_id = $1 AND is_resolved = FALSE
             ORDER BY created_at DESC",
        )
        .bind(merchant_id)
        .fetch_all(executor)
        .await?;
        Ok(alerts)
    }

    /// Resolução explícita. Alertas resolvidos não reabrem: se a condição
    /// voltar, um novo alerta é criado.
    pub async fn resolve_alert<'e, E>(
        &self,
        executor: E,
        alert_id: Uuid,
    ) -> Result<Option<StockAlert>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let alert = sqlx::query_as::<_, StockAlert>(
            r#"
            UPDATE stock_alerts
            SET is_resolved = TRUE, resolved_at = NOW()
            WHERE id = $1 AND is_resolved = FALSE
            RETURNING *
            "#,
        )
        .bind(alert_id)
        .fetch_optional(executor)
        .await?;
        Ok(alert)
    }

    // ---
    // Configuração por merchant
    // ---

    pub async fn find_active_settings<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
    ) -> Result<Option<StockSettings>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let settings = sqlx::query_as::<_, StockSettings>(
            "SELECT * FROM stock_settings WHERE merchant_id = $1 AND is_active = TRUE",
        )
        .bind(merchant_id)
        .fetch_optional(executor)
        .await?;
        Ok(settings)
    }

    pub async fn touch_sync_time<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE stock_settings
             SET last_sync_at = NOW(), updated_at = NOW()
             WHERE merchant_id = $1",
        )
        .bind(merchant_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}
