// src/db/order_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::order::{Order, OrderLine, OrderStatus, OrderStatusTransitionLog},
};

#[derive(Clone)]
pub struct OrderRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Pedidos
    // ---

    pub async fn insert_order<'e, E>(&self, executor: E, order: &Order) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inserted = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, order_number, user_id, merchant_id, courier_id, status,
                sub_total, delivery_fee, discount, total,
                payment_method, payment_status,
                delivery_address, delivery_latitude, delivery_longitude,
                estimated_delivery_time, notes, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(order.merchant_id)
        .bind(order.courier_id)
        .bind(order.status)
        .bind(order.sub_total)
        .bind(order.delivery_fee)
        .bind(order.discount)
        .bind(order.total)
        .bind(&order.payment_method)
        .bind(&order.payment_status)
        .bind(&order.delivery_address)
        .bind(order.delivery_latitude)
        .bind(order.delivery_longitude)
        .bind(order.estimated_delivery_time)
        .bind(&order.notes)
        .bind(order.created_at)
        .fetch_one(executor)
        .await?;
        Ok(inserted)
    }

    pub async fn insert_order_line<'e, E>(
        &self,
        executor: E,
        line: &OrderLine,
    ) -> Result<OrderLine, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inserted = sqlx::query_as::<_, OrderLine>(
            r#"
            INSERT INTO order_lines (
                id, order_id, product_id, product_variant_id, product_name,
                quantity, unit_price, total_price, notes, options, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(line.id)
        .bind(line.order_id)
        .bind(line.product_id)
        .bind(line.product_variant_id)
        .bind(&line.product_name)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.total_price)
        .bind(&line.notes)
        .bind(&line.options)
        .bind(line.created_at)
        .fetch_one(executor)
        .await?;
        Ok(inserted)
    }

    pub async fn find_order<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
    ) -> Result<Option<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(executor)
            .await?;
        Ok(order)
    }

    /// Carrega o pedido travando a linha: a validação da transição acontece
    /// sobre o status corrente, não sobre uma leitura possivelmente velha.
    pub async fn find_order_for_update<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
    ) -> Result<Option<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(executor)
            .await?;
        Ok(order)
    }

    pub async fn find_order_for_user<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order =
            sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
                .bind(order_id)
                .bind(user_id)
                .fetch_optional(executor)
                .await?;
        Ok(order)
    }

    pub async fn list_order_lines<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
    ) -> Result<Vec<OrderLine>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lines = sqlx::query_as::<_, OrderLine>(
            "SELECT * FROM order_lines WHERE order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;
        Ok(lines)
    }

    /// Aplica o novo status e os campos que a transição define. Campos `None`
    /// preservam o valor atual.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_order_status<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        status: OrderStatus,
        courier_id: Option<Uuid>,
        estimated_delivery_time: Option<DateTime<Utc>>,
        actual_delivery_time: Option<DateTime<Utc>>,
        cancellation_reason: Option<&str>,
    ) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders SET
                status = $2,
                courier_id = COALESCE($3, courier_id),
                estimated_delivery_time = COALESCE($4, estimated_delivery_time),
                actual_delivery_time = COALESCE($5, actual_delivery_time),
                cancellation_reason = COALESCE($6, cancellation_reason),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(status)
        .bind(courier_id)
        .bind(estimated_delivery_time)
        .bind(actual_delivery_time)
        .bind(cancellation_reason)
        .fetch_one(executor)
        .await?;
        Ok(order)
    }

    // ---
    // Log de transições (append-only)
    // ---

    pub async fn insert_transition_log<'e, E>(
        &self,
        executor: E,
        log: &OrderStatusTransitionLog,
    ) -> Result<OrderStatusTransitionLog, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inserted = sqlx::query_as::<_, OrderStatusTransitionLog>(
            r#"
            INSERT INTO order_status_transition_logs (
                id, order_id, from_status, to_status, changed_by, changed_by_role,
                reason, notes, changed_at, is_rollback, rollback_from_log_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(log.id)
        .bind(log.order_id)
        .bind(log.from_status)
        .bind(log.to_status)
        .bind(log.changed_by)
        .bind(log.changed_by_role)
        .bind(&log.reason)
        .bind(&log.notes)
        .bind(log.changed_at)
        .bind(log.is_rollback)
        .bind(log.rollback_from_log_id)
        .fetch_one(executor)
        .await?;
        Ok(inserted)
    }

    pub async fn list_transition_logs<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
    ) -> Result<Vec<OrderStatusTransitionLog>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let logs = sqlx::query_as::<_, OrderStatusTransitionLog>(
            "SELECT * FROM order_status_transition_logs
             WHERE order_id = $1
             ORDER BY changed_at ASC",
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;
        Ok(logs)
    }

    /// Última transição ainda "em vigor": ignora entradas de rollback e
    /// entradas que já foram revertidas por um rollback.
    pub async fn find_last_applied_transition<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
    ) -> Result<Option<OrderStatusTransitionLog>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let log = sqlx::query_as::<_, OrderStatusTransitionLog>(
            r#"
            SELECT * FROM order_status_transition_logs
            WHERE order_id = $1
              AND is_rollback = FALSE
              AND id NOT IN (
                  SELECT rollback_from_log_id FROM order_status_transition_logs
                  WHERE order_id = $1 AND rollback_from_log_id IS NOT NULL
              )
            ORDER BY changed_at DESC
            LIMIT 1
            "#,
        )
        .bind(order_id)
        .fetch_optional(executor)
        .await?;
        Ok(log)
    }
}
