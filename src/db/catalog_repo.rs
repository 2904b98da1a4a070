// src/db/catalog_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::catalog::{Merchant, Product, ProductVariant},
};

#[derive(Clone)]
pub struct CatalogRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Leitura
    // ---

    pub async fn find_merchant<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
    ) -> Result<Option<Merchant>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let merchant =
            sqlx::query_as::<_, Merchant>("SELECT * FROM merchants WHERE id = $1")
                .bind(merchant_id)
                .fetch_optional(executor)
                .await?;
        Ok(merchant)
    }

    pub async fn find_active_merchant<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
    ) -> Result<Option<Merchant>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let merchant = sqlx::query_as::<_, Merchant>(
            "SELECT * FROM merchants WHERE id = $1 AND is_active = TRUE",
        )
        .bind(merchant_id)
        .fetch_optional(executor)
        .await?;
        Ok(merchant)
    }

    pub async fn find_product<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(executor)
            .await?;
        Ok(product)
    }

    pub async fn list_active_products<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
    ) -> Result<Vec<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE merchant_id = $1 AND is_active = TRUE ORDER BY name ASC",
        )
        .bind(merchant_id)
        .fetch_all(executor)
        .await?;
        Ok(products)
    }

    // ---
    // Leitura com lock de linha
    // ---
    // Todo caminho que vai mutar `stock_quantity` passa por aqui primeiro:
    // o `FOR UPDATE` serializa leitores-escritores concorrentes da mesma
    // linha, e a quantidade é re-checada depois do lock.

    /// Carrega um produto ativo de um merchant, travando a linha.
    pub async fn find_merchant_product_for_update<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        merchant_id: Uuid,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products
             WHERE id = $1 AND merchant_id = $2 AND is_active = TRUE
             FOR UPDATE",
        )
        .bind(product_id)
        .bind(merchant_id)
        .fetch_optional(executor)
        .await?;
        Ok(product)
    }

    pub async fn find_product_for_update<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id)
                .fetch_optional(executor)
                .await?;
        Ok(product)
    }

    pub async fn find_variant_for_update<'e, E>(
        &self,
        executor: E,
        variant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<ProductVariant>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let variant = sqlx::query_as::<_, ProductVariant>(
            "SELECT * FROM product_variants WHERE id = $1 AND product_id = $2 FOR UPDATE",
        )
        .bind(variant_id)
        .bind(product_id)
        .fetch_optional(executor)
        .await?;
        Ok(variant)
    }

    // ---
    // Escrita de estoque
    // ---
    // Chamadas apenas pelo StockService, sempre dentro de uma transação que
    // também grava a entrada de histórico correspondente.

    pub async fn set_product_stock<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        stock_quantity: i32,
        is_available: bool,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE products
             SET stock_quantity = $2, is_available = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(product_id)
        .bind(stock_quantity)
        .bind(is_available)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn set_variant_stock<'e, E>(
        &self,
        executor: E,
        variant_id: Uuid,
        stock_quantity: i32,
        is_available: bool,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE product_variants
             SET stock_quantity = $2, is_available = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(variant_id)
        .bind(stock_quantity)
        .bind(is_available)
        .execute(executor)
        .await?;
        Ok(())
    }
}
