// src/config.rs

use std::{env, sync::Arc, time::Duration};

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::db::{CatalogRepository, OrderRepository, StockRepository};
use crate::services::events::{EventPublisher, TracingEventPublisher};
use crate::services::order_service::OrderService;
use crate::services::order_status_transition::OrderStatusTransitionService;
use crate::services::order_status_validator::OrderStatusValidatorService;
use crate::services::stock_service::StockService;

// Estado compartilhado da aplicação. Repositórios e serviços são injetados
// explicitamente pelos construtores: nenhum acesso global ao banco.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub order_service: OrderService,
    pub stock_service: StockService,
    pub transition_service: OrderStatusTransitionService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET deve ser definido");

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        let events: Arc<dyn EventPublisher> = Arc::new(TracingEventPublisher);

        let catalog_repo = CatalogRepository::new(db_pool.clone());
        let order_repo = OrderRepository::new(db_pool.clone());
        let stock_repo = StockRepository::new(db_pool.clone());

        let stock_service = StockService::new(
            catalog_repo.clone(),
            order_repo.clone(),
            stock_repo,
            events.clone(),
        );
        let validator = OrderStatusValidatorService::new();
        let order_service = OrderService::new(
            catalog_repo.clone(),
            order_repo.clone(),
            stock_service.clone(),
            events.clone(),
        );
        let transition_service = OrderStatusTransitionService::new(
            order_repo,
            catalog_repo,
            stock_service.clone(),
            validator,
            events,
        );

        Ok(Self {
            db_pool,
            jwt_secret,
            order_service,
            stock_service,
            transition_service,
        })
    }
}
