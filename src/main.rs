// src/main.rs

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() {
    // Inicializa o logger
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rotas de pedidos (criação, consulta e máquina de estados)
    let order_routes = Router::new()
        .route("/", post(handlers::orders::create_order))
        .route("/{order_id}", get(handlers::orders::get_order))
        .route(
            "/{order_id}/status",
            post(handlers::orders::change_order_status),
        )
        .route(
            "/{order_id}/rollback",
            post(handlers::orders::rollback_order_status),
        )
        .route(
            "/{order_id}/history",
            get(handlers::orders::get_order_status_history),
        )
        .route(
            "/{order_id}/transitions",
            get(handlers::orders::get_available_transitions),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Rotas de estoque (ajustes, histórico, alertas)
    let stock_routes = Router::new()
        .route("/", put(handlers::stock::update_stock_level))
        .route("/bulk", put(handlers::stock::bulk_update_stock_levels))
        .route(
            "/{product_id}/history",
            get(handlers::stock::get_stock_history),
        )
        .route(
            "/check/{merchant_id}",
            post(handlers::stock::check_stock_levels),
        )
        .route(
            "/alerts/{merchant_id}",
            get(handlers::stock::get_stock_alerts),
        )
        .route(
            "/alerts/{alert_id}/resolve",
            post(handlers::stock::resolve_stock_alert),
        )
        .route(
            "/sync/{merchant_id}",
            post(handlers::stock::synchronize_stock),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/orders", order_routes)
        .nest("/api/stock", stock_routes)
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
        )
        .with_state(app_state);

    // Inicia o servidor
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
