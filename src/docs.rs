// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Orders ---
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::orders::change_order_status,
        handlers::orders::rollback_order_status,
        handlers::orders::get_order_status_history,
        handlers::orders::get_available_transitions,

        // --- Stock ---
        handlers::stock::update_stock_level,
        handlers::stock::bulk_update_stock_levels,
        handlers::stock::get_stock_history,
        handlers::stock::check_stock_levels,
        handlers::stock::get_stock_alerts,
        handlers::stock::resolve_stock_alert,
        handlers::stock::synchronize_stock,
    ),
    components(
        schemas(
            // --- Orders ---
            models::auth::UserRole,
            models::order::OrderStatus,
            models::order::OrderLineOption,
            models::order::OrderItemPayload,
            models::order::CreateOrderPayload,
            models::order::ChangeOrderStatusPayload,
            models::order::RollbackStatusPayload,
            models::order::OrderLineResponse,
            models::order::OrderResponse,
            models::order::OrderStatusTransitionLog,
            models::order::AvailableTransition,

            // --- Stock ---
            models::stock::StockChangeType,
            models::stock::StockAlertType,
            models::stock::StockHistory,
            models::stock::StockAlert,
            models::stock::StockSnapshot,
            models::stock::StockUpdateItem,

            // --- Payloads ---
            handlers::stock::BulkStockUpdatePayload,
        )
    ),
    tags(
        (name = "Orders", description = "Ciclo de vida de pedidos e transições de status"),
        (name = "Stock", description = "Gestão de estoque, histórico e alertas")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
