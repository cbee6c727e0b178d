//! Route definitions for the Distribution Ledger

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - orders and fulfillment
        .nest("/orders", order_routes(state.clone()))
        // Protected routes - inventory ledger
        .nest("/inventory", inventory_routes(state.clone()))
        // Protected routes - catalog
        .nest("/products", product_routes(state.clone()))
        // Protected routes - parties
        .nest("/parties", party_routes(state))
}

/// Order routes (protected)
fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_orders).post(handlers::create_order),
        )
        .route("/:order_id", get(handlers::get_order))
        .route("/:order_id/processing", post(handlers::mark_processing))
        .route("/:order_id/fulfill", post(handlers::fulfill_order))
        .route("/:order_id/receive", post(handlers::receive_order))
        .route("/:order_id/cancel", post(handlers::cancel_order))
        .route(
            "/:order_id/payments",
            get(handlers::list_payments).post(handlers::record_payment),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Inventory ledger routes (protected)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/restock", post(handlers::restock))
        .route("/adjust", post(handlers::adjust))
        .route("/reorder-level", put(handlers::set_reorder_level))
        .route("/transactions", get(handlers::list_transactions))
        .route("/:tier/:owner_id", get(handlers::get_stock))
        .route("/:tier/:owner_id/low-stock", get(handlers::get_low_stock))
        .route("/:tier/:owner_id/reconcile", get(handlers::reconcile))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Catalog routes (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route("/:product_id", put(handlers::update_product))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Party registry routes (protected)
fn party_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_parties).post(handlers::create_party),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
