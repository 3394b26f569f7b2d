//src/lib.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

/// Monta o Router completo. Tudo em `/api` passa pelo `auth_guard`, menos `/api/health`.
pub fn app(app_state: AppState) -> Router {
    let sales_routes = Router::new()
        .route("/sales", post(handlers::sales::create_sale))
        .route("/sales/import", post(handlers::sales::import_external_invoice))
        .route("/sales/{id}", get(handlers::sales::get_sale))
        .route("/sales/{id}/cancel", post(handlers::sales::cancel_sale))
        .route("/returns", post(handlers::sales::create_return))
        .route("/payments", post(handlers::sales::create_payment));

    let inventory_routes = Router::new()
        .route("/products", post(handlers::inventory::create_product))
        .route("/products/{id}", get(handlers::inventory::get_product))
        .route(
            "/products/{id}/stock-adjustments",
            post(handlers::inventory::adjust_stock),
        )
        .route("/warehouses", post(handlers::inventory::create_warehouse))
        .route("/stock-transfers", post(handlers::inventory::create_stock_transfer));

    let finance_routes = Router::new()
        .route("/accounts", post(handlers::finance::create_account))
        .route("/accounts/transfers", post(handlers::finance::transfer))
        .route("/accounts/{id}", get(handlers::finance::get_account))
        .route("/accounts/{id}/movements", post(handlers::finance::add_movement));

    let crm_routes = Router::new()
        .route("/customers", post(handlers::crm::create_customer))
        .route(
            "/customers/{id}",
            get(handlers::crm::get_customer)
                .put(handlers::crm::update_customer)
                .delete(handlers::crm::delete_customer),
        );

    let document_routes = Router::new()
        .route("/e-documents", post(handlers::documents::create_edocument))
        .route(
            "/e-documents/{id}/transition",
            post(handlers::documents::transition_edocument),
        );

    let platform_routes =
        Router::new().route("/platform/tenants", get(handlers::tenancy::list_tenants));

    let protected = Router::new()
        .merge(sales_routes)
        .merge(inventory_routes)
        .merge(finance_routes)
        .merge(crm_routes)
        .merge(document_routes)
        .merge(platform_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(handlers::tenancy::health))
        .nest("/api", protected)
        .with_state(app_state)
}
