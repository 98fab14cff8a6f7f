//! Application router configuration.

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    AppState,
    budget::{
        create_budget_endpoint, delete_budget_endpoint, get_budget_endpoint,
        get_budgets_endpoint, reload_budgets_endpoint, update_budget_endpoint,
    },
    category::get_category_names_endpoint,
    endpoints,
    logging::logging_middleware,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint, update_transaction_endpoint,
    },
};

/// The origin to allow cross-origin requests from when the configured one is
/// not a valid header value.
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:4000";

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let transaction_routes = Router::new()
        .route(endpoints::TRANSACTIONS, get(get_transactions_endpoint))
        .route(endpoints::TRANSACTIONS, post(create_transaction_endpoint))
        .route(endpoints::TRANSACTION, get(get_transaction_endpoint))
        .route(endpoints::TRANSACTION, put(update_transaction_endpoint))
        .route(endpoints::TRANSACTION, delete(delete_transaction_endpoint))
        .route(
            endpoints::TRANSACTION_CATEGORIES,
            get(get_category_names_endpoint),
        );

    let budget_routes = Router::new()
        .route(endpoints::BUDGETS, get(get_budgets_endpoint))
        .route(endpoints::BUDGETS, post(create_budget_endpoint))
        .route(endpoints::BUDGET, get(get_budget_endpoint))
        .route(endpoints::BUDGET, put(update_budget_endpoint))
        .route(endpoints::BUDGET, delete(delete_budget_endpoint))
        .route(endpoints::BUDGETS_RELOAD, post(reload_budgets_endpoint))
        .route(
            endpoints::BUDGET_CATEGORIES,
            get(get_category_names_endpoint),
        );

    transaction_routes
        .merge(budget_routes)
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors_layer(&state.allowed_origin))
        .with_state(state)
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let origin = allowed_origin.parse::<HeaderValue>().unwrap_or_else(|_| {
        tracing::warn!(
            "'{allowed_origin}' is not a valid origin, falling back to {DEFAULT_ALLOWED_ORIGIN}"
        );
        HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN)
    });

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}
