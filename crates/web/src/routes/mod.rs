//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                  - Index page linking to the four areas
//! GET  /health            - Health check
//!
//! # Customers (table)
//! GET  /customers         - Customer listing
//! POST /customers         - Create customer (form), redirects to listing
//!
//! # Products (table + blob)
//! GET  /products          - Product listing
//! POST /products          - Create product (multipart with `image_file`), redirects to listing
//!
//! # Orders (queue)
//! GET  /orders            - Queue page
//! POST /orders/enqueue    - Enqueue message (form), redirects to queue page
//! POST /orders/dequeue    - Dequeue one message, renders queue page with it
//!
//! # Contracts (file share)
//! GET  /contracts         - Contract file listing
//! POST /contracts         - Upload contract (multipart with `file`), redirects to listing
//! ```
//!
//! Invalid submissions never reach storage: the handler logs the reason at
//! debug level and redirects back to the listing.

pub mod contracts;
pub mod customers;
pub mod home;
pub mod orders;
pub mod products;
mod upload;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the page routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::index))
        .route("/customers", get(customers::index).post(customers::create))
        .route("/products", get(products::index).post(products::create))
        .route("/orders", get(orders::index))
        .route("/orders/enqueue", post(orders::enqueue))
        .route("/orders/dequeue", post(orders::dequeue))
        .route("/contracts", get(contracts::index).post(contracts::create))
}

/// Build the complete application around `state`.
///
/// Callers add process-level layers (Sentry) on top.
pub fn app(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes();
    Router::new()
        .route("/health", get(home::health))
        .merge(routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
