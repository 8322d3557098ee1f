//! HTTP boundary for the reservation core
//!
//! Routes:
//! - `POST /query` - signed quotes
//! - `POST /order` - reserve a signed solution
//! - `POST /pay` - pay for a pending reservation
//! - `GET /orders/{id}` - reservation view for its owner
//! - `GET /health`, `GET /metrics`

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod payment;

pub use config::Config;
pub use errors::{GatewayError, GatewayResult};

use actix_web::web;
use reservation_core::{IdentityVerifier, OrderService};
use std::sync::Arc;

/// Shared handler state
pub struct AppState {
    pub service: Arc<OrderService>,
    pub identity: Arc<dyn IdentityVerifier>,
}

/// Register routes and the JSON body error handler
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| GatewayError::BadRequest(err.to_string()).into());

    cfg.app_data(json_config)
        .route("/health", web::get().to(handlers::health_check))
        .route("/metrics", web::get().to(handlers::metrics))
        .route("/query", web::post().to(handlers::query))
        .route("/order", web::post().to(handlers::place_order))
        .route("/pay", web::post().to(handlers::pay))
        .route("/orders/{id}", web::get().to(handlers::get_order));
}
