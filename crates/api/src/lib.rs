//! HTTP surface for the marketplace.
//!
//! Routes map one to one onto engine operations; caller identity comes from
//! headers set by the auth proxy in front of the service. List endpoints
//! read the projections after catching them up with the log.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod seed;
pub mod state;
pub mod sweeper;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, ConfigError, LogFormat};
pub use error::ApiError;
pub use extract::Identity;
pub use seed::{MarketSeed, SeedError};
pub use state::AppState;
pub use sweeper::{SweepReport, Sweeper};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/needs",
            post(routes::needs::create::<S>).get(routes::needs::list::<S>),
        )
        .route("/needs/{id}", get(routes::needs::get::<S>))
        .route("/needs/{id}/offers", post(routes::needs::submit_offer::<S>))
        .route("/needs/{id}/accept", post(routes::needs::accept::<S>))
        .route("/needs/{id}/cancel", post(routes::needs::cancel::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/accept", post(routes::orders::accept::<S>))
        .route(
            "/orders/{id}/processing",
            post(routes::orders::start_processing::<S>),
        )
        .route("/orders/{id}/complete", post(routes::orders::complete::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/wallet", get(routes::wallet::get::<S>))
        .route(
            "/wallet/transactions",
            get(routes::wallet::transactions::<S>),
        )
        .route("/wallet/deposits", post(routes::wallet::deposit::<S>))
        .route(
            "/sellers/me/presence",
            put(routes::sellers::set_presence::<S>),
        )
        .route("/sellers/me/account", get(routes::sellers::account::<S>))
        .route("/withdrawals", post(routes::withdrawals::request::<S>))
        .route("/withdrawals/{id}", get(routes::withdrawals::get::<S>))
        .route(
            "/admin/deposits/{user_id}/{transaction_id}/settle",
            post(routes::admin::settle_deposit::<S>),
        )
        .route("/admin/commissions", get(routes::admin::commissions::<S>))
        .route(
            "/admin/withdrawals/{id}/approve",
            post(routes::admin::approve_withdrawal::<S>),
        )
        .route(
            "/admin/withdrawals/{id}/reject",
            post(routes::admin::reject_withdrawal::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
