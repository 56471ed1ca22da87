//! The HTTP surface: routing, shared state, error rendering.

mod crosschain;
pub mod dto;
mod error;
mod gas;
mod info;
mod limit;
mod market;

pub use error::ApiError;

use {
    aggregation::{LimitOrders, MetaAggregationService},
    axum::{
        Router,
        routing::{get, post},
    },
    gas_price::GasPriceService,
    model::{chain::Catalog, descriptor::ProvidersConfig},
    std::{net::SocketAddr, sync::Arc},
    tower_http::{cors::CorsLayer, trace::TraceLayer},
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MetaAggregationService>,
    pub limit_orders: Arc<LimitOrders>,
    pub gas: GasPriceService,
    pub chains: Arc<Catalog>,
    pub descriptors: Arc<ProvidersConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/market/{chain_id}/price", get(market::price))
        .route("/market/{chain_id}/price/all", get(market::all_prices))
        .route("/market/{chain_id}/quote", get(market::quote))
        .route("/crosschain/price", get(crosschain::price))
        .route("/crosschain/quote", get(crosschain::quote))
        .route("/gas/{chain_id}", get(gas::gas_prices))
        .route("/info", get(info::all))
        .route("/info/{chain_id}", get(info::by_chain))
        .route("/limit/{chain_id}/address/{trader}", get(limit::by_trader))
        .route("/limit/{chain_id}/events/{order_hash}", get(limit::by_hash))
        .route("/limit/{chain_id}", post(limit::submit))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving HTTP API");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await
}
