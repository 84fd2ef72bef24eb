use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};
use crate::netd::NetdGateway;

pub fn create_router<N: NetdGateway + 'static>(state: Arc<AppState<N>>) -> Router {
    Router::new()
        .route("/v1/version", get(handlers::get_version))
        .route(
            "/v1/networks",
            post(handlers::create_network::<N>).get(handlers::list_networks::<N>),
        )
        .route(
            "/v1/networks/{net_id}",
            get(handlers::get_network::<N>).delete(handlers::delete_network::<N>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
