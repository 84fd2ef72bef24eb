use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::capabilities::NetworkCapabilities;
use crate::controller::AgentLifecycleController;
use crate::error::{AllocationError, ConnectError, DisconnectError};
use crate::netd::{NetId, NetdGateway};
use crate::registry::NetworkSnapshot;

/// Shared application state
pub struct AppState<N: NetdGateway> {
    pub controller: Arc<AgentLifecycleController<N>>,
}

impl<N: NetdGateway> AppState<N> {
    pub fn new(controller: Arc<AgentLifecycleController<N>>) -> Self {
        Self { controller }
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: u32,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code {
            400 => StatusCode::BAD_REQUEST,
            404 => StatusCode::NOT_FOUND,
            502 => StatusCode::BAD_GATEWAY,
            503 => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<ConnectError> for ApiError {
    fn from(e: ConnectError) -> Self {
        let code = match &e {
            ConnectError::InvalidCapabilities(_) => 400,
            ConnectError::Allocation(AllocationError::Exhausted { .. }) => 503,
            ConnectError::Allocation(AllocationError::CreateRejected(_)) => 502,
            ConnectError::Daemon(_) => 502,
        };
        ApiError {
            error: e.to_string(),
            code,
        }
    }
}

impl From<DisconnectError> for ApiError {
    fn from(e: DisconnectError) -> Self {
        let code = match &e {
            DisconnectError::NotFound(_) => 404,
            DisconnectError::Daemon(_) => 502,
        };
        ApiError {
            error: e.to_string(),
            code,
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        error!(error = %e, "Lifecycle task failed");
        ApiError {
            error: "lifecycle task failed".to_string(),
            code: 500,
        }
    }
}

// === Version ===

/// Version information
#[derive(Serialize)]
pub struct VersionInfo {
    pub version: String,
}

/// Get service version
pub async fn get_version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// === Networks ===

/// Result of a connect request: the snapshot, carrying its own `net_id`.
#[derive(Serialize)]
#[serde(untagged)]
pub enum ConnectResponse {
    Connected(NetworkSnapshot),
    /// Disconnected again before it could be read back.
    Gone { net_id: NetId },
}

#[derive(Serialize)]
pub struct NetworkList {
    pub networks: Vec<NetworkSnapshot>,
}

/// Connect a network agent
///
/// The lifecycle runs on its own task so a dropped request cannot leave a
/// half-created network behind.
pub async fn create_network<N: NetdGateway + 'static>(
    State(state): State<Arc<AppState<N>>>,
    Json(caps): Json<NetworkCapabilities>,
) -> Result<(StatusCode, Json<ConnectResponse>), ApiError> {
    let controller = Arc::clone(&state.controller);
    let net_id = tokio::spawn(async move { controller.connect(caps).await }).await??;

    let response = match state.controller.get(net_id).await {
        Some(network) => ConnectResponse::Connected(network),
        None => ConnectResponse::Gone { net_id },
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List connected networks
pub async fn list_networks<N: NetdGateway + 'static>(
    State(state): State<Arc<AppState<N>>>,
) -> Json<NetworkList> {
    Json(NetworkList {
        networks: state.controller.snapshot().await,
    })
}

/// Get a connected network
pub async fn get_network<N: NetdGateway + 'static>(
    State(state): State<Arc<AppState<N>>>,
    Path(net_id): Path<u32>,
) -> Result<Json<NetworkSnapshot>, ApiError> {
    state
        .controller
        .get(NetId(net_id))
        .await
        .map(Json)
        .ok_or_else(|| ApiError {
            error: format!("network {} not found", net_id),
            code: 404,
        })
}

/// Disconnect a network
pub async fn delete_network<N: NetdGateway + 'static>(
    State(state): State<Arc<AppState<N>>>,
    Path(net_id): Path<u32>,
) -> Result<StatusCode, ApiError> {
    let controller = Arc::clone(&state.controller);
    tokio::spawn(async move { controller.disconnect(NetId(net_id)).await }).await??;
    Ok(StatusCode::NO_CONTENT)
}
