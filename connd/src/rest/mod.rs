//! REST API for network agent connect/disconnect.

mod handlers;
mod routes;

pub use handlers::{ApiError, AppState, ConnectResponse, NetworkList, VersionInfo};
pub use routes::create_router;
