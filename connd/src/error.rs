//! Error types for network agent lifecycle operations.

use thiserror::Error;

use crate::netd::{NetId, NetdOp};

/// A call into the data-plane daemon failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("netd {op} failed for netId {net_id}: {message}")]
pub struct DaemonError {
    pub op: NetdOp,
    pub net_id: NetId,
    pub message: String,
}

impl DaemonError {
    pub fn new(op: NetdOp, net_id: NetId, message: impl Into<String>) -> Self {
        Self {
            op,
            net_id,
            message: message.into(),
        }
    }
}

/// No network could be brought into existence for a connect attempt.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("no free netId in range {min}..={max}")]
    Exhausted { min: u32, max: u32 },

    #[error("daemon refused to create network: {0}")]
    CreateRejected(#[source] DaemonError),
}

/// Malformed capability set, rejected before any daemon call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilitiesError {
    #[error("UID range start {start} is greater than stop {stop}")]
    InvertedRange { start: u32, stop: u32 },

    #[error("malformed UID range: {0}")]
    MalformedRange(String),

    #[error("UID scope is present but empty")]
    EmptyUidScope,

    #[error("UID ranges {0} and {1} overlap")]
    OverlappingRanges(String, String),

    #[error("VPN transport requires a UID scope")]
    VpnWithoutUidScope,

    #[error("VPN transport info present on a non-VPN network")]
    UnexpectedVpnInfo,

    #[error("VPN network is missing its transport info")]
    MissingVpnInfo,

    #[error("NOT_VPN capability must be absent exactly when transport is VPN")]
    NotVpnMismatch,

    #[error("routing preference {0} is reserved for VPN networks")]
    ReservedPreference(u32),

    #[error("routing preference requested without a UID scope")]
    PreferenceWithoutUidScope,
}

/// Failure of a connect request.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    #[error("invalid capabilities: {0}")]
    InvalidCapabilities(#[from] CapabilitiesError),

    #[error("{0}")]
    Daemon(#[from] DaemonError),
}

impl ConnectError {
    /// netId the failure relates to, if one had been allocated.
    pub fn net_id(&self) -> Option<NetId> {
        match self {
            ConnectError::Allocation(AllocationError::CreateRejected(e)) => Some(e.net_id),
            ConnectError::Daemon(e) => Some(e.net_id),
            _ => None,
        }
    }
}

/// Failure of a disconnect request.
///
/// A `Daemon` failure still removes the registry entry; the error reports
/// daemon-side state that may have leaked.
#[derive(Debug, Error)]
pub enum DisconnectError {
    #[error("network {0} not found")]
    NotFound(NetId),

    #[error("teardown incomplete: {0}")]
    Daemon(#[from] DaemonError),
}

/// Invalid controller configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("minimum netId must be at least 1")]
    ZeroNetId,

    #[error("netId range is empty: min {min} > max {max}")]
    EmptyNetIdRange { min: u32, max: u32 },
}
