//! Call surface of the out-of-process data-plane daemon (netd).
//!
//! The daemon owns the authoritative data-plane state; this side holds no
//! model of it beyond call outcomes. Every call can fail and failures are
//! always returned to the caller.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{NetworkCapabilities, VpnType};
use crate::error::DaemonError;
use crate::uid_range::UidRange;

pub use memory::{MemoryNetd, NetdCall};

/// Process-unique identifier of one live network in the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetId(pub u32);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Daemon operations, used for error reporting and call recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetdOp {
    Create,
    SetAllowlist,
    BindUidRanges,
    UnbindUidRanges,
    Destroy,
    BindUidRangesLegacy,
}

impl NetdOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetdOp::Create => "networkCreate",
            NetdOp::SetAllowlist => "setNetworkAllowlist",
            NetdOp::BindUidRanges => "networkAddUidRangesParcel",
            NetdOp::UnbindUidRanges => "networkRemoveUidRangesParcel",
            NetdOp::Destroy => "networkDestroy",
            NetdOp::BindUidRangesLegacy => "networkAddUidRanges",
        }
    }
}

impl fmt::Display for NetdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    Physical,
    Virtual,
}

/// Payload of the daemon's network-create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub net_id: NetId,
    pub kind: NetworkKind,
    /// VPN only: traffic in scope cannot bypass the VPN.
    pub secure: bool,
    pub vpn_type: Option<VpnType>,
    pub exclude_local_routes: bool,
}

impl NetworkConfig {
    pub fn for_capabilities(net_id: NetId, caps: &NetworkCapabilities) -> Self {
        match &caps.vpn {
            Some(info) if caps.is_vpn() => Self {
                net_id,
                kind: NetworkKind::Virtual,
                secure: !info.bypassable,
                vpn_type: Some(info.vpn_type),
                exclude_local_routes: false,
            },
            _ => Self {
                net_id,
                kind: NetworkKind::Physical,
                secure: false,
                vpn_type: None,
                exclude_local_routes: false,
            },
        }
    }

    pub fn is_vpn(&self) -> bool {
        self.kind == NetworkKind::Virtual
    }
}

/// Current daemon API used by the lifecycle controller.
#[async_trait]
pub trait NetdGateway: Send + Sync {
    /// Create a network. Calling twice for a live netId is a caller bug.
    async fn create(&self, config: &NetworkConfig) -> Result<(), DaemonError>;

    /// Restrict which UIDs may use the network. An empty slice means
    /// unrestricted. Only valid on platforms that support allowlists.
    async fn set_allowlist(&self, net_id: NetId, uids: &[UidRange]) -> Result<(), DaemonError>;

    /// Bind UID ranges to the network with a routing sub-priority.
    async fn bind_uid_ranges(
        &self,
        net_id: NetId,
        ranges: &[UidRange],
        priority: u32,
    ) -> Result<(), DaemonError>;

    /// Remove a binding previously made with `bind_uid_ranges`.
    async fn unbind_uid_ranges(
        &self,
        net_id: NetId,
        ranges: &[UidRange],
        priority: u32,
    ) -> Result<(), DaemonError>;

    /// Destroy the network and everything the daemon attached to it.
    async fn destroy(&self, net_id: NetId) -> Result<(), DaemonError>;
}

/// Pre-priority UID binding call.
///
/// Kept for source compatibility with older daemon clients. The lifecycle
/// controller is generic over [`NetdGateway`] only and cannot reach it.
#[async_trait]
pub trait LegacyUidRangeBinding: Send + Sync {
    async fn bind_uid_ranges_legacy(
        &self,
        net_id: NetId,
        ranges: &[UidRange],
    ) -> Result<(), DaemonError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Transport, VpnTransportInfo};

    #[test]
    fn test_config_for_bypassable_vpn() {
        let caps = NetworkCapabilities::vpn(
            VpnTransportInfo::new(VpnType::Service, "s", true),
            vec![UidRange::single(10050)],
        );
        let config = NetworkConfig::for_capabilities(NetId(100), &caps);
        assert!(config.is_vpn());
        assert!(!config.secure);
        assert_eq!(config.vpn_type, Some(VpnType::Service));
    }

    #[test]
    fn test_config_for_locked_down_vpn() {
        let caps = NetworkCapabilities::vpn(
            VpnTransportInfo::new(VpnType::Platform, "s", false),
            vec![UidRange::single(10050)],
        );
        let config = NetworkConfig::for_capabilities(NetId(100), &caps);
        assert!(config.secure);
    }

    #[test]
    fn test_config_for_wifi() {
        let caps = NetworkCapabilities::new(Transport::Wifi);
        let config = NetworkConfig::for_capabilities(NetId(101), &caps);
        assert_eq!(config.kind, NetworkKind::Physical);
        assert!(!config.is_vpn());
        assert_eq!(config.vpn_type, None);
    }
}
