//! Capability descriptors supplied by network agents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::assigner::PreferenceOrder;
use crate::error::CapabilitiesError;
use crate::uid_range::UidRange;

/// Primary transport of a network. Each agent carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Cellular,
    Wifi,
    Bluetooth,
    Ethernet,
    Vpn,
    Test,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Cellular => "cellular",
            Transport::Wifi => "wifi",
            Transport::Bluetooth => "bluetooth",
            Transport::Ethernet => "ethernet",
            Transport::Vpn => "vpn",
            Transport::Test => "test",
        }
    }
}

/// Boolean capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Internet,
    NotVpn,
    NotRestricted,
    Trusted,
    NotMetered,
    NotRoaming,
    NotSuspended,
    NotCongested,
    Validated,
}

/// Capabilities every freshly requested network starts with.
pub const DEFAULT_CAPABILITIES: [Capability; 8] = [
    Capability::Internet,
    Capability::NotVpn,
    Capability::NotRestricted,
    Capability::Trusted,
    Capability::NotMetered,
    Capability::NotRoaming,
    Capability::NotSuspended,
    Capability::NotCongested,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VpnType {
    Service,
    Platform,
    Legacy,
    Oem,
}

/// VPN session descriptor, present only on VPN networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnTransportInfo {
    pub vpn_type: VpnType,
    pub session_id: String,
    pub bypassable: bool,
    /// Cost flag: long-lived TCP connections are expensive on this VPN.
    #[serde(default)]
    pub long_lived_tcp_connections_expensive: bool,
}

impl VpnTransportInfo {
    pub fn new(vpn_type: VpnType, session_id: impl Into<String>, bypassable: bool) -> Self {
        Self {
            vpn_type,
            session_id: session_id.into(),
            bypassable,
            long_lived_tcp_connections_expensive: false,
        }
    }
}

/// Capability set of a requested network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCapabilities {
    pub transport: Transport,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// UIDs this network is restricted to. `None` means unrestricted.
    #[serde(default)]
    pub uids: Option<Vec<UidRange>>,
    #[serde(default)]
    pub vpn: Option<VpnTransportInfo>,
    /// Explicit per-app routing preference for a non-VPN UID scope.
    #[serde(default)]
    pub preference: Option<PreferenceOrder>,
}

impl NetworkCapabilities {
    /// Default capability set on the given transport.
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            capabilities: DEFAULT_CAPABILITIES.into_iter().collect(),
            uids: None,
            vpn: None,
            preference: None,
        }
    }

    /// VPN capability set: defaults minus `NotVpn`, plus the session descriptor.
    pub fn vpn(info: VpnTransportInfo, uids: Vec<UidRange>) -> Self {
        Self::new(Transport::Vpn)
            .without_capability(Capability::NotVpn)
            .with_vpn_info(info)
            .with_uids(uids)
    }

    pub fn with_capability(mut self, cap: Capability) -> Self {
        self.capabilities.insert(cap);
        self
    }

    pub fn without_capability(mut self, cap: Capability) -> Self {
        self.capabilities.remove(&cap);
        self
    }

    pub fn with_uids(mut self, uids: Vec<UidRange>) -> Self {
        self.uids = Some(uids);
        self
    }

    pub fn with_vpn_info(mut self, info: VpnTransportInfo) -> Self {
        self.vpn = Some(info);
        self
    }

    pub fn with_preference(mut self, preference: PreferenceOrder) -> Self {
        self.preference = Some(preference);
        self
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    pub fn is_vpn(&self) -> bool {
        self.transport == Transport::Vpn
    }

    /// UID scope, or an empty slice when unrestricted.
    pub fn uid_scope(&self) -> &[UidRange] {
        self.uids.as_deref().unwrap_or(&[])
    }

    /// Check structural invariants.
    ///
    /// VPN info present <=> transport is VPN <=> `NotVpn` absent. A UID scope,
    /// when given, must be non-empty and free of overlaps.
    pub fn validate(&self) -> Result<(), CapabilitiesError> {
        let vpn = self.is_vpn();

        if vpn == self.has_capability(Capability::NotVpn) {
            return Err(CapabilitiesError::NotVpnMismatch);
        }
        match (vpn, self.vpn.is_some()) {
            (true, false) => return Err(CapabilitiesError::MissingVpnInfo),
            (false, true) => return Err(CapabilitiesError::UnexpectedVpnInfo),
            _ => {}
        }

        if let Some(uids) = &self.uids {
            if uids.is_empty() {
                return Err(CapabilitiesError::EmptyUidScope);
            }
            let mut sorted = uids.clone();
            sorted.sort();
            for pair in sorted.windows(2) {
                if pair[0].overlaps(&pair[1]) {
                    return Err(CapabilitiesError::OverlappingRanges(
                        pair[0].to_string(),
                        pair[1].to_string(),
                    ));
                }
            }
        } else if vpn {
            return Err(CapabilitiesError::VpnWithoutUidScope);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> VpnTransportInfo {
        VpnTransportInfo::new(VpnType::Service, "MySession12345", true)
    }

    #[test]
    fn test_default_capabilities() {
        let nc = NetworkCapabilities::new(Transport::Wifi);
        assert!(nc.has_capability(Capability::NotVpn));
        assert!(nc.has_capability(Capability::Internet));
        assert!(!nc.has_capability(Capability::Validated));
        assert!(nc.uid_scope().is_empty());
        assert!(nc.validate().is_ok());
    }

    #[test]
    fn test_vpn_constructor_is_valid() {
        let nc = NetworkCapabilities::vpn(session(), vec![UidRange::single(10050)]);
        assert!(nc.is_vpn());
        assert!(!nc.has_capability(Capability::NotVpn));
        assert!(nc.validate().is_ok());
    }

    #[test]
    fn test_vpn_keeping_not_vpn_rejected() {
        let nc = NetworkCapabilities::new(Transport::Vpn)
            .with_vpn_info(session())
            .with_uids(vec![UidRange::single(1)]);
        assert_eq!(nc.validate(), Err(CapabilitiesError::NotVpnMismatch));
    }

    #[test]
    fn test_wifi_without_not_vpn_rejected() {
        let nc = NetworkCapabilities::new(Transport::Wifi).without_capability(Capability::NotVpn);
        assert_eq!(nc.validate(), Err(CapabilitiesError::NotVpnMismatch));
    }

    #[test]
    fn test_vpn_info_must_match_transport() {
        let missing = NetworkCapabilities::new(Transport::Vpn)
            .without_capability(Capability::NotVpn)
            .with_uids(vec![UidRange::single(1)]);
        assert_eq!(missing.validate(), Err(CapabilitiesError::MissingVpnInfo));

        let unexpected = NetworkCapabilities::new(Transport::Wifi).with_vpn_info(session());
        assert_eq!(unexpected.validate(), Err(CapabilitiesError::UnexpectedVpnInfo));
    }

    #[test]
    fn test_vpn_requires_uid_scope() {
        let mut nc = NetworkCapabilities::vpn(session(), vec![]);
        assert_eq!(nc.validate(), Err(CapabilitiesError::EmptyUidScope));
        nc.uids = None;
        assert_eq!(nc.validate(), Err(CapabilitiesError::VpnWithoutUidScope));
    }

    #[test]
    fn test_overlapping_scope_rejected() {
        let nc = NetworkCapabilities::new(Transport::Wifi).with_uids(vec![
            UidRange::new(10000, 10100).unwrap(),
            UidRange::new(20000, 20000).unwrap(),
            UidRange::new(10100, 10200).unwrap(),
        ]);
        assert!(matches!(
            nc.validate(),
            Err(CapabilitiesError::OverlappingRanges(_, _))
        ));
    }

    #[test]
    fn test_deserialize_request() {
        let nc: NetworkCapabilities = serde_json::from_str(
            r#"{
                "transport": "vpn",
                "capabilities": ["internet", "not_restricted"],
                "uids": [{"start": 10050, "stop": 10050}],
                "vpn": {"vpn_type": "service", "session_id": "s1", "bypassable": true}
            }"#,
        )
        .unwrap();
        assert!(nc.is_vpn());
        assert_eq!(nc.uid_scope(), &[UidRange::single(10050)]);
        assert!(!nc.vpn.as_ref().unwrap().long_lived_tcp_connections_expensive);
        assert!(nc.validate().is_ok());
    }
}
