//! In-process daemon mirror.
//!
//! `MemoryNetd` keeps the state a real netd would keep (networks, allowlists,
//! UID bindings) and rejects the same misuse a real netd rejects. The daemon
//! binary runs against it in simulated mode with nothing retained beyond live
//! network state. Tests build it with [`MemoryNetd::recording`] to get a call
//! log in issue order.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::{LegacyUidRangeBinding, NetId, NetdGateway, NetdOp, NetworkConfig};
use crate::error::DaemonError;
use crate::uid_range::UidRange;

/// One recorded daemon call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetdCall {
    Create(NetworkConfig),
    SetAllowlist {
        net_id: NetId,
        uids: Vec<UidRange>,
    },
    BindUidRanges {
        net_id: NetId,
        ranges: Vec<UidRange>,
        priority: u32,
    },
    UnbindUidRanges {
        net_id: NetId,
        ranges: Vec<UidRange>,
        priority: u32,
    },
    Destroy(NetId),
    BindUidRangesLegacy {
        net_id: NetId,
        ranges: Vec<UidRange>,
    },
}

impl NetdCall {
    pub fn op(&self) -> NetdOp {
        match self {
            NetdCall::Create(_) => NetdOp::Create,
            NetdCall::SetAllowlist { .. } => NetdOp::SetAllowlist,
            NetdCall::BindUidRanges { .. } => NetdOp::BindUidRanges,
            NetdCall::UnbindUidRanges { .. } => NetdOp::UnbindUidRanges,
            NetdCall::Destroy(_) => NetdOp::Destroy,
            NetdCall::BindUidRangesLegacy { .. } => NetdOp::BindUidRangesLegacy,
        }
    }

    pub fn net_id(&self) -> NetId {
        match self {
            NetdCall::Create(config) => config.net_id,
            NetdCall::SetAllowlist { net_id, .. }
            | NetdCall::BindUidRanges { net_id, .. }
            | NetdCall::UnbindUidRanges { net_id, .. }
            | NetdCall::BindUidRangesLegacy { net_id, .. } => *net_id,
            NetdCall::Destroy(net_id) => *net_id,
        }
    }
}

/// A UID binding held by a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidBinding {
    pub ranges: Vec<UidRange>,
    pub priority: u32,
}

#[derive(Debug)]
struct MemoryNetwork {
    config: NetworkConfig,
    allowlist: Option<Vec<UidRange>>,
    bindings: Vec<UidBinding>,
}

#[derive(Debug)]
struct InjectedFailure {
    op: NetdOp,
    net_id: Option<NetId>,
    message: String,
}

#[derive(Debug, Default)]
struct Inner {
    networks: BTreeMap<NetId, MemoryNetwork>,
    record: bool,
    calls: Vec<NetdCall>,
    failures: Vec<InjectedFailure>,
}

impl Inner {
    /// Log the call if recording, then fail it if an injected failure matches.
    fn issue(&mut self, call: NetdCall) -> Result<(), DaemonError> {
        let op = call.op();
        let net_id = call.net_id();
        debug!(%net_id, op = %op, "netd call");
        if self.record {
            self.calls.push(call);
        }

        let hit = self
            .failures
            .iter()
            .position(|f| f.op == op && f.net_id.is_none_or(|id| id == net_id));
        match hit {
            Some(idx) => {
                let failure = self.failures.remove(idx);
                Err(DaemonError::new(op, net_id, failure.message))
            }
            None => Ok(()),
        }
    }

    fn network_mut(&mut self, op: NetdOp, net_id: NetId) -> Result<&mut MemoryNetwork, DaemonError> {
        self.networks
            .get_mut(&net_id)
            .ok_or_else(|| DaemonError::new(op, net_id, "no such network"))
    }
}

/// Simulated netd with an optional call log and one-shot failure injection.
#[derive(Debug, Default)]
pub struct MemoryNetd {
    inner: Mutex<Inner>,
}

impl MemoryNetd {
    /// Simulator without a call log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulator that logs every call in issue order.
    pub fn recording() -> Self {
        Self {
            inner: Mutex::new(Inner {
                record: true,
                ..Inner::default()
            }),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.lock().record
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next matching call fail. `net_id = None` matches any network.
    pub fn inject_failure(&self, op: NetdOp, net_id: Option<NetId>, message: impl Into<String>) {
        self.lock().failures.push(InjectedFailure {
            op,
            net_id,
            message: message.into(),
        });
    }

    /// Every call issued so far, in order. Always empty unless recording.
    pub fn calls(&self) -> Vec<NetdCall> {
        self.lock().calls.clone()
    }

    pub fn calls_for(&self, net_id: NetId) -> Vec<NetdCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.net_id() == net_id)
            .cloned()
            .collect()
    }

    /// Operation sequence issued for one network.
    pub fn ops_for(&self, net_id: NetId) -> Vec<NetdOp> {
        self.calls_for(net_id).iter().map(NetdCall::op).collect()
    }

    /// Number of times an operation was issued across all networks.
    pub fn count(&self, op: NetdOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn network_exists(&self, net_id: NetId) -> bool {
        self.lock().networks.contains_key(&net_id)
    }

    pub fn network_ids(&self) -> Vec<NetId> {
        self.lock().networks.keys().copied().collect()
    }

    pub fn network_config(&self, net_id: NetId) -> Option<NetworkConfig> {
        self.lock().networks.get(&net_id).map(|n| n.config.clone())
    }

    /// `None` if the network has no allowlist or does not exist.
    pub fn allowlist(&self, net_id: NetId) -> Option<Vec<UidRange>> {
        self.lock()
            .networks
            .get(&net_id)
            .and_then(|n| n.allowlist.clone())
    }

    pub fn bindings(&self, net_id: NetId) -> Vec<UidBinding> {
        self.lock()
            .networks
            .get(&net_id)
            .map(|n| n.bindings.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NetdGateway for MemoryNetd {
    async fn create(&self, config: &NetworkConfig) -> Result<(), DaemonError> {
        let mut inner = self.lock();
        inner.issue(NetdCall::Create(config.clone()))?;

        if inner.networks.contains_key(&config.net_id) {
            return Err(DaemonError::new(
                NetdOp::Create,
                config.net_id,
                "network already exists",
            ));
        }
        inner.networks.insert(
            config.net_id,
            MemoryNetwork {
                config: config.clone(),
                allowlist: None,
                bindings: Vec::new(),
            },
        );
        Ok(())
    }

    async fn set_allowlist(&self, net_id: NetId, uids: &[UidRange]) -> Result<(), DaemonError> {
        let mut inner = self.lock();
        inner.issue(NetdCall::SetAllowlist {
            net_id,
            uids: uids.to_vec(),
        })?;

        let network = inner.network_mut(NetdOp::SetAllowlist, net_id)?;
        network.allowlist = Some(uids.to_vec());
        Ok(())
    }

    async fn bind_uid_ranges(
        &self,
        net_id: NetId,
        ranges: &[UidRange],
        priority: u32,
    ) -> Result<(), DaemonError> {
        let mut inner = self.lock();
        inner.issue(NetdCall::BindUidRanges {
            net_id,
            ranges: ranges.to_vec(),
            priority,
        })?;

        let network = inner.network_mut(NetdOp::BindUidRanges, net_id)?;
        if !ranges.is_empty() {
            network.bindings.push(UidBinding {
                ranges: ranges.to_vec(),
                priority,
            });
        }
        Ok(())
    }

    async fn unbind_uid_ranges(
        &self,
        net_id: NetId,
        ranges: &[UidRange],
        priority: u32,
    ) -> Result<(), DaemonError> {
        let mut inner = self.lock();
        inner.issue(NetdCall::UnbindUidRanges {
            net_id,
            ranges: ranges.to_vec(),
            priority,
        })?;

        let network = inner.network_mut(NetdOp::UnbindUidRanges, net_id)?;
        let idx = network
            .bindings
            .iter()
            .position(|b| b.priority == priority && b.ranges == ranges)
            .ok_or_else(|| DaemonError::new(NetdOp::UnbindUidRanges, net_id, "no such binding"))?;
        network.bindings.remove(idx);
        Ok(())
    }

    async fn destroy(&self, net_id: NetId) -> Result<(), DaemonError> {
        let mut inner = self.lock();
        inner.issue(NetdCall::Destroy(net_id))?;

        inner
            .networks
            .remove(&net_id)
            .map(|_| ())
            .ok_or_else(|| DaemonError::new(NetdOp::Destroy, net_id, "no such network"))
    }
}

#[async_trait]
impl LegacyUidRangeBinding for MemoryNetd {
    async fn bind_uid_ranges_legacy(
        &self,
        net_id: NetId,
        ranges: &[UidRange],
    ) -> Result<(), DaemonError> {
        let mut inner = self.lock();
        inner.issue(NetdCall::BindUidRangesLegacy {
            net_id,
            ranges: ranges.to_vec(),
        })?;

        // Legacy bindings carry no sub-priority; netd files them at the VPN level.
        let network = inner.network_mut(NetdOp::BindUidRangesLegacy, net_id)?;
        network.bindings.push(UidBinding {
            ranges: ranges.to_vec(),
            priority: 0,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netd::NetworkKind;

    fn physical(id: u32) -> NetworkConfig {
        NetworkConfig {
            net_id: NetId(id),
            kind: NetworkKind::Physical,
            secure: false,
            vpn_type: None,
            exclude_local_routes: false,
        }
    }

    #[tokio::test]
    async fn test_create_twice_rejected() {
        let netd = MemoryNetd::recording();
        netd.create(&physical(100)).await.unwrap();
        let err = netd.create(&physical(100)).await.unwrap_err();
        assert_eq!(err.op, NetdOp::Create);
        assert_eq!(netd.count(NetdOp::Create), 2);
    }

    #[tokio::test]
    async fn test_calls_on_missing_network_fail() {
        let netd = MemoryNetd::recording();
        assert!(netd.set_allowlist(NetId(5), &[]).await.is_err());
        assert!(netd.destroy(NetId(5)).await.is_err());
        assert_eq!(netd.ops_for(NetId(5)), vec![NetdOp::SetAllowlist, NetdOp::Destroy]);
    }

    #[tokio::test]
    async fn test_bind_and_unbind() {
        let netd = MemoryNetd::recording();
        let ranges = vec![UidRange::single(10050)];
        netd.create(&physical(100)).await.unwrap();
        netd.bind_uid_ranges(NetId(100), &ranges, 20).await.unwrap();
        assert_eq!(
            netd.bindings(NetId(100)),
            vec![UidBinding {
                ranges: ranges.clone(),
                priority: 20
            }]
        );

        // Priority is part of the binding identity.
        assert!(netd.unbind_uid_ranges(NetId(100), &ranges, 0).await.is_err());
        netd.unbind_uid_ranges(NetId(100), &ranges, 20).await.unwrap();
        assert!(netd.bindings(NetId(100)).is_empty());
    }

    #[tokio::test]
    async fn test_empty_bind_is_noop() {
        let netd = MemoryNetd::recording();
        netd.create(&physical(100)).await.unwrap();
        netd.bind_uid_ranges(NetId(100), &[], 0).await.unwrap();
        assert!(netd.bindings(NetId(100)).is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot_and_scoped() {
        let netd = MemoryNetd::recording();
        netd.inject_failure(NetdOp::Create, Some(NetId(101)), "ENOSPC");

        netd.create(&physical(100)).await.unwrap();
        let err = netd.create(&physical(101)).await.unwrap_err();
        assert_eq!(err.message, "ENOSPC");
        assert!(!netd.network_exists(NetId(101)));

        netd.create(&physical(101)).await.unwrap();
        assert!(netd.network_exists(NetId(101)));
    }

    #[tokio::test]
    async fn test_legacy_binding_recorded() {
        let netd = MemoryNetd::recording();
        netd.create(&physical(100)).await.unwrap();
        netd.bind_uid_ranges_legacy(NetId(100), &[UidRange::single(1)])
            .await
            .unwrap();
        assert_eq!(netd.count(NetdOp::BindUidRangesLegacy), 1);
        assert_eq!(netd.bindings(NetId(100))[0].priority, 0);
    }

    #[tokio::test]
    async fn test_destroy_drops_state() {
        let netd = MemoryNetd::recording();
        netd.create(&physical(100)).await.unwrap();
        netd.set_allowlist(NetId(100), &[UidRange::single(7)]).await.unwrap();
        assert_eq!(netd.allowlist(NetId(100)), Some(vec![UidRange::single(7)]));

        netd.destroy(NetId(100)).await.unwrap();
        assert!(!netd.network_exists(NetId(100)));
        assert_eq!(netd.allowlist(NetId(100)), None);
        assert!(netd.network_ids().is_empty());
    }

    #[tokio::test]
    async fn test_default_keeps_no_call_log() {
        let netd = MemoryNetd::new();
        assert!(!netd.is_recording());
        for _ in 0..50 {
            netd.create(&physical(100)).await.unwrap();
            netd.bind_uid_ranges(NetId(100), &[UidRange::single(1)], 20)
                .await
                .unwrap();
            netd.unbind_uid_ranges(NetId(100), &[UidRange::single(1)], 20)
                .await
                .unwrap();
            netd.destroy(NetId(100)).await.unwrap();
        }
        assert!(netd.calls().is_empty());
        assert!(netd.network_ids().is_empty());

        // Injected failures still fire without a log.
        netd.inject_failure(NetdOp::Create, None, "EIO");
        assert!(netd.create(&physical(100)).await.is_err());
        assert!(netd.calls().is_empty());
    }
}
