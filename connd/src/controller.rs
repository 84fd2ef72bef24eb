//! AgentLifecycleController - connect/disconnect orchestration for network agents.
//!
//! Connect issues, for one netId and strictly in this order:
//! `create`, `set_allowlist` (only if the platform supports it),
//! `bind_uid_ranges` (only if there are ranges to bind). Disconnect reverses
//! it with `unbind_uid_ranges` (if ranges were bound) followed by `destroy`.
//!
//! Once `create` succeeded the sequence ends either in `Connected` or with the
//! network destroyed again. Callers that may drop the returned future (for
//! example an HTTP handler) must run it on its own task.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assigner::{UidAssignment, UidRangeAssigner};
use crate::audit::ConndAuditLogger;
use crate::capabilities::NetworkCapabilities;
use crate::config::ControllerConfig;
use crate::error::{AllocationError, ConfigError, ConnectError, DaemonError, DisconnectError};
use crate::gate::VersionGate;
use crate::netd::{NetId, NetdGateway, NetworkConfig};
use crate::registry::{AgentState, NetworkAgentRecord, NetworkRegistry, NetworkSnapshot};

/// Drives network agents through their lifecycle against a netd.
pub struct AgentLifecycleController<N: NetdGateway> {
    netd: Arc<N>,
    gate: VersionGate,
    registry: NetworkRegistry,
    audit: Arc<ConndAuditLogger>,
}

impl<N: NetdGateway> AgentLifecycleController<N> {
    pub fn new(
        netd: Arc<N>,
        config: ControllerConfig,
        audit: Arc<ConndAuditLogger>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            netd,
            gate: config.version_gate,
            registry: NetworkRegistry::new(config.net_id_min, config.net_id_max)?,
            audit,
        })
    }

    pub fn netd(&self) -> &Arc<N> {
        &self.netd
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    pub fn version_gate(&self) -> VersionGate {
        self.gate
    }

    /// Bring up a network for the given capabilities and return its netId.
    pub async fn connect(&self, caps: NetworkCapabilities) -> Result<NetId, ConnectError> {
        let assignment = UidRangeAssigner::assign(&caps).inspect_err(|e| {
            self.audit.connect_failed(None, &e.to_string());
        })?;

        let net_id = self.registry.allocate().inspect_err(|e| {
            warn!(error = %e, "netId allocation failed");
            self.audit.connect_failed(None, &e.to_string());
        })?;

        let mut record = NetworkAgentRecord::new(net_id, caps);
        debug!(%net_id, transport = record.capabilities.transport.as_str(), "Connecting network");

        if let Err(e) = self.bring_up(&mut record, assignment).await {
            self.audit.connect_failed(Some(net_id), &e.to_string());
            return Err(e);
        }

        let transport = record.capabilities.transport;
        let bound = record.uid_ranges.len();
        record.state = AgentState::Connected;
        record.connected_at = Some(Utc::now());
        let inserted = self.registry.insert(record);
        debug_assert!(inserted, "allocator handed out a live netId");

        info!(%net_id, transport = transport.as_str(), bound_ranges = bound, "Network connected");
        self.audit.network_connected(net_id, transport, bound);
        Ok(net_id)
    }

    /// Requested -> Created -> (AllowlistSet) -> Bound.
    async fn bring_up(
        &self,
        record: &mut NetworkAgentRecord,
        assignment: UidAssignment,
    ) -> Result<(), ConnectError> {
        let net_id = record.net_id;

        let config = NetworkConfig::for_capabilities(net_id, &record.capabilities);
        if let Err(e) = self.netd.create(&config).await {
            warn!(%net_id, error = %e, "Network create rejected");
            self.registry.release(net_id);
            return Err(AllocationError::CreateRejected(e).into());
        }
        record.state = AgentState::Created;

        if self.gate.allowlist_supported() {
            let uids = record.capabilities.uid_scope();
            if let Err(e) = self.netd.set_allowlist(net_id, uids).await {
                return Err(self.abort_connect(net_id, e).await);
            }
            record.state = AgentState::AllowlistSet;
        }

        if assignment.needs_binding() {
            let priority = assignment.priority.value();
            if let Err(e) = self
                .netd
                .bind_uid_ranges(net_id, &assignment.ranges, priority)
                .await
            {
                return Err(self.abort_connect(net_id, e).await);
            }
            debug!(%net_id, ranges = assignment.ranges.len(), priority, "UID ranges bound");
            record.uid_ranges = assignment.ranges;
            record.priority = assignment.priority;
        }
        record.state = AgentState::Bound;

        Ok(())
    }

    /// Destroy a network whose connect failed after `create`.
    async fn abort_connect(&self, net_id: NetId, cause: DaemonError) -> ConnectError {
        warn!(%net_id, error = %cause, "Connect failed, tearing network down");

        match self.netd.destroy(net_id).await {
            Ok(()) => {
                self.registry.release(net_id);
            }
            Err(e) => {
                // The daemon may still know this netId; keep it reserved.
                warn!(%net_id, error = %e, "Compensating destroy failed");
                self.audit.teardown_leaked(net_id, &e.to_string());
            }
        }

        ConnectError::Daemon(cause)
    }

    /// Tear down a connected network.
    ///
    /// Both teardown calls are attempted and the registry entry is removed
    /// even if the daemon reports errors; the first error is returned.
    pub async fn disconnect(&self, net_id: NetId) -> Result<(), DisconnectError> {
        let handle = self
            .registry
            .get(net_id)
            .ok_or(DisconnectError::NotFound(net_id))?;
        let mut record = handle.lock().await;

        // Lost a race with another disconnect of the same network.
        if record.state != AgentState::Connected {
            return Err(DisconnectError::NotFound(net_id));
        }
        record.state = AgentState::Disconnecting;
        debug!(%net_id, "Disconnecting network");

        let mut failure: Option<DaemonError> = None;

        if !record.uid_ranges.is_empty() {
            let priority = record.priority.value();
            if let Err(e) = self
                .netd
                .unbind_uid_ranges(net_id, &record.uid_ranges, priority)
                .await
            {
                warn!(%net_id, error = %e, "Failed to unbind UID ranges");
                failure = Some(e);
            }
        }

        let destroyed = match self.netd.destroy(net_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%net_id, error = %e, "Failed to destroy network");
                failure.get_or_insert(e);
                false
            }
        };

        record.uid_ranges.clear();
        record.state = AgentState::TornDown;
        self.registry.remove(net_id);
        if destroyed {
            self.registry.release(net_id);
        }
        drop(record);

        match failure {
            Some(e) => {
                self.audit.teardown_leaked(net_id, &e.to_string());
                Err(e.into())
            }
            None => {
                info!(%net_id, "Network disconnected");
                self.audit.network_disconnected(net_id);
                Ok(())
            }
        }
    }

    pub async fn get(&self, net_id: NetId) -> Option<NetworkSnapshot> {
        self.registry.snapshot_of(net_id).await
    }

    pub async fn snapshot(&self) -> Vec<NetworkSnapshot> {
        self.registry.snapshot().await
    }

    /// Disconnect every live network. Returns the networks whose teardown
    /// reported an error.
    pub async fn shutdown(&self) -> Vec<(NetId, DisconnectError)> {
        let mut failures = Vec::new();
        for net_id in self.registry.net_ids() {
            match self.disconnect(net_id).await {
                Ok(()) | Err(DisconnectError::NotFound(_)) => {}
                Err(e) => failures.push((net_id, e)),
            }
        }
        info!(failed = failures.len(), "All networks torn down");
        failures
    }
}
