//! Network agent audit logging
//!
//! Lifecycle milestones are emitted as `tracing` events on the `audit`
//! target, tagged with the related object ids, so a subscriber can route
//! them to a separate sink.

use std::sync::Arc;

use tracing::{info, warn};

use crate::capabilities::Transport;
use crate::netd::NetId;

/// Audit logger with domain-specific methods.
pub struct ConndAuditLogger {
    component: &'static str,
    enabled: bool,
}

impl ConndAuditLogger {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            enabled: true,
        }
    }

    /// Create a noop audit logger (for testing)
    pub fn new_noop() -> Self {
        Self {
            component: "noop",
            enabled: false,
        }
    }

    // === Network Events ===

    pub fn network_connected(&self, net_id: NetId, transport: Transport, bound_ranges: usize) {
        if self.enabled {
            info!(
                target: "audit",
                component = self.component,
                object_ids = %net_id,
                transport = transport.as_str(),
                bound_ranges,
                "Network connected"
            );
        }
    }

    pub fn network_disconnected(&self, net_id: NetId) {
        if self.enabled {
            info!(
                target: "audit",
                component = self.component,
                object_ids = %net_id,
                "Network disconnected"
            );
        }
    }

    pub fn connect_failed(&self, net_id: Option<NetId>, reason: &str) {
        if self.enabled {
            let ids = net_id.map(|id| id.to_string()).unwrap_or_default();
            warn!(
                target: "audit",
                component = self.component,
                object_ids = %ids,
                reason,
                "Network connect failed"
            );
        }
    }

    /// Daemon-side state may have outlived its registry entry.
    pub fn teardown_leaked(&self, net_id: NetId, reason: &str) {
        if self.enabled {
            warn!(
                target: "audit",
                component = self.component,
                object_ids = %net_id,
                reason,
                "Network teardown incomplete"
            );
        }
    }
}

/// Create a shared audit logger
pub fn create_audit_logger(component: &'static str) -> Arc<ConndAuditLogger> {
    Arc::new(ConndAuditLogger::new(component))
}
