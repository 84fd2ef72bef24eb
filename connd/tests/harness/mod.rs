//! Shared fixtures for connd integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use connd::audit::ConndAuditLogger;
use connd::config::ControllerConfig;
use connd::netd::{MemoryNetd, NetdCall};
use connd::{
    AgentLifecycleController, NetId, NetdOp, NetworkCapabilities, Transport, UidRange,
    VersionGate, VpnTransportInfo, VpnType,
};

pub type Controller = AgentLifecycleController<MemoryNetd>;

/// UID of the requesting application in the fixtures.
pub const APP_UID: u32 = 10050;

pub fn controller(allowlist_supported: bool) -> Arc<Controller> {
    controller_with(ControllerConfig::new(VersionGate::new(allowlist_supported)))
}

pub fn controller_with(config: ControllerConfig) -> Arc<Controller> {
    controller_on(MemoryNetd::recording(), config)
}

/// Controller over the netd the daemon binary runs with.
pub fn daemon_controller(config: ControllerConfig) -> Arc<Controller> {
    controller_on(MemoryNetd::new(), config)
}

fn controller_on(netd: MemoryNetd, config: ControllerConfig) -> Arc<Controller> {
    Arc::new(
        AgentLifecycleController::new(
            Arc::new(netd),
            config,
            Arc::new(ConndAuditLogger::new_noop()),
        )
        .expect("valid config"),
    )
}

/// Bypassable VPN scoped to a single app.
pub fn vpn_agent(uid: u32) -> NetworkCapabilities {
    NetworkCapabilities::vpn(
        VpnTransportInfo::new(VpnType::Service, "MySession12345", true),
        vec![UidRange::single(uid)],
    )
}

pub fn uid_agent(transport: Transport, uid: u32) -> NetworkCapabilities {
    if transport == Transport::Vpn {
        vpn_agent(uid)
    } else {
        NetworkCapabilities::new(transport).with_uids(vec![UidRange::single(uid)])
    }
}

/// Assert that the ops issued for a netId are a prefix-preserving
/// subsequence of `create, set_allowlist?, bind_uid_ranges?` with no
/// duplicates and no reordering.
pub fn assert_connect_order(ops: &[NetdOp]) {
    let mandated = [NetdOp::Create, NetdOp::SetAllowlist, NetdOp::BindUidRanges];
    let mut cursor = 0;
    for op in ops {
        let pos = mandated[cursor..]
            .iter()
            .position(|m| m == op)
            .unwrap_or_else(|| panic!("{op} out of order in {ops:?}"));
        cursor += pos + 1;
    }
    assert_eq!(ops.first(), Some(&NetdOp::Create), "create must come first");
}

pub fn bind_calls(calls: &[NetdCall], net_id: NetId) -> Vec<(Vec<UidRange>, u32)> {
    calls
        .iter()
        .filter_map(|c| match c {
            NetdCall::BindUidRanges {
                net_id: id,
                ranges,
                priority,
            } if *id == net_id => Some((ranges.clone(), *priority)),
            _ => None,
        })
        .collect()
}
