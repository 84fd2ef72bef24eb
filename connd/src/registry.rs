//! Registry of live networks and netId allocation.
//!
//! Records are inserted once a network reaches `Connected` and removed
//! exactly once at the end of disconnect teardown. Each record sits behind
//! its own async mutex which the controller holds for a whole lifecycle
//! transition, so unrelated netIds proceed concurrently and readers never
//! observe a record mid-transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::assigner::PreferenceOrder;
use crate::capabilities::{NetworkCapabilities, Transport};
use crate::error::{AllocationError, ConfigError};
use crate::netd::NetId;
use crate::uid_range::UidRange;

/// Lowest netId handed out by default.
pub const MIN_NET_ID: u32 = 100;

/// Highest netId handed out by default. The top 1024 ids are reserved.
pub const MAX_NET_ID: u32 = 65535 - 0x0400;

/// Lifecycle state of a network agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Requested,
    Created,
    AllowlistSet,
    Bound,
    Connected,
    Disconnecting,
    TornDown,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Requested => "requested",
            AgentState::Created => "created",
            AgentState::AllowlistSet => "allowlist_set",
            AgentState::Bound => "bound",
            AgentState::Connected => "connected",
            AgentState::Disconnecting => "disconnecting",
            AgentState::TornDown => "torn_down",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controller-side record of one network.
#[derive(Debug, Clone)]
pub struct NetworkAgentRecord {
    pub net_id: NetId,
    pub capabilities: NetworkCapabilities,
    pub state: AgentState,
    /// UID ranges currently bound in the daemon. Empty if none.
    pub uid_ranges: Vec<UidRange>,
    pub priority: PreferenceOrder,
    pub connected_at: Option<DateTime<Utc>>,
}

impl NetworkAgentRecord {
    pub fn new(net_id: NetId, capabilities: NetworkCapabilities) -> Self {
        Self {
            net_id,
            capabilities,
            state: AgentState::Requested,
            uid_ranges: Vec::new(),
            priority: PreferenceOrder::DEFAULT,
            connected_at: None,
        }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            net_id: self.net_id,
            transport: self.capabilities.transport,
            state: self.state,
            uid_ranges: self.uid_ranges.clone(),
            priority: self.priority,
            vpn_session: self.capabilities.vpn.as_ref().map(|v| v.session_id.clone()),
            connected_at: self.connected_at,
        }
    }
}

/// Read model of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSnapshot {
    pub net_id: NetId,
    pub transport: Transport,
    pub state: AgentState,
    pub uid_ranges: Vec<UidRange>,
    pub priority: PreferenceOrder,
    pub vpn_session: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
}

/// Hands out netIds round-robin within a fixed window.
///
/// Allocation continues after the last issued id and wraps, so a retired id
/// is reissued only after the rest of the window has been cycled through,
/// and never while still reserved.
#[derive(Debug)]
pub struct NetIdAllocator {
    min: u32,
    max: u32,
    last: u32,
    in_use: BTreeSet<u32>,
}

impl NetIdAllocator {
    /// Window `min..=max`. netId 0 is never handed out.
    pub fn new(min: u32, max: u32) -> Result<Self, ConfigError> {
        if min == 0 {
            return Err(ConfigError::ZeroNetId);
        }
        if min > max {
            return Err(ConfigError::EmptyNetIdRange { min, max });
        }
        Ok(Self::window(min, max))
    }

    const fn window(min: u32, max: u32) -> Self {
        Self {
            min,
            max,
            last: max,
            in_use: BTreeSet::new(),
        }
    }

    pub fn allocate(&mut self) -> Result<NetId, AllocationError> {
        let span = u64::from(self.max - self.min) + 1;
        let mut candidate = self.last;

        for _ in 0..span {
            candidate = if candidate >= self.max {
                self.min
            } else {
                candidate + 1
            };
            if self.in_use.insert(candidate) {
                self.last = candidate;
                return Ok(NetId(candidate));
            }
        }

        Err(AllocationError::Exhausted {
            min: self.min,
            max: self.max,
        })
    }

    /// Return an id to the pool. Returns false if it was not reserved.
    pub fn release(&mut self, net_id: NetId) -> bool {
        self.in_use.remove(&net_id.0)
    }

    pub fn in_use(&self) -> usize {
        self.in_use.len()
    }
}

pub type RecordHandle = Arc<tokio::sync::Mutex<NetworkAgentRecord>>;

/// Live networks by netId.
pub struct NetworkRegistry {
    allocator: Mutex<NetIdAllocator>,
    records: RwLock<BTreeMap<NetId, RecordHandle>>,
}

impl NetworkRegistry {
    pub fn new(min_net_id: u32, max_net_id: u32) -> Result<Self, ConfigError> {
        NetIdAllocator::new(min_net_id, max_net_id).map(Self::with_allocator)
    }

    fn with_allocator(allocator: NetIdAllocator) -> Self {
        Self {
            allocator: Mutex::new(allocator),
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Reserve a fresh netId.
    pub fn allocate(&self) -> Result<NetId, AllocationError> {
        self.allocator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .allocate()
    }

    /// Retire a netId once nothing references it anymore.
    pub fn release(&self, net_id: NetId) -> bool {
        self.allocator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release(net_id)
    }

    /// Number of reserved netIds, including connects still in progress.
    pub fn reserved(&self) -> usize {
        self.allocator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_use()
    }

    /// Store a connected record. Returns false if the netId is already live.
    pub fn insert(&self, record: NetworkAgentRecord) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&record.net_id) {
            return false;
        }
        records.insert(record.net_id, Arc::new(tokio::sync::Mutex::new(record)));
        true
    }

    pub fn get(&self, net_id: NetId) -> Option<RecordHandle> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&net_id)
            .cloned()
    }

    pub fn remove(&self, net_id: NetId) -> Option<RecordHandle> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&net_id)
    }

    pub fn net_ids(&self) -> Vec<NetId> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of one live network. Waits for an in-flight transition.
    pub async fn snapshot_of(&self, net_id: NetId) -> Option<NetworkSnapshot> {
        let handle = self.get(net_id)?;
        let record = handle.lock().await;
        (record.state == AgentState::Connected).then(|| record.snapshot())
    }

    /// Snapshots of all live networks, ordered by netId.
    pub async fn snapshot(&self) -> Vec<NetworkSnapshot> {
        let handles: Vec<RecordHandle> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            let record = handle.lock().await;
            if record.state == AgentState::Connected {
                out.push(record.snapshot());
            }
        }
        out
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::with_allocator(NetIdAllocator::window(MIN_NET_ID, MAX_NET_ID))
    }
}
