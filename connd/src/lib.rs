pub mod assigner;
pub mod audit;
pub mod capabilities;
pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod netd;
pub mod registry;
pub mod rest;
pub mod uid_range;

pub use assigner::{PreferenceOrder, UidAssignment, UidRangeAssigner};
pub use capabilities::{Capability, NetworkCapabilities, Transport, VpnTransportInfo, VpnType};
pub use controller::AgentLifecycleController;
pub use error::{AllocationError, CapabilitiesError, ConnectError, DaemonError, DisconnectError};
pub use gate::VersionGate;
pub use netd::{LegacyUidRangeBinding, NetId, NetdGateway, NetdOp, NetworkConfig};
pub use uid_range::UidRange;
