//! UID range assignment and routing priority.
//!
//! Decides which UID ranges a new network binds in the daemon and at which
//! sub-priority. Lower priority values win when ranges of several networks
//! overlap; 0 is reserved for VPNs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::NetworkCapabilities;
use crate::error::CapabilitiesError;
use crate::uid_range::UidRange;

/// Routing sub-priority of a UID binding. Lower wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceOrder(pub u32);

impl PreferenceOrder {
    /// Reserved for VPN bindings.
    pub const VPN: PreferenceOrder = PreferenceOrder(0);
    pub const OEM: PreferenceOrder = PreferenceOrder(10);
    pub const PROFILE: PreferenceOrder = PreferenceOrder(20);
    pub const MOBILE_DATA_PREFERRED: PreferenceOrder = PreferenceOrder(30);
    pub const DEFAULT: PreferenceOrder = PreferenceOrder(1000);

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PreferenceOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of UID range assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidAssignment {
    pub ranges: Vec<UidRange>,
    pub priority: PreferenceOrder,
}

impl UidAssignment {
    fn none() -> Self {
        Self {
            ranges: Vec::new(),
            priority: PreferenceOrder::DEFAULT,
        }
    }

    /// Whether a bind call must be issued.
    pub fn needs_binding(&self) -> bool {
        !self.ranges.is_empty()
    }
}

/// Stateless UID range assigner.
#[derive(Debug, Clone, Copy, Default)]
pub struct UidRangeAssigner;

impl UidRangeAssigner {
    /// Compute the UID ranges to bind and their priority.
    ///
    /// - VPN: the UID scope is bound verbatim at priority 0.
    /// - Non-VPN without an explicit routing preference: nothing is bound. A
    ///   UID scope alone only restricts who may use the network.
    /// - Non-VPN with a preference: the scope is bound at that preference,
    ///   which must be greater than 0.
    pub fn assign(caps: &NetworkCapabilities) -> Result<UidAssignment, CapabilitiesError> {
        caps.validate()?;

        if caps.is_vpn() {
            return Ok(UidAssignment {
                ranges: caps.uid_scope().to_vec(),
                priority: PreferenceOrder::VPN,
            });
        }

        let Some(preference) = caps.preference else {
            return Ok(UidAssignment::none());
        };
        if preference == PreferenceOrder::VPN {
            return Err(CapabilitiesError::ReservedPreference(preference.value()));
        }
        if caps.uids.is_none() {
            return Err(CapabilitiesError::PreferenceWithoutUidScope);
        }

        Ok(UidAssignment {
            ranges: caps.uid_scope().to_vec(),
            priority: preference,
        })
    }
}
