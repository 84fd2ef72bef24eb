//! Platform capability gate for the network allowlist call.

/// Whether the running platform's daemon supports `set_allowlist`.
///
/// Fixed for the lifetime of the process and injected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionGate {
    allowlist_supported: bool,
}

impl VersionGate {
    pub const fn new(allowlist_supported: bool) -> Self {
        Self {
            allowlist_supported,
        }
    }

    pub const fn allowlist_supported(&self) -> bool {
        self.allowlist_supported
    }
}
