// SPDX-License-Identifier: GPL-3.0-only

/// Whether the host may read the device location.
pub trait PermissionSource: Send + Sync {
    fn has_fine_or_coarse_location(&self) -> bool;
}

/// A fixed answer, taken from configuration or the command line.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub bool);

impl PermissionSource for StaticPermission {
    fn has_fine_or_coarse_location(&self) -> bool {
        self.0
    }
}
