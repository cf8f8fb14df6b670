//! Probing: obtaining the device graph of the running system.
//!
//! The actual system inspection lives behind the [`Prober`] trait so the
//! library itself never touches the system. What the library owns is the
//! gating: a probed graph with logic-fatal consistency issues is rejected
//! before any algorithm runs on it.

use log::warn;

use crate::{
    devicegraph::{check::Severity, DeviceGraph},
    error::ProbeError,
    sid::SidAllocator,
};

/// Produces the device graph of the running system.
///
/// Implementations allocate sids through the passed allocator so probed
/// devices and later staged devices never collide.
pub trait Prober {
    fn probe(&mut self, allocator: &mut SidAllocator) -> anyhow::Result<DeviceGraph>;
}

/// Rejects graphs with error-severity issues and logs the rest.
pub(crate) fn verify_probed(graph: &DeviceGraph) -> Result<(), ProbeError> {
    for issue in graph.check() {
        match issue.severity() {
            Severity::Error => return Err(ProbeError::Inconsistent(issue)),
            Severity::Warning => warn!("probed device graph: {}", issue),
        }
    }
    Ok(())
}
