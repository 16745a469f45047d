//! First Fit algorithm.

use crate::common::{Allocation, AllocationVerdict};
use crate::resource_pool::ResourcePoolState;
use crate::vm_placement_algorithm::{PlacementDecision, PlacementError, VmPlacementAlgorithm};

/// FirstFit algorithm, which returns the first suitable host. If the VM
/// requests bandwidth, the first bandwidth unit with enough headroom in the
/// host's rack is chosen.
#[derive(Default)]
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Default::default()
    }
}

impl VmPlacementAlgorithm for FirstFit {
    fn select_host(
        &self,
        alloc: &Allocation,
        pool_state: &ResourcePoolState,
    ) -> Result<Option<PlacementDecision>, PlacementError> {
        for host in pool_state.get_hosts_list() {
            if pool_state.can_allocate(alloc, host) == AllocationVerdict::Success {
                return Ok(Some(decision_with_first_unit(alloc, pool_state, host)));
            }
        }
        Ok(None)
    }
}

/// Builds a decision for the host, binding the first suitable bandwidth unit
/// when the VM requests bandwidth.
pub(crate) fn decision_with_first_unit(
    alloc: &Allocation,
    pool_state: &ResourcePoolState,
    host_id: u32,
) -> PlacementDecision {
    if alloc.bandwidth_usage == 0 {
        return PlacementDecision::on_host(host_id);
    }
    let rack_id = pool_state.get_host_rack(host_id);
    match pool_state.first_suitable_unit(rack_id, alloc.bandwidth_usage) {
        Some(unit) => PlacementDecision::on_host_unit(host_id, unit),
        None => PlacementDecision::on_host(host_id),
    }
}
