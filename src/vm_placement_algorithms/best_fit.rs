//! Best Fit algorithm.

use crate::common::{Allocation, AllocationVerdict};
use crate::resource_pool::ResourcePoolState;
use crate::vm_placement_algorithm::{PlacementDecision, PlacementError, VmPlacementAlgorithm};
use crate::vm_placement_algorithms::first_fit::decision_with_first_unit;

/// BestFit algorithm, which returns the most loaded (by CPU) suitable host.
#[derive(Default)]
pub struct BestFit;

impl BestFit {
    pub fn new() -> Self {
        Default::default()
    }
}

impl VmPlacementAlgorithm for BestFit {
    fn select_host(
        &self,
        alloc: &Allocation,
        pool_state: &ResourcePoolState,
    ) -> Result<Option<PlacementDecision>, PlacementError> {
        let mut result: Option<u32> = None;
        let mut min_available_cpu: u32 = u32::MAX;

        for host in pool_state.get_hosts_list() {
            if pool_state.can_allocate(alloc, host) == AllocationVerdict::Success
                && pool_state.get_available_cpu(host) < min_available_cpu
            {
                min_available_cpu = pool_state.get_available_cpu(host);
                result = Some(host);
            }
        }
        Ok(result.map(|host| decision_with_first_unit(alloc, pool_state, host)))
    }
}
