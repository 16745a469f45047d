//! Marginal value algorithm over per-host (CPU, memory) points.

use std::cell::RefCell;

use crate::common::{Allocation, AllocationVerdict, ResourcePoint};
use crate::resource_pool::ResourcePoolState;
use crate::valuation::{NodeValuation, ValuationCache};
use crate::vm_placement_algorithm::{check_after_point, ensure_finite};
use crate::vm_placement_algorithm::{PlacementDecision, PlacementError, VmPlacementAlgorithm};

/// Chooses the host for which the placement increases the valuation of the
/// host's free-capacity point the most.
///
/// For each suitable host the before and after points are valued (with
/// memoization) and `delta = value(after) - value(before)` is maximized.
/// Ties keep the earliest iterated host. Bandwidth is only checked for
/// suitability; the unit choice is left to the caller.
pub struct MarginalValueFit {
    valuation: Box<dyn NodeValuation>,
    cache: RefCell<ValuationCache>,
}

impl MarginalValueFit {
    pub fn new(valuation: Box<dyn NodeValuation>) -> Self {
        Self {
            valuation,
            cache: RefCell::new(ValuationCache::new()),
        }
    }

    /// Number of memoized valuation results.
    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl VmPlacementAlgorithm for MarginalValueFit {
    fn select_host(
        &self,
        alloc: &Allocation,
        pool_state: &ResourcePoolState,
    ) -> Result<Option<PlacementDecision>, PlacementError> {
        let mut result: Option<u32> = None;
        let mut max_delta = f64::NEG_INFINITY;
        let mut cache = self.cache.borrow_mut();

        for host in pool_state.get_hosts_list() {
            if pool_state.can_allocate(alloc, host) != AllocationVerdict::Success {
                continue;
            }
            let before = pool_state.get_resource_point(host);
            let after = ResourcePoint::new(
                before.cpu - alloc.cpu_usage as f64 / pool_state.get_total_cpu(host) as f64,
                before.memory - alloc.memory_usage as f64 / pool_state.get_total_memory(host) as f64,
            );
            check_after_point(host, after)?;

            let value_before = ensure_finite(cache.node_value(&*self.valuation, before))?;
            let value_after = ensure_finite(cache.node_value(&*self.valuation, after))?;
            let delta = value_after - value_before;
            log::trace!("vm #{}: host #{} delta {}", alloc.id, host, delta);
            if delta > max_delta {
                max_delta = delta;
                result = Some(host);
            }
        }
        Ok(result.map(PlacementDecision::on_host))
    }
}
