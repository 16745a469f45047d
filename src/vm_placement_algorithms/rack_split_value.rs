//! Split rack valuation algorithm.

use std::cell::RefCell;

use crate::common::{Allocation, AllocationVerdict, ResourcePoint};
use crate::resource_pool::ResourcePoolState;
use crate::valuation::{UnitValuation, ValuationCache};
use crate::vm_placement_algorithm::{check_after_point, ensure_finite};
use crate::vm_placement_algorithm::{PlacementDecision, PlacementError, VmPlacementAlgorithm};

/// Alternate formulation of rack-aware placement with two independent
/// valuations instead of one joint whole-rack function.
///
/// Per suitable host, the bandwidth unit maximizing the local unit-valuation
/// delta is chosen first; the node-valuation delta for the host's own
/// before/after points is then added, and the (host, unit) pair with the
/// maximum combined delta wins. Ties keep the earliest candidate. Both
/// valuations are memoized with composite (point, bandwidth point) keys.
///
/// Not the default: [`RackJointValueFit`] values rack state jointly and uses
/// the opposite sign convention, and the two are not equivalent.
///
/// [`RackJointValueFit`]: crate::vm_placement_algorithms::rack_joint_value::RackJointValueFit
pub struct RackSplitValueFit {
    node_valuation: Box<dyn UnitValuation>,
    unit_valuation: Box<dyn UnitValuation>,
    node_cache: RefCell<ValuationCache>,
    unit_cache: RefCell<ValuationCache>,
}

impl RackSplitValueFit {
    pub fn new(node_valuation: Box<dyn UnitValuation>, unit_valuation: Box<dyn UnitValuation>) -> Self {
        Self {
            node_valuation,
            unit_valuation,
            node_cache: RefCell::new(ValuationCache::new()),
            unit_cache: RefCell::new(ValuationCache::new()),
        }
    }
}

impl VmPlacementAlgorithm for RackSplitValueFit {
    fn select_host(
        &self,
        alloc: &Allocation,
        pool_state: &ResourcePoolState,
    ) -> Result<Option<PlacementDecision>, PlacementError> {
        let mut result: Option<(u32, usize)> = None;
        let mut max_delta = f64::NEG_INFINITY;
        let mut node_cache = self.node_cache.borrow_mut();
        let mut unit_cache = self.unit_cache.borrow_mut();

        for host in pool_state.get_hosts_list() {
            if pool_state.can_allocate(alloc, host) != AllocationVerdict::Success {
                continue;
            }
            let rack_id = pool_state.get_host_rack(host);
            let before = pool_state.get_resource_point(host);
            let after = ResourcePoint::new(
                before.cpu - alloc.cpu_usage as f64 / pool_state.get_total_cpu(host) as f64,
                before.memory - alloc.memory_usage as f64 / pool_state.get_total_memory(host) as f64,
            );
            check_after_point(host, after)?;

            // Best unit by the local bandwidth delta.
            let mut best_unit: Option<usize> = None;
            let mut best_unit_delta = f64::NEG_INFINITY;
            let mut band_before_final = 0.;
            let mut band_after_final = 0.;
            let units = pool_state.get_rack_bandwidth_points(rack_id);
            for (i, &band_before) in units.iter().enumerate() {
                let band_after = band_before
                    - alloc.bandwidth_usage as f64 / pool_state.get_unit_total_bandwidth(rack_id, i) as f64;
                if band_after < 0. {
                    continue;
                }
                let unit_value_before =
                    ensure_finite(unit_cache.unit_value(&*self.unit_valuation, before, band_before))?;
                let unit_value_after = ensure_finite(unit_cache.unit_value(&*self.unit_valuation, after, band_after))?;
                let unit_delta = unit_value_after - unit_value_before;
                if unit_delta > best_unit_delta {
                    best_unit = Some(i);
                    best_unit_delta = unit_delta;
                    band_before_final = band_before;
                    band_after_final = band_after;
                }
            }
            let unit = match best_unit {
                Some(unit) => unit,
                None => {
                    log::warn!("vm #{}: no feasible bandwidth unit on suitable host #{}", alloc.id, host);
                    continue;
                }
            };

            let node_value_before =
                ensure_finite(node_cache.unit_value(&*self.node_valuation, before, band_before_final))?;
            let node_value_after =
                ensure_finite(node_cache.unit_value(&*self.node_valuation, after, band_after_final))?;
            let delta = node_value_after - node_value_before + best_unit_delta;
            log::trace!("vm #{}: host #{} unit {} delta {}", alloc.id, host, unit, delta);
            if delta > max_delta {
                max_delta = delta;
                result = Some((host, unit));
            }
        }
        Ok(result.map(|(host, unit)| PlacementDecision::on_host_unit(host, unit)))
    }
}
