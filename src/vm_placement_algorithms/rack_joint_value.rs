//! Joint rack valuation algorithm.

use std::cell::RefCell;

use crate::common::{Allocation, AllocationVerdict, BandwidthPoint, ResourcePoint};
use crate::resource_pool::ResourcePoolState;
use crate::valuation::{RackValuation, UnitValuation, ValuationCache};
use crate::vm_placement_algorithm::{check_after_point, ensure_finite};
use crate::vm_placement_algorithm::{PlacementDecision, PlacementError, VmPlacementAlgorithm};

/// Chooses a (host, bandwidth unit) pair by valuing the whole rack jointly.
///
/// For each suitable host the rack's node points and bandwidth points are
/// valued as one state (`init_val`); the host's post-placement point is then
/// substituted, and for every bandwidth unit with enough headroom the pair
/// `delta = init_val - candidate_val` is computed. The pair with the
/// minimum cost delta wins (note the sign convention is opposite to
/// [`MarginalValueFit`](crate::vm_placement_algorithms::marginal_value::MarginalValueFit)).
///
/// Exact ties are resolved by a secondary decomposition into node-only and
/// unit-only sub-deltas computed with two separate valuation capabilities:
/// the challenger wins only if one sub-delta strictly improves while the
/// other is exactly unchanged. Sub-valuation results are memoized with
/// composite (point, bandwidth point) keys.
pub struct RackJointValueFit {
    rack_valuation: Box<dyn RackValuation>,
    node_valuation: Box<dyn UnitValuation>,
    unit_valuation: Box<dyn UnitValuation>,
    node_cache: RefCell<ValuationCache>,
    unit_cache: RefCell<ValuationCache>,
}

impl RackJointValueFit {
    pub fn new(
        rack_valuation: Box<dyn RackValuation>,
        node_valuation: Box<dyn UnitValuation>,
        unit_valuation: Box<dyn UnitValuation>,
    ) -> Self {
        Self {
            rack_valuation,
            node_valuation,
            unit_valuation,
            node_cache: RefCell::new(ValuationCache::new()),
            unit_cache: RefCell::new(ValuationCache::new()),
        }
    }
}

/// Valuation change of the (host point, unit point) pair, memoized per point.
fn sub_delta(
    cache: &mut ValuationCache,
    valuation: &dyn UnitValuation,
    before: ResourcePoint,
    band_before: BandwidthPoint,
    after: ResourcePoint,
    band_after: BandwidthPoint,
) -> Result<f64, PlacementError> {
    let value_before = ensure_finite(cache.unit_value(valuation, before, band_before))?;
    let value_after = ensure_finite(cache.unit_value(valuation, after, band_after))?;
    Ok(value_before - value_after)
}

impl VmPlacementAlgorithm for RackJointValueFit {
    fn select_host(
        &self,
        alloc: &Allocation,
        pool_state: &ResourcePoolState,
    ) -> Result<Option<PlacementDecision>, PlacementError> {
        let mut result: Option<(u32, usize)> = None;
        let mut min_delta = f64::INFINITY;
        let mut min_delta_node = f64::INFINITY;
        let mut min_delta_unit = f64::INFINITY;
        let mut node_cache = self.node_cache.borrow_mut();
        let mut unit_cache = self.unit_cache.borrow_mut();

        for host in pool_state.get_hosts_list() {
            if pool_state.can_allocate(alloc, host) != AllocationVerdict::Success {
                continue;
            }
            let rack_id = pool_state.get_host_rack(host);
            let mut nodes = pool_state.get_rack_node_points(rack_id);
            let mut units = pool_state.get_rack_bandwidth_points(rack_id);
            let index = pool_state
                .get_rack_hosts(rack_id)
                .iter()
                .position(|&h| h == host)
                .expect("Host is not listed in its rack");

            let init_val = ensure_finite(self.rack_valuation.value(&nodes, &units))?;
            let before = nodes[index];
            let after = ResourcePoint::new(
                before.cpu - alloc.cpu_usage as f64 / pool_state.get_total_cpu(host) as f64,
                before.memory - alloc.memory_usage as f64 / pool_state.get_total_memory(host) as f64,
            );
            check_after_point(host, after)?;
            nodes[index] = after;

            let mut candidate_found = false;
            for i in 0..units.len() {
                let band_before = units[i];
                let band_after = band_before
                    - alloc.bandwidth_usage as f64 / pool_state.get_unit_total_bandwidth(rack_id, i) as f64;
                if band_after < 0. {
                    continue;
                }
                candidate_found = true;
                units[i] = band_after;
                let candidate_val = ensure_finite(self.rack_valuation.value(&nodes, &units))?;
                units[i] = band_before;

                let delta = init_val - candidate_val;
                log::trace!("vm #{}: host #{} unit {} delta {}", alloc.id, host, i, delta);
                if delta < min_delta {
                    result = Some((host, i));
                    min_delta = delta;
                    min_delta_node =
                        sub_delta(&mut node_cache, &*self.node_valuation, before, band_before, after, band_after)?;
                    min_delta_unit =
                        sub_delta(&mut unit_cache, &*self.unit_valuation, before, band_before, after, band_after)?;
                } else if delta == min_delta {
                    let new_delta_node =
                        sub_delta(&mut node_cache, &*self.node_valuation, before, band_before, after, band_after)?;
                    let new_delta_unit =
                        sub_delta(&mut unit_cache, &*self.unit_valuation, before, band_before, after, band_after)?;
                    if (new_delta_unit == min_delta_unit && new_delta_node < min_delta_node)
                        || (new_delta_node == min_delta_node && new_delta_unit < min_delta_unit)
                    {
                        result = Some((host, i));
                        min_delta_node = new_delta_node;
                        min_delta_unit = new_delta_unit;
                    }
                }
            }
            if !candidate_found {
                // can_allocate guarantees a unit with headroom, so this is
                // reachable only for racks without bandwidth units.
                log::warn!("vm #{}: no feasible bandwidth unit on suitable host #{}", alloc.id, host);
            }
        }
        Ok(result.map(|(host, unit)| PlacementDecision::on_host_unit(host, unit)))
    }
}
