use std::cell::Cell;
use std::rc::Rc;

use vm_placement::common::{Allocation, BandwidthPoint, ResourcePoint};
use vm_placement::resource_pool::ResourcePoolState;
use vm_placement::valuation::NodeValuation;
use vm_placement::valuations::FreeCapacitySum;
use vm_placement::vm_placement_algorithm::{placement_algorithm_resolver, PlacementError, VmPlacementAlgorithm};
use vm_placement::vm_placement_algorithms::best_fit::BestFit;
use vm_placement::vm_placement_algorithms::first_fit::FirstFit;
use vm_placement::vm_placement_algorithms::marginal_value::MarginalValueFit;
use vm_placement::vm_placement_algorithms::rack_joint_value::RackJointValueFit;
use vm_placement::vm_placement_algorithms::rack_split_value::RackSplitValueFit;
use vm_placement::vm_placement_algorithms::worst_fit::WorstFit;

fn alloc(id: u32, cpu: u32, memory: u64, bandwidth: u64) -> Allocation {
    Allocation {
        id,
        cpu_usage: cpu,
        memory_usage: memory,
        bandwidth_usage: bandwidth,
    }
}

// Two hosts with 10 CPUs and 10 GB each, host 1 at (0.6, 0.6) free and
// host 2 at (0.9, 0.9) free.
fn two_host_pool() -> ResourcePoolState {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[1000]);
    pool.add_host_with_available(1, 10, 10, 6, 6, 0);
    pool.add_host_with_available(2, 10, 10, 9, 9, 0);
    pool
}

#[derive(Clone)]
struct CountingSum {
    calls: Rc<Cell<u32>>,
}

impl NodeValuation for CountingSum {
    fn value(&self, point: ResourcePoint) -> f64 {
        self.calls.set(self.calls.get() + 1);
        point.cpu + point.memory
    }
}

#[test]
// With the linear sum-of-fractions valuation both hosts lose exactly
// 0.25 + 0.125 = 0.375 of value, so the deltas tie and the earliest host
// wins. All fractions here are dyadic, so the tie is exact.
fn marginal_value_linear_valuation_ties_on_first_host() {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[100]);
    pool.add_host_with_available(1, 16, 16, 8, 8, 0);
    pool.add_host_with_available(2, 16, 16, 12, 12, 0);

    let algorithm = MarginalValueFit::new(Box::new(FreeCapacitySum));
    let decision = algorithm.select_host(&alloc(1, 4, 2, 0), &pool).unwrap().unwrap();
    assert_eq!(decision.host_id, 1);
    assert_eq!(decision.bandwidth_unit, None);
}

#[test]
// Sum of squared fractions: host 1 goes 0.72 -> 0.20 (delta -0.52), host 2
// goes 1.62 -> 0.74 (delta -0.88). The maximum delta picks host 1.
fn marginal_value_prefers_smaller_value_decrease() {
    let pool = two_host_pool();
    let valuation = |p: ResourcePoint| p.cpu * p.cpu + p.memory * p.memory;
    let algorithm = MarginalValueFit::new(Box::new(valuation));
    let decision = algorithm.select_host(&alloc(1, 4, 2, 0), &pool).unwrap().unwrap();
    assert_eq!(decision.host_id, 1);
}

#[test]
// A valuation increasing monotonically with free CPU must never prefer the
// host with less free CPU when free memory is equal.
fn marginal_value_sign_correctness() {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[1000]);
    // Host 1 has strictly more free CPU (20 of 20) than host 2 (10 of 10),
    // free memory fractions are equal.
    pool.add_host(1, 20, 10, 0);
    pool.add_host(2, 10, 10, 0);

    let valuation = |p: ResourcePoint| p.cpu;
    let algorithm = MarginalValueFit::new(Box::new(valuation));
    for id in 0..10 {
        let decision = algorithm.select_host(&alloc(id, 4, 1, 0), &pool).unwrap().unwrap();
        assert_eq!(decision.host_id, 1);
    }
}

#[test]
fn marginal_value_is_deterministic() {
    let _ = env_logger::builder().is_test(true).try_init();
    let pool = two_host_pool();
    let algorithm = MarginalValueFit::new(Box::new(FreeCapacitySum));
    let request = alloc(1, 4, 2, 0);
    let first = algorithm.select_host(&request, &pool).unwrap();
    for _ in 0..5 {
        assert_eq!(algorithm.select_host(&request, &pool).unwrap(), first);
    }
}

#[test]
// Repeating the same decision must not invoke the valuation function again
// and must not change the outcome.
fn valuation_cache_transparency() {
    let pool = two_host_pool();
    let calls = Rc::new(Cell::new(0));
    let algorithm = MarginalValueFit::new(Box::new(CountingSum { calls: calls.clone() }));
    let request = alloc(1, 4, 2, 0);

    let first = algorithm.select_host(&request, &pool).unwrap();
    let calls_after_first = calls.get();
    // 2 hosts x (before, after) points.
    assert_eq!(calls_after_first, 4);
    assert_eq!(algorithm.cache_len(), 4);

    let second = algorithm.select_host(&request, &pool).unwrap();
    assert_eq!(second, first);
    assert_eq!(calls.get(), calls_after_first);
}

#[test]
fn suitability_is_respected() {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[100]);
    pool.add_host_with_available(1, 10, 10, 2, 10, 0); // not enough CPU
    pool.add_host_with_available(2, 10, 10, 10, 1, 0); // not enough memory
    pool.add_host_with_available(3, 10, 10, 5, 5, 0);

    let algorithm = MarginalValueFit::new(Box::new(FreeCapacitySum));
    let request = alloc(1, 4, 4, 50);
    let decision = algorithm.select_host(&request, &pool).unwrap().unwrap();
    assert_eq!(decision.host_id, 3);
    assert!(pool.get_available_cpu(decision.host_id) >= request.cpu_usage);
    assert!(pool.get_available_memory(decision.host_id) >= request.memory_usage);
}

#[test]
fn infeasible_demand_returns_no_host() {
    let pool = two_host_pool();
    let request = alloc(1, 100, 100, 0);

    let rack_valuation = |nodes: &[ResourcePoint], units: &[BandwidthPoint]| {
        nodes.iter().map(|p| p.cpu + p.memory).sum::<f64>() + units.iter().sum::<f64>()
    };
    let node_valuation = |p: ResourcePoint, _b: BandwidthPoint| p.cpu + p.memory;
    let unit_valuation = |_p: ResourcePoint, b: BandwidthPoint| b;

    let algorithms: Vec<Box<dyn VmPlacementAlgorithm>> = vec![
        Box::new(FirstFit::new()),
        Box::new(BestFit::new()),
        Box::new(WorstFit::new()),
        Box::new(MarginalValueFit::new(Box::new(FreeCapacitySum))),
        Box::new(RackJointValueFit::new(
            Box::new(rack_valuation),
            Box::new(node_valuation),
            Box::new(unit_valuation),
        )),
        Box::new(RackSplitValueFit::new(Box::new(node_valuation), Box::new(unit_valuation))),
    ];
    for algorithm in &algorithms {
        assert_eq!(algorithm.select_host(&request, &pool).unwrap(), None);
    }
}

#[test]
fn non_finite_valuation_is_fatal() {
    let pool = two_host_pool();
    let valuation = |_p: ResourcePoint| f64::NAN;
    let algorithm = MarginalValueFit::new(Box::new(valuation));
    let result = algorithm.select_host(&alloc(1, 1, 1, 0), &pool);
    assert!(matches!(result, Err(PlacementError::NonFiniteValuation { .. })));
}

#[test]
// The joint valuation is linear in the unit points, so both units produce
// the same total delta. The node sub-delta ignores bandwidth and is equal
// too, while the squared unit sub-delta is strictly smaller for the more
// depleted unit 1 (0.64 - 0.09 = 0.55 vs 1.0 - 0.25 = 0.75), so the
// tie-break accepts unit 1.
fn rack_joint_tie_break_on_unit_sub_delta() {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[100, 100]);
    pool.add_host(1, 10, 10, 0);
    pool.allocate(&alloc(99, 0, 0, 20), 1, Some(1));

    let rack_valuation = |nodes: &[ResourcePoint], units: &[BandwidthPoint]| {
        nodes.iter().map(|p| p.cpu + p.memory).sum::<f64>() + units.iter().sum::<f64>()
    };
    let node_valuation = |p: ResourcePoint, _b: BandwidthPoint| p.cpu + p.memory;
    let unit_valuation = |_p: ResourcePoint, b: BandwidthPoint| b * b;

    let algorithm = RackJointValueFit::new(
        Box::new(rack_valuation),
        Box::new(node_valuation),
        Box::new(unit_valuation),
    );
    let decision = algorithm.select_host(&alloc(1, 2, 2, 50), &pool).unwrap().unwrap();
    assert_eq!(decision.host_id, 1);
    assert_eq!(decision.bandwidth_unit, Some(1));
}

#[test]
// Two hosts in one rack: moving the VM to the already loaded host 1 empties
// fewer whole-VM slots of the rack-wide packing valuation, so the joint
// strategy must prefer the host with the smaller cost delta.
fn rack_joint_minimizes_cost_delta() {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[100]);
    pool.add_host_with_available(1, 10, 10, 4, 4, 0);
    pool.add_host(2, 10, 10, 0);

    // Quadratic in free fractions: the cost of consuming a slice grows with
    // the amount of remaining free capacity.
    let rack_valuation = |nodes: &[ResourcePoint], units: &[BandwidthPoint]| {
        nodes.iter().map(|p| p.cpu * p.cpu + p.memory * p.memory).sum::<f64>() + units.iter().sum::<f64>()
    };
    let node_valuation = |p: ResourcePoint, _b: BandwidthPoint| p.cpu * p.cpu + p.memory * p.memory;
    let unit_valuation = |_p: ResourcePoint, b: BandwidthPoint| b;

    let algorithm = RackJointValueFit::new(
        Box::new(rack_valuation),
        Box::new(node_valuation),
        Box::new(unit_valuation),
    );
    // Host 1 costs 2 * (0.16 - 0.04) + 0.1 = 0.34; host 2 costs
    // 2 * (1.0 - 0.64) + 0.1 = 0.82.
    let decision = algorithm.select_host(&alloc(1, 2, 2, 10), &pool).unwrap().unwrap();
    assert_eq!(decision.host_id, 1);
    assert_eq!(decision.bandwidth_unit, Some(0));
}

#[test]
fn rack_joint_is_deterministic() {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[100, 100]);
    pool.add_host(1, 10, 10, 0);
    pool.add_host(2, 10, 10, 0);

    let rack_valuation = |nodes: &[ResourcePoint], units: &[BandwidthPoint]| {
        nodes.iter().map(|p| p.cpu + p.memory).sum::<f64>() + units.iter().sum::<f64>()
    };
    let node_valuation = |p: ResourcePoint, _b: BandwidthPoint| p.cpu + p.memory;
    let unit_valuation = |_p: ResourcePoint, b: BandwidthPoint| b;
    let algorithm = RackJointValueFit::new(
        Box::new(rack_valuation),
        Box::new(node_valuation),
        Box::new(unit_valuation),
    );

    let request = alloc(1, 2, 2, 30);
    let first = algorithm.select_host(&request, &pool).unwrap();
    assert!(first.is_some());
    for _ in 0..5 {
        assert_eq!(algorithm.select_host(&request, &pool).unwrap(), first);
    }
}

#[test]
fn rack_split_is_deterministic() {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[100, 100]);
    pool.add_host(1, 10, 10, 0);
    pool.add_host(2, 10, 10, 0);
    pool.allocate(&alloc(99, 0, 0, 40), 1, Some(0));

    let node_valuation = |p: ResourcePoint, _b: BandwidthPoint| p.cpu + p.memory;
    let unit_valuation = |_p: ResourcePoint, b: BandwidthPoint| b * b;
    let algorithm = RackSplitValueFit::new(Box::new(node_valuation), Box::new(unit_valuation));

    let request = alloc(1, 2, 2, 30);
    let first = algorithm.select_host(&request, &pool).unwrap();
    assert!(first.is_some());
    for _ in 0..5 {
        assert_eq!(algorithm.select_host(&request, &pool).unwrap(), first);
    }
}

#[test]
// The split strategy picks per host the unit maximizing the local bandwidth
// delta: with the squared unit valuation the fuller unit 0 loses 0.4375
// while unit 1 loses only 0.1875.
fn rack_split_picks_unit_with_max_local_delta() {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[100, 100]);
    pool.add_host(1, 10, 10, 0);
    pool.allocate(&alloc(99, 0, 0, 50), 1, Some(1));

    let node_valuation = |p: ResourcePoint, _b: BandwidthPoint| p.cpu + p.memory;
    let unit_valuation = |_p: ResourcePoint, b: BandwidthPoint| b * b;
    let algorithm = RackSplitValueFit::new(Box::new(node_valuation), Box::new(unit_valuation));

    let decision = algorithm.select_host(&alloc(1, 2, 2, 25), &pool).unwrap().unwrap();
    assert_eq!(decision.host_id, 1);
    assert_eq!(decision.bandwidth_unit, Some(1));
}

#[test]
fn baseline_algorithms_pick_expected_hosts() {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[100]);
    pool.add_host_with_available(1, 10, 10, 6, 6, 0);
    pool.add_host_with_available(2, 10, 10, 3, 8, 0);
    pool.add_host_with_available(3, 10, 10, 9, 9, 0);

    let request = alloc(1, 2, 2, 40);
    let first = FirstFit::new().select_host(&request, &pool).unwrap().unwrap();
    assert_eq!(first.host_id, 1);
    assert_eq!(first.bandwidth_unit, Some(0));

    let best = BestFit::new().select_host(&request, &pool).unwrap().unwrap();
    assert_eq!(best.host_id, 2);

    let worst = WorstFit::new().select_host(&request, &pool).unwrap().unwrap();
    assert_eq!(worst.host_id, 3);
}

#[test]
fn resolver_builds_named_algorithms() {
    let mut pool = ResourcePoolState::new();
    pool.add_rack(0, &[100]);
    pool.add_host(1, 10, 10, 0);

    for name in ["FirstFit", "BestFit", "WorstFit"] {
        let algorithm = placement_algorithm_resolver(name.to_string());
        let decision = algorithm.select_host(&alloc(1, 2, 2, 0), &pool).unwrap().unwrap();
        assert_eq!(decision.host_id, 1);
    }
}
