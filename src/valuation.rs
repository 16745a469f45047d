//! Pluggable valuation functions and memoization of their results.

use std::collections::HashMap;

use dyn_clone::{clone_trait_object, DynClone};

use crate::common::{BandwidthPoint, ResourcePoint};

/// Scalar valuation of a single host's free-capacity point.
///
/// Implementations must be pure: deterministic for identical inputs, no side
/// effects, and finite for any point with nonnegative coordinates. Behavior
/// on negative coordinates (overcommit) is implementation-defined and not
/// validated here.
pub trait NodeValuation: DynClone {
    fn value(&self, point: ResourcePoint) -> f64;
}

clone_trait_object!(NodeValuation);

impl<F> NodeValuation for F
where
    F: Fn(ResourcePoint) -> f64 + Clone,
{
    fn value(&self, point: ResourcePoint) -> f64 {
        self(point)
    }
}

/// Scalar valuation of a (host point, bandwidth unit point) pair.
///
/// Used for the per-unit sub-valuations of the rack strategies. Same purity
/// requirements as [`NodeValuation`].
pub trait UnitValuation: DynClone {
    fn value(&self, point: ResourcePoint, unit: BandwidthPoint) -> f64;
}

clone_trait_object!(UnitValuation);

impl<F> UnitValuation for F
where
    F: Fn(ResourcePoint, BandwidthPoint) -> f64 + Clone,
{
    fn value(&self, point: ResourcePoint, unit: BandwidthPoint) -> f64 {
        self(point, unit)
    }
}

/// Joint scalar valuation of a whole rack: the free-capacity points of all
/// its hosts and the free fractions of all its bandwidth units.
///
/// Same purity requirements as [`NodeValuation`].
pub trait RackValuation: DynClone {
    fn value(&self, nodes: &[ResourcePoint], units: &[BandwidthPoint]) -> f64;
}

clone_trait_object!(RackValuation);

impl<F> RackValuation for F
where
    F: Fn(&[ResourcePoint], &[BandwidthPoint]) -> f64 + Clone,
{
    fn value(&self, nodes: &[ResourcePoint], units: &[BandwidthPoint]) -> f64 {
        self(nodes, units)
    }
}

/// Memoizes valuation results for the lifetime of one placement algorithm
/// instance.
///
/// Keys are exact bit patterns of the point coordinates: a hit requires a
/// bit-for-bit match, there is no tolerance. Since valuations are pure and
/// the key includes every input they depend on, entries are never
/// invalidated; the cache grows monotonically with the number of distinct
/// occupancy points actually visited.
#[derive(Clone, Default)]
pub struct ValuationCache {
    node_values: HashMap<(u64, u64), f64>,
    unit_values: HashMap<(u64, u64, u64), f64>,
}

impl ValuationCache {
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the cached valuation of the point, invoking the valuation
    /// function on a miss.
    pub fn node_value(&mut self, valuation: &dyn NodeValuation, point: ResourcePoint) -> f64 {
        *self
            .node_values
            .entry(point.bits())
            .or_insert_with(|| valuation.value(point))
    }

    /// Returns the cached valuation of the (point, unit) pair, invoking the
    /// valuation function on a miss.
    pub fn unit_value(&mut self, valuation: &dyn UnitValuation, point: ResourcePoint, unit: BandwidthPoint) -> f64 {
        let (cpu_bits, memory_bits) = point.bits();
        *self
            .unit_values
            .entry((cpu_bits, memory_bits, unit.to_bits()))
            .or_insert_with(|| valuation.value(point, unit))
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.node_values.len() + self.unit_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_values.is_empty() && self.unit_values.is_empty()
    }
}
