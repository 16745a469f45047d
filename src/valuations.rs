//! Library-provided valuation functions.
//!
//! The type-packing family scores a free-capacity state by how many more
//! instances of each known VM type still fit into it, so a placement that
//! preserves the ability to pack future VMs is valued higher. All of them
//! are parameterized by an explicit [`VmTypeTable`].

use crate::common::{BandwidthPoint, ResourcePoint};
use crate::valuation::{NodeValuation, RackValuation, UnitValuation};
use crate::vm_types::{VmType, VmTypeTable};

/// Number of whole instances of the type fitting into the free point.
fn node_fits(point: ResourcePoint, vm_type: &VmType) -> f64 {
    (point.cpu / vm_type.cpu).floor().min((point.memory / vm_type.memory).floor())
}

/// Number of whole instances of the type's bandwidth demand fitting into the
/// unit's free fraction.
fn unit_fits(unit: BandwidthPoint, vm_type: &VmType) -> f64 {
    (unit / vm_type.bandwidth).floor()
}

/// Sum over known types of the number of still-fitting instances weighted by
/// the type's CPU demand.
#[derive(Clone)]
pub struct TypePackingValue {
    table: VmTypeTable,
}

impl TypePackingValue {
    pub fn new(table: VmTypeTable) -> Self {
        Self { table }
    }
}

impl NodeValuation for TypePackingValue {
    fn value(&self, point: ResourcePoint) -> f64 {
        self.table
            .active_types()
            .map(|t| node_fits(point, t) * t.cpu)
            .sum()
    }
}

/// Node-side sub-valuation: still-fitting instance count weighted by the
/// type's combined value. The bandwidth coordinate is not used.
#[derive(Clone)]
pub struct NodeTypePackingValue {
    table: VmTypeTable,
}

impl NodeTypePackingValue {
    pub fn new(table: VmTypeTable) -> Self {
        Self { table }
    }
}

impl UnitValuation for NodeTypePackingValue {
    fn value(&self, point: ResourcePoint, _unit: BandwidthPoint) -> f64 {
        self.table
            .active_types()
            .map(|t| node_fits(point, t) * self.table.type_value(t))
            .sum()
    }
}

/// Bandwidth-side sub-valuation: how many instances of each type the unit
/// can still carry, weighted by the type's combined value. The node
/// coordinates are not used.
#[derive(Clone)]
pub struct UnitTypePackingValue {
    table: VmTypeTable,
}

impl UnitTypePackingValue {
    pub fn new(table: VmTypeTable) -> Self {
        Self { table }
    }
}

impl UnitValuation for UnitTypePackingValue {
    fn value(&self, _point: ResourcePoint, unit: BandwidthPoint) -> f64 {
        self.table
            .active_types()
            .filter(|t| t.bandwidth > 0.)
            .map(|t| unit_fits(unit, t) * self.table.type_value(t))
            .sum()
    }
}

/// Whole-rack valuation: per type, the number of placeable instances is
/// bounded by both the node capacity across all hosts and the bandwidth
/// capacity across all units of the rack.
#[derive(Clone)]
pub struct RackTypePackingValue {
    table: VmTypeTable,
}

impl RackTypePackingValue {
    pub fn new(table: VmTypeTable) -> Self {
        Self { table }
    }
}

impl RackValuation for RackTypePackingValue {
    fn value(&self, nodes: &[ResourcePoint], units: &[BandwidthPoint]) -> f64 {
        let mut sum = 0.;
        for t in self.table.active_types() {
            let node_sum: f64 = nodes.iter().map(|p| node_fits(*p, t)).sum();
            let fits = if t.bandwidth > 0. {
                let unit_sum: f64 = units.iter().map(|u| unit_fits(*u, t)).sum();
                node_sum.min(unit_sum)
            } else {
                node_sum
            };
            sum += fits * self.table.type_value(t);
        }
        sum
    }
}

/// Sum of free CPU and memory fractions. The simplest monotone valuation,
/// mostly useful as a baseline and in tests.
#[derive(Clone)]
pub struct FreeCapacitySum;

impl NodeValuation for FreeCapacitySum {
    fn value(&self, point: ResourcePoint) -> f64 {
        point.cpu + point.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> VmTypeTable {
        VmTypeTable::new(vec![
            VmType {
                name: "small".to_string(),
                cpu: 0.25,
                memory: 0.25,
                bandwidth: 0.5,
                count: 10,
            },
            VmType {
                name: "unused".to_string(),
                cpu: 0.5,
                memory: 0.5,
                bandwidth: 0.5,
                count: 0,
            },
        ])
    }

    #[test]
    fn node_packing_counts_whole_instances() {
        let v = TypePackingValue::new(table());
        // 3 by CPU, 2 by memory -> 2 instances, weighted by cpu 0.25.
        assert_eq!(v.value(ResourcePoint::new(0.8, 0.5)), 2. * 0.25);
        // Types with zero count are ignored.
        assert_eq!(v.value(ResourcePoint::new(1.0, 1.0)), 4. * 0.25);
    }

    #[test]
    fn rack_packing_is_bounded_by_bandwidth() {
        let v = RackTypePackingValue::new(table());
        let nodes = [ResourcePoint::new(1.0, 1.0), ResourcePoint::new(1.0, 1.0)];
        // Nodes fit 8 instances, but two units fit only 2 + 1.
        let value = v.value(&nodes, &[1.0, 0.5]);
        assert_eq!(value, 3. * (0.25 + 0.25 + 0.5));
    }
}
