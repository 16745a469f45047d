//! Resource pool state.

use std::collections::BTreeMap;

use crate::common::{Allocation, AllocationVerdict, BandwidthPoint, ResourcePoint};

/// One shared bandwidth unit (DPU/NIC) of a rack.
#[derive(Clone)]
pub struct BandwidthUnit {
    pub total: u64,
    pub available: u64,
    pub overcommit: u64,
}

impl BandwidthUnit {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            available: total,
            overcommit: 0,
        }
    }
}

/// Stores host properties (resource capacity) and state (available resources,
/// current allocations). Every host belongs to exactly one rack.
#[derive(Clone)]
pub struct HostInfo {
    pub cpu_total: u32,
    pub memory_total: u64,

    pub cpu_available: u32,
    pub memory_available: u64,

    pub cpu_overcommit: u32,
    pub memory_overcommit: u64,

    pub rack_id: u32,

    pub allocations: BTreeMap<u32, Allocation>,
}

impl HostInfo {
    /// Creates host info with specified total and available host capacity.
    pub fn new(cpu_total: u32, memory_total: u64, cpu_available: u32, memory_available: u64, rack_id: u32) -> Self {
        Self {
            cpu_total,
            memory_total,
            cpu_available,
            memory_available,
            cpu_overcommit: 0,
            memory_overcommit: 0,
            rack_id,
            allocations: BTreeMap::new(),
        }
    }
}

/// A group of hosts sharing one ordered pool of bandwidth units.
///
/// Placing a VM on any host of the rack can deplete any unit of the pool; the
/// VM's traffic is bound to the unit chosen at placement time.
#[derive(Clone)]
pub struct RackInfo {
    pub hosts: Vec<u32>,
    pub bandwidth_units: Vec<BandwidthUnit>,
    /// Bandwidth unit chosen at placement time per allocation ID.
    unit_bindings: BTreeMap<u32, usize>,
}

impl RackInfo {
    pub fn new(unit_capacities: &[u64]) -> Self {
        Self {
            hosts: Vec::new(),
            bandwidth_units: unit_capacities.iter().map(|cap| BandwidthUnit::new(*cap)).collect(),
            unit_bindings: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ResourcePoolState {
    hosts: BTreeMap<u32, HostInfo>,
    racks: BTreeMap<u32, RackInfo>,
}

impl ResourcePoolState {
    /// Creates empty resource pool state.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds rack with the specified bandwidth unit capacities to resource pool.
    pub fn add_rack(&mut self, id: u32, unit_capacities: &[u64]) {
        self.racks.insert(id, RackInfo::new(unit_capacities));
    }

    /// Adds host to resource pool. The host's rack must be added beforehand.
    pub fn add_host(&mut self, id: u32, cpu_total: u32, memory_total: u64, rack_id: u32) {
        self.add_host_with_available(id, cpu_total, memory_total, cpu_total, memory_total, rack_id);
    }

    /// Adds host with part of its capacity already in use.
    pub fn add_host_with_available(
        &mut self,
        id: u32,
        cpu_total: u32,
        memory_total: u64,
        cpu_available: u32,
        memory_available: u64,
        rack_id: u32,
    ) {
        let rack = self
            .racks
            .get_mut(&rack_id)
            .unwrap_or_else(|| panic!("Rack #{} is not added to resource pool", rack_id));
        rack.hosts.push(id);
        self.hosts.insert(
            id,
            HostInfo::new(cpu_total, memory_total, cpu_available, memory_available, rack_id),
        );
    }

    /// Returns IDs of all hosts.
    pub fn get_hosts_list(&self) -> Vec<u32> {
        self.hosts.keys().cloned().collect()
    }

    /// Returns the number of hosts.
    pub fn get_host_count(&self) -> u32 {
        self.hosts.len() as u32
    }

    /// Returns IDs of all racks.
    pub fn get_racks_list(&self) -> Vec<u32> {
        self.racks.keys().cloned().collect()
    }

    /// Returns the rack the specified host belongs to.
    pub fn get_host_rack(&self, host_id: u32) -> u32 {
        self.hosts[&host_id].rack_id
    }

    /// Returns IDs of hosts in the specified rack, in insertion order.
    pub fn get_rack_hosts(&self, rack_id: u32) -> &[u32] {
        &self.racks[&rack_id].hosts
    }

    /// Returns the number of bandwidth units in the specified rack.
    pub fn get_rack_unit_count(&self, rack_id: u32) -> usize {
        self.racks[&rack_id].bandwidth_units.len()
    }

    /// Returns the total capacity of the specified bandwidth unit.
    pub fn get_unit_total_bandwidth(&self, rack_id: u32, unit: usize) -> u64 {
        self.racks[&rack_id].bandwidth_units[unit].total
    }

    /// Returns the available capacity of the specified bandwidth unit.
    pub fn get_unit_available_bandwidth(&self, rack_id: u32, unit: usize) -> u64 {
        self.racks[&rack_id].bandwidth_units[unit].available
    }

    /// Checks if the specified allocation is currently possible on the specified host.
    ///
    /// The bandwidth check is rack-level: some unit of the host's rack must
    /// have enough headroom for the requested bandwidth.
    pub fn can_allocate(&self, alloc: &Allocation, host_id: u32) -> AllocationVerdict {
        let host = match self.hosts.get(&host_id) {
            Some(host) => host,
            None => return AllocationVerdict::HostNotFound,
        };
        if host.cpu_available < alloc.cpu_usage {
            return AllocationVerdict::NotEnoughCPU;
        }
        if host.memory_available < alloc.memory_usage {
            return AllocationVerdict::NotEnoughMemory;
        }
        if alloc.bandwidth_usage > 0 && self.first_suitable_unit(host.rack_id, alloc.bandwidth_usage).is_none() {
            return AllocationVerdict::NotEnoughBandwidth;
        }
        AllocationVerdict::Success
    }

    /// Returns the first bandwidth unit of the rack with enough headroom for
    /// the specified demand.
    pub fn first_suitable_unit(&self, rack_id: u32, bandwidth_usage: u64) -> Option<usize> {
        self.racks[&rack_id]
            .bandwidth_units
            .iter()
            .position(|unit| unit.available >= bandwidth_usage)
    }

    /// Applies the specified allocation on the specified host and, if a
    /// bandwidth unit is given, binds the allocation to that unit.
    pub fn allocate(&mut self, alloc: &Allocation, host_id: u32, bandwidth_unit: Option<usize>) {
        let host = match self.hosts.get_mut(&host_id) {
            Some(host) => host,
            None => return,
        };
        if host.allocations.contains_key(&alloc.id) {
            return;
        }

        if host.cpu_available < alloc.cpu_usage {
            host.cpu_overcommit += alloc.cpu_usage - host.cpu_available;
            host.cpu_available = 0;
        } else {
            host.cpu_available -= alloc.cpu_usage;
        }

        if host.memory_available < alloc.memory_usage {
            host.memory_overcommit += alloc.memory_usage - host.memory_available;
            host.memory_available = 0;
        } else {
            host.memory_available -= alloc.memory_usage;
        }

        host.allocations.insert(alloc.id, alloc.clone());
        let rack_id = host.rack_id;

        if let Some(unit_id) = bandwidth_unit {
            let rack = self.racks.get_mut(&rack_id).unwrap();
            let unit = &mut rack.bandwidth_units[unit_id];
            if unit.available < alloc.bandwidth_usage {
                unit.overcommit += alloc.bandwidth_usage - unit.available;
                unit.available = 0;
            } else {
                unit.available -= alloc.bandwidth_usage;
            }
            rack.unit_bindings.insert(alloc.id, unit_id);
        }
    }

    /// Removes the specified allocation on the specified host and releases its
    /// bandwidth unit binding, if any.
    pub fn release(&mut self, alloc: &Allocation, host_id: u32) {
        let host = match self.hosts.get_mut(&host_id) {
            Some(host) => host,
            None => return,
        };

        if host.cpu_overcommit >= alloc.cpu_usage {
            host.cpu_overcommit -= alloc.cpu_usage;
        } else {
            host.cpu_available += alloc.cpu_usage - host.cpu_overcommit;
            host.cpu_overcommit = 0;
        }

        if host.memory_overcommit >= alloc.memory_usage {
            host.memory_overcommit -= alloc.memory_usage;
        } else {
            host.memory_available += alloc.memory_usage - host.memory_overcommit;
            host.memory_overcommit = 0;
        }

        host.allocations.remove(&alloc.id);
        let rack_id = host.rack_id;

        let rack = self.racks.get_mut(&rack_id).unwrap();
        if let Some(unit_id) = rack.unit_bindings.remove(&alloc.id) {
            let unit = &mut rack.bandwidth_units[unit_id];
            if unit.overcommit >= alloc.bandwidth_usage {
                unit.overcommit -= alloc.bandwidth_usage;
            } else {
                unit.available += alloc.bandwidth_usage - unit.overcommit;
                unit.overcommit = 0;
            }
        }
    }

    /// Returns the total CPU capacity of the specified host.
    pub fn get_total_cpu(&self, host_id: u32) -> u32 {
        self.hosts[&host_id].cpu_total
    }

    /// Returns the total memory capacity of the specified host.
    pub fn get_total_memory(&self, host_id: u32) -> u64 {
        self.hosts[&host_id].memory_total
    }

    /// Returns the amount of available vCPUs on the specified host.
    pub fn get_available_cpu(&self, host_id: u32) -> u32 {
        self.hosts[&host_id].cpu_available
    }

    /// Returns the amount of available memory on the specified host.
    pub fn get_available_memory(&self, host_id: u32) -> u64 {
        self.hosts[&host_id].memory_available
    }

    /// Returns CPU capacity of the specified host currently in use by some VMs.
    pub fn get_allocated_cpu(&self, host_id: u32) -> u32 {
        self.get_total_cpu(host_id) - self.get_available_cpu(host_id)
    }

    /// Returns memory capacity of the specified host currently in use by some VMs.
    pub fn get_allocated_memory(&self, host_id: u32) -> u64 {
        self.get_total_memory(host_id) - self.get_available_memory(host_id)
    }

    /// Returns the CPU allocation rate (ratio of allocated to total resources) of the specified host.
    pub fn get_cpu_load(&self, host_id: u32) -> f64 {
        1. - self.hosts[&host_id].cpu_available as f64 / self.hosts[&host_id].cpu_total as f64
    }

    /// Returns the memory allocation rate (ratio of allocated to total resources) of the specified host.
    pub fn get_memory_load(&self, host_id: u32) -> f64 {
        1. - self.hosts[&host_id].memory_available as f64 / self.hosts[&host_id].memory_total as f64
    }

    /// Returns the free-capacity point of the specified host.
    pub fn get_resource_point(&self, host_id: u32) -> ResourcePoint {
        let host = &self.hosts[&host_id];
        ResourcePoint::new(
            host.cpu_available as f64 / host.cpu_total as f64,
            host.memory_available as f64 / host.memory_total as f64,
        )
    }

    /// Returns free-capacity points of all hosts in the rack, ordered as
    /// [`get_rack_hosts`](Self::get_rack_hosts).
    pub fn get_rack_node_points(&self, rack_id: u32) -> Vec<ResourcePoint> {
        self.racks[&rack_id]
            .hosts
            .iter()
            .map(|host_id| self.get_resource_point(*host_id))
            .collect()
    }

    /// Returns free-capacity fractions of all bandwidth units in the rack.
    pub fn get_rack_bandwidth_points(&self, rack_id: u32) -> Vec<BandwidthPoint> {
        self.racks[&rack_id]
            .bandwidth_units
            .iter()
            .map(|unit| unit.available as f64 / unit.total as f64)
            .collect()
    }
}
