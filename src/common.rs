//! Common data types.

use serde::Serialize;

/// Resource demand of a single VM placement request.
#[derive(Serialize, Clone)]
pub struct Allocation {
    pub id: u32,
    pub cpu_usage: u32,
    pub memory_usage: u64,
    /// Requested bandwidth on one of the rack's shared bandwidth units.
    /// Zero means the VM does not consume rack bandwidth.
    pub bandwidth_usage: u64,
}

/// Result of checking whether an allocation currently fits on a host.
#[derive(Debug, PartialEq)]
pub enum AllocationVerdict {
    NotEnoughCPU,
    NotEnoughMemory,
    NotEnoughBandwidth,
    Success,
    HostNotFound,
}

/// Free-capacity point of a host: fractions of CPU and memory capacity that
/// are currently unallocated (1 = fully free). Fractions can go negative on
/// overcommit, which the placement algorithms report as an inconsistency.
///
/// Used as the valuation cache key. Two points denote the same cache entry
/// only if both coordinates match bit-for-bit (`f64::to_bits`), so e.g. `0.0`
/// and `-0.0` are distinct keys. This exact-equality identity is intentional
/// and must not be replaced with a tolerance-based comparison.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ResourcePoint {
    pub cpu: f64,
    pub memory: f64,
}

impl ResourcePoint {
    pub fn new(cpu: f64, memory: f64) -> Self {
        Self { cpu, memory }
    }

    /// Bit-level identity of the point used for memoization.
    pub(crate) fn bits(&self) -> (u64, u64) {
        (self.cpu.to_bits(), self.memory.to_bits())
    }
}

/// Free-capacity fraction of one shared bandwidth unit.
pub type BandwidthPoint = f64;
