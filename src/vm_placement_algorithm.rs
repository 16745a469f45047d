//! VM placement algorithm interface.

use serde::Serialize;
use thiserror::Error;

use crate::common::{Allocation, ResourcePoint};
use crate::config::parse_config_value;
use crate::resource_pool::ResourcePoolState;
use crate::vm_placement_algorithms::best_fit::BestFit;
use crate::vm_placement_algorithms::first_fit::FirstFit;
use crate::vm_placement_algorithms::worst_fit::WorstFit;

/// Outcome of a successful placement decision.
///
/// `bandwidth_unit` is set by rack-aware algorithms that bind the VM to a
/// specific bandwidth unit of the chosen host's rack; the caller owning the
/// VM record is expected to store it alongside the VM.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PlacementDecision {
    pub host_id: u32,
    pub bandwidth_unit: Option<usize>,
}

impl PlacementDecision {
    pub fn on_host(host_id: u32) -> Self {
        Self {
            host_id,
            bandwidth_unit: None,
        }
    }

    pub fn on_host_unit(host_id: u32, bandwidth_unit: usize) -> Self {
        Self {
            host_id,
            bandwidth_unit: Some(bandwidth_unit),
        }
    }
}

/// Fatal conditions encountered while deciding a placement.
///
/// An infeasible placement is not an error: algorithms report it as
/// `Ok(None)` and the external scheduler decides whether to requeue or
/// reject the VM.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    /// A post-placement free fraction went negative on a host that passed
    /// the suitability check, so the coarse check and the exact demand
    /// disagree about the host's capacity.
    #[error("post-placement {resource} fraction {fraction} on host #{host_id} is negative")]
    InconsistentSnapshot {
        host_id: u32,
        resource: &'static str,
        fraction: f64,
    },
    /// The valuation function returned NaN or an infinity. The engine cannot
    /// rank candidates with a misbehaving valuation oracle.
    #[error("valuation function returned a non-finite value: {value}")]
    NonFiniteValuation { value: f64 },
}

/// Checks the valuation oracle's output before it is used for ranking.
pub(crate) fn ensure_finite(value: f64) -> Result<f64, PlacementError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PlacementError::NonFiniteValuation { value })
    }
}

/// Rejects post-placement points with negative coordinates: the suitability
/// check passed, so a negative free fraction means the snapshot and the
/// exact demand disagree.
pub(crate) fn check_after_point(host_id: u32, point: ResourcePoint) -> Result<(), PlacementError> {
    if point.cpu < 0. {
        return Err(PlacementError::InconsistentSnapshot {
            host_id,
            resource: "CPU",
            fraction: point.cpu,
        });
    }
    if point.memory < 0. {
        return Err(PlacementError::InconsistentSnapshot {
            host_id,
            resource: "memory",
            fraction: point.memory,
        });
    }
    Ok(())
}

/// Trait for implementation of VM placement algorithms.
///
/// The algorithm is defined as a function of VM allocation request and
/// current resource pool state, which returns the placement selected for the
/// VM or `None` if there is no suitable host. The pool state is read-only
/// during the decision; applying the decision via
/// [`ResourcePoolState::allocate`] is the caller's responsibility.
///
/// It is possible to implement arbitrary placement algorithm and use it in
/// an external scheduler.
pub trait VmPlacementAlgorithm {
    fn select_host(
        &self,
        alloc: &Allocation,
        pool_state: &ResourcePoolState,
    ) -> Result<Option<PlacementDecision>, PlacementError>;
}

/// Resolves valuation-free algorithms from a config string such as
/// `"FirstFit"`. Valuation-driven algorithms carry caller-supplied function
/// capabilities and are constructed programmatically instead.
pub fn placement_algorithm_resolver(config_str: String) -> Box<dyn VmPlacementAlgorithm> {
    let (algorithm_name, _options) = parse_config_value(&config_str);
    match algorithm_name.as_str() {
        "FirstFit" => Box::new(FirstFit::new()),
        "BestFit" => Box::new(BestFit::new()),
        "WorstFit" => Box::new(WorstFit::new()),
        _ => panic!("Can't resolve: {}", config_str),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_cpu_fraction_is_reported() {
        let result = check_after_point(7, ResourcePoint::new(-0.125, 0.5));
        assert_eq!(
            result,
            Err(PlacementError::InconsistentSnapshot {
                host_id: 7,
                resource: "CPU",
                fraction: -0.125,
            })
        );
    }

    #[test]
    fn negative_memory_fraction_is_reported() {
        let result = check_after_point(3, ResourcePoint::new(0.5, -0.25));
        assert_eq!(
            result,
            Err(PlacementError::InconsistentSnapshot {
                host_id: 3,
                resource: "memory",
                fraction: -0.25,
            })
        );
    }

    #[test]
    fn zero_and_positive_fractions_pass() {
        assert_eq!(check_after_point(1, ResourcePoint::new(0., 0.)), Ok(()));
        assert_eq!(check_after_point(1, ResourcePoint::new(0.5, 0.25)), Ok(()));
    }
}
