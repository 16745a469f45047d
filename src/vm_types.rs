//! Table of known VM types used by the type-packing valuations.

use serde::{Deserialize, Serialize};

/// One known VM type. Demands are expressed as fractions: CPU and memory as
/// fractions of host capacity, bandwidth as a fraction of one bandwidth
/// unit's capacity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VmType {
    pub name: String,
    pub cpu: f64,
    pub memory: f64,
    #[serde(default)]
    pub bandwidth: f64,
    /// Observed instance count of this type in the workload. Types with zero
    /// count do not contribute to valuations.
    #[serde(default)]
    pub count: u32,
}

fn default_weight() -> f64 {
    1.
}

/// Explicit configuration object for the type-packing valuation family:
/// the known VM types plus the dimension weights used to value one instance
/// of a type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VmTypeTable {
    pub types: Vec<VmType>,
    #[serde(default = "default_weight")]
    pub cpu_weight: f64,
    #[serde(default = "default_weight")]
    pub memory_weight: f64,
    #[serde(default = "default_weight")]
    pub bandwidth_weight: f64,
}

impl VmTypeTable {
    pub fn new(types: Vec<VmType>) -> Self {
        Self {
            types,
            cpu_weight: 1.,
            memory_weight: 1.,
            bandwidth_weight: 1.,
        }
    }

    /// Loads the table from a YAML file.
    pub fn from_file(file_name: &str) -> Self {
        serde_yaml::from_str(
            &std::fs::read_to_string(file_name).unwrap_or_else(|_| panic!("Can't read file {}", file_name)),
        )
        .unwrap_or_else(|_| panic!("Can't parse YAML from file {}", file_name))
    }

    /// Weighted value of one instance of the type.
    pub fn type_value(&self, vm_type: &VmType) -> f64 {
        vm_type.cpu * self.cpu_weight + vm_type.memory * self.memory_weight + vm_type.bandwidth * self.bandwidth_weight
    }

    /// Types that contribute to valuations: observed at least once and with
    /// positive CPU and memory demand.
    pub fn active_types(&self) -> impl Iterator<Item = &VmType> {
        self.types
            .iter()
            .filter(|t| t.count > 0 && t.cpu > 0. && t.memory > 0.)
    }
}
