//! Implementations of VM placement algorithms.

pub mod best_fit;
pub mod first_fit;
pub mod marginal_value;
pub mod rack_joint_value;
pub mod rack_split_value;
pub mod worst_fit;
