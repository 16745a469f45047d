#![doc = include_str!("../readme.md")]

pub mod common;
pub mod config;
pub mod resource_pool;
pub mod valuation;
pub mod valuations;
pub mod vm_placement_algorithm;
pub mod vm_placement_algorithms;
pub mod vm_types;
