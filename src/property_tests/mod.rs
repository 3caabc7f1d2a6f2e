//! Crate-level property-based tests.
//!
//! Each sub-module drives a component with generated inputs and checks one
//! behavior that must hold for every input.

mod cleanup_properties;
mod resource_id_properties;
