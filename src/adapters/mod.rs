//! Adapters for storage and text generation.

pub mod generators;
pub mod json_store;
pub mod memory;
