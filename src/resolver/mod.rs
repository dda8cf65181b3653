//! Health view resolution.
//!
//! The join from a node to its health views belongs to the storage engine.
//! This module defines the boundary trait and ships an in-memory catalog that
//! implements it for tests, benchmarks and embedded use.

mod memory;
mod traits;

pub use memory::MemoryCatalog;
pub use traits::{CatalogSnapshot, HealthResolver, ViewFilter};
