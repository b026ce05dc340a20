//! Persistence Adapters
//!
//! Implementations of the state store port.

pub mod in_memory;

pub use in_memory::InMemoryStateStore;
