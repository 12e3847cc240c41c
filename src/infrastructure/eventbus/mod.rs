//! Event transport adapters

pub mod memory;

pub use memory::{InMemoryEventBus, Subscription};
