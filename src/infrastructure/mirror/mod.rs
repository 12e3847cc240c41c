//! Order-book mirror adapters

pub mod memory;

pub use memory::{InMemorySortedSetMirror, NoopMirror};
