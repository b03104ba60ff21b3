//! Storage layer: the object-store abstraction and the in-memory backend.

mod memory;
mod traits;

pub use memory::{CompartmentRecord, InMemoryStore, StoreDump};
pub use traits::{OrthologyStore, ReferenceDatabase};
