//! Interfaces of the services templates talk to, with in-memory
//! implementations.
//!
//! Both report through an [`EventEmitter`](crate::EventEmitter), so a scope
//! can re-render on their events with [`Scope::watch`](crate::Scope::watch).

mod history;
mod storage;

pub use history::{Location, MemoryHistory, Navigator, LOCATION_EVENT};
pub use storage::{KeyRange, MemoryStorage, MemoryStore, Storage, Store, ERROR_EVENT, OPEN_EVENT};
