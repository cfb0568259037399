//! Synchronization helpers shared by the poll engine.

mod keyed_lock;

pub use keyed_lock::{KeyedGuard, KeyedLock};
