//! Instance pooling
//!
//! Pools keep warm instances of a prototype and hand them out instead of
//! creating and destroying them on demand. [`PoolRegistry`] is the entry
//! point; the other types are exposed for inspection and for building custom
//! registries.

mod delayed;
mod handle;
mod notify;
#[allow(clippy::module_inception)]
mod pool;
mod preset;
mod registry;

pub use delayed::{DelayedRelease, DelayedReleaseQueue, ScheduleOutcome};
pub use handle::{Handle, HandleRegistry, HandleStatus, PrototypeKey};
pub use notify::NotificationDispatcher;
pub use pool::{Acquired, InstanceSnapshot, Pool, PoolAccess, PoolStats, Populated, Released};
pub use preset::{PoolPreset, PoolsPreset};
pub use registry::{HostState, PoolRegistry};
