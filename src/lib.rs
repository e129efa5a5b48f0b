//! Runtime instance pooling
//!
//! This crate keeps warm instances of expensive prototypes in per-prototype
//! pools and hands them out instead of creating and destroying them on
//! demand:
//!
//! - Capacity management with configurable overflow behaviour
//! - Delayed despawns advanced by a per-frame tick
//! - Spawn/despawn notifications (hooks or named messages)
//! - Persistent pools surviving scene resets
//! - A reference host built on the hecs ECS

pub mod core;
pub mod ecs;
pub mod host;
pub mod pool;

// Re-exports for convenience
pub use glam;
pub use hecs;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::core::{
        DelayedConflictPolicy, NotificationMode, OverflowPolicy, PoolError, PoolEvent, PoolResult,
        PoolSettings, RegistryConfig, ReleasePolicy,
    };
    pub use crate::ecs::{DespawnTimer, EcsHost, LifecycleHooks, MessageHandlers, Name, Transform};
    pub use crate::host::{Lifecycle, Placement, PoolHost, Reach};
    pub use crate::pool::{HandleStatus, Pool, PoolRegistry, PoolsPreset, PrototypeKey};
    pub use glam::{Quat, Vec3};
    pub use hecs::Entity;
}
