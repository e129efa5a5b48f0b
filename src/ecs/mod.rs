//! ECS pool host
//!
//! A [`PoolHost`](crate::host::PoolHost) built on top of the hecs ECS
//! library: prefab templates, activation, transform hierarchy, lifecycle
//! hooks, named messages and despawn timers.

mod components;
mod hierarchy;
mod timer;
mod world;

pub use components::{Inactive, LifecycleHooks, MessageHandlers, Name, Transform};
pub use hierarchy::{Children, GlobalTransform, Parent};
pub use timer::DespawnTimer;
pub use world::EcsHost;
