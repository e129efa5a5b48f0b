//! Host collaborator boundary
//!
//! The pooling core never creates, moves or destroys anything itself. It asks
//! a [`PoolHost`] to do so: the host owns the actual instances (entities,
//! scene nodes, GPU objects...) and the pools only track their lifecycle.
//!
//! The crate ships [`EcsHost`](crate::ecs::EcsHost), a host built on `hecs`.

use glam::{Quat, Vec3};
use hecs::Entity;

use crate::core::PoolResult;
use crate::pool::PrototypeKey;

/// Which lifecycle notification is being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// The instance was handed out
    Spawn,
    /// The instance went back to its pool
    Despawn,
}

impl Lifecycle {
    /// Name used for message-based delivery
    #[must_use]
    pub const fn message_name(self) -> &'static str {
        match self {
            Self::Spawn => "OnSpawn",
            Self::Despawn => "OnDespawn",
        }
    }
}

/// How far a notification travels through an instance's hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reach {
    /// The instance only
    Instance,
    /// The instance and every descendant
    Descendants,
}

/// Where a spawned instance is put.
///
/// `position` and `rotation` are world-space when there is no parent or when
/// `world_position_stays` is set. Otherwise they are local to the parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Position
    pub position: Vec3,
    /// Rotation
    pub rotation: Quat,
    /// Optional parent
    pub parent: Option<Entity>,
    /// Interpret position/rotation in world space even with a parent
    pub world_position_stays: bool,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            parent: None,
            world_position_stays: false,
        }
    }
}

impl Placement {
    /// World-space position and rotation, no parent
    #[must_use]
    pub fn at(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Local origin of a parent
    #[must_use]
    pub fn under(parent: Entity) -> Self {
        Self {
            parent: Some(parent),
            ..Default::default()
        }
    }

    /// Attach to a parent
    #[must_use]
    pub fn with_parent(mut self, parent: Entity, world_position_stays: bool) -> Self {
        self.parent = Some(parent);
        self.world_position_stays = world_position_stays;
        self
    }
}

/// Everything the pools need from the outside world.
///
/// Calls arrive synchronously from the thread driving the registry.
/// Implementations must not call back into the registry from inside these
/// methods; lifecycle hooks that want to spawn or despawn should queue the
/// request and let the game loop issue it afterwards.
pub trait PoolHost {
    /// Can this prototype be instantiated?
    fn has_prototype(&self, prototype: &PrototypeKey) -> bool;

    /// Create a new, active instance of a prototype.
    ///
    /// # Errors
    ///
    /// Returns `MissingPrototype` if the prototype is unknown.
    fn instantiate(&mut self, prototype: &PrototypeKey) -> PoolResult<Entity>;

    /// Destroy an instance. `immediate` is a hint: a host may defer the
    /// reclamation to the end of the frame when it is false.
    fn destroy(&mut self, instance: Entity, immediate: bool);

    /// Does the instance still exist?
    fn is_alive(&self, instance: Entity) -> bool;

    /// Activate or deactivate an instance
    fn set_active(&mut self, instance: Entity, active: bool);

    /// Move an instance and set its parent
    fn apply_placement(&mut self, instance: Entity, placement: &Placement);

    /// Detach an instance from its parent
    fn clear_parent(&mut self, instance: Entity);

    /// Park an instance under the container of its pool
    fn attach_to_pool(&mut self, instance: Entity, prototype: &PrototypeKey);

    /// Deliver lifecycle hooks attached to the instance (and descendants)
    fn invoke_hooks(&mut self, instance: Entity, lifecycle: Lifecycle, reach: Reach);

    /// Deliver a named message. Missing receivers are not an error.
    fn send_message(&mut self, instance: Entity, message: &str, reach: Reach);

    /// Placement used when a spawn does not specify one
    fn default_placement(&self, _prototype: &PrototypeKey) -> Placement {
        Placement::default()
    }

    /// Called after a pool and all its instances were destroyed
    fn on_pool_destroyed(&mut self, _prototype: &PrototypeKey) {}
}
