//! Components used by the ECS host

use std::borrow::Cow;
use std::fmt;

use glam::{Mat4, Quat, Vec3};
use hecs::Entity;
use smallvec::SmallVec;

/// Transform component for position, rotation, and scale.
///
/// Relative to the [`Parent`](super::Parent) when there is one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position
    pub position: Vec3,
    /// Rotation as a quaternion
    pub rotation: Quat,
    /// Scale factor
    pub scale: Vec3,
}

impl Transform {
    /// Create a new transform at the origin
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transform with just a position
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    #[must_use]
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Create a transform from a matrix
    #[must_use]
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Get the transformation matrix
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Name component for debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(pub String);

impl Name {
    /// Create a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Marker for deactivated entities. Descendants of an inactive entity are
/// inactive too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inactive;

type Hook = Box<dyn FnMut(Entity) + Send + Sync>;

/// Spawn/despawn hooks of an entity.
///
/// Hooks only see the entity. To spawn or despawn from a hook, queue the
/// request (e.g. through a channel) and issue it after the registry call
/// returns.
#[derive(Default)]
pub struct LifecycleHooks {
    on_spawn: Option<Hook>,
    on_despawn: Option<Hook>,
}

impl LifecycleHooks {
    /// No hooks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the spawn hook
    #[must_use]
    pub fn on_spawn(mut self, hook: impl FnMut(Entity) + Send + Sync + 'static) -> Self {
        self.on_spawn = Some(Box::new(hook));
        self
    }

    /// Set the despawn hook
    #[must_use]
    pub fn on_despawn(mut self, hook: impl FnMut(Entity) + Send + Sync + 'static) -> Self {
        self.on_despawn = Some(Box::new(hook));
        self
    }

    pub(crate) fn spawned(&mut self, entity: Entity) {
        if let Some(hook) = &mut self.on_spawn {
            hook(entity);
        }
    }

    pub(crate) fn despawned(&mut self, entity: Entity) {
        if let Some(hook) = &mut self.on_despawn {
            hook(entity);
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_spawn", &self.on_spawn.is_some())
            .field("on_despawn", &self.on_despawn.is_some())
            .finish()
    }
}

/// Handlers for named messages, looked up by name on delivery.
#[derive(Default)]
pub struct MessageHandlers(SmallVec<[(Cow<'static, str>, Hook); 2]>);

impl MessageHandlers {
    /// No handlers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for a message
    #[must_use]
    pub fn with(
        mut self,
        message: impl Into<Cow<'static, str>>,
        handler: impl FnMut(Entity) + Send + Sync + 'static,
    ) -> Self {
        self.0.push((message.into(), Box::new(handler)));
        self
    }

    /// Run every handler registered for `message`. Returns whether one ran.
    pub fn handle(&mut self, message: &str, entity: Entity) -> bool {
        let mut handled = false;
        for (name, handler) in &mut self.0 {
            if *name == message {
                handler(entity);
                handled = true;
            }
        }
        handled
    }
}

impl fmt::Debug for MessageHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|(name, _)| name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_transform_matrix_round_trip() {
        let transform = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            scale: Vec3::splat(2.0),
        };

        let back = Transform::from_matrix(transform.matrix());
        assert!(back.position.abs_diff_eq(transform.position, 1e-5));
        assert!(back.scale.abs_diff_eq(transform.scale, 1e-5));
    }

    #[test]
    fn test_message_handlers() {
        let mut world = hecs::World::new();
        let entity = world.spawn(());
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);

        let mut handlers = MessageHandlers::new().with("OnSpawn", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handlers.handle("OnSpawn", entity));
        assert!(!handlers.handle("OnDespawn", entity));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
