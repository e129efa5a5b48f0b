//! Pool host built on a hecs world
//!
//! Prototypes are registered as prefab templates: a build function spawning
//! the instance (and any children) into the world, plus an optional origin
//! used when a spawn does not specify a placement.

use glam::{Mat4, Vec3};
use hecs::{Entity, World};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::components::{Inactive, LifecycleHooks, MessageHandlers, Name, Transform};
use super::hierarchy::{self, GlobalTransform};
use super::timer::DespawnTimer;
use crate::core::{PoolError, PoolResult};
use crate::host::{Lifecycle, Placement, PoolHost, Reach};
use crate::pool::PrototypeKey;

type BuildFn = Box<dyn Fn(&mut World) -> Entity + Send + Sync>;

/// How to build instances of one prototype
struct PrefabTemplate {
    build: BuildFn,
    origin: Placement,
}

/// [`PoolHost`] over a `hecs::World`
pub struct EcsHost {
    world: World,
    templates: FxHashMap<PrototypeKey, PrefabTemplate>,
    /// Container entity per pool, created on first use
    pool_roots: FxHashMap<PrototypeKey, Entity>,
    /// Entities destroyed with `immediate == false`, reclaimed by `flush_destroyed`
    pending_destroy: FxHashSet<Entity>,
}

impl EcsHost {
    /// Create a host with an empty world
    #[must_use]
    pub fn new() -> Self {
        Self::with_world(World::new())
    }

    /// Create a host around an existing world
    #[must_use]
    pub fn with_world(world: World) -> Self {
        Self {
            world,
            templates: FxHashMap::default(),
            pool_roots: FxHashMap::default(),
            pending_destroy: FxHashSet::default(),
        }
    }

    /// Register a prefab. Replaces any previous template of the same key.
    pub fn register_prefab(
        &mut self,
        prototype: impl Into<PrototypeKey>,
        build: impl Fn(&mut World) -> Entity + Send + Sync + 'static,
    ) {
        self.register_prefab_with_origin(prototype, Placement::default(), build);
    }

    /// Register a prefab with the placement used by spawns that give none
    pub fn register_prefab_with_origin(
        &mut self,
        prototype: impl Into<PrototypeKey>,
        origin: Placement,
        build: impl Fn(&mut World) -> Entity + Send + Sync + 'static,
    ) {
        let prototype = prototype.into();
        log::debug!("Registered prefab '{prototype}'");
        self.templates.insert(
            prototype,
            PrefabTemplate {
                build: Box::new(build),
                origin,
            },
        );
    }

    /// Reclaim entities whose destruction was deferred. Call at the end of
    /// the frame.
    pub fn flush_destroyed(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_destroy);
        let mut count = 0;
        for entity in pending {
            if self.world.contains(entity) {
                self.despawn_recursive(entity);
                count += 1;
            }
        }
        count
    }

    /// Number of entities waiting for `flush_destroyed`
    #[must_use]
    pub fn pending_destroy_count(&self) -> usize {
        self.pending_destroy.len()
    }

    fn despawn_recursive(&mut self, entity: Entity) {
        hierarchy::unlink(&mut self.world, entity);
        let descendants = hierarchy::descendants(&self.world, entity);
        let _ = self.world.despawn(entity);
        for descendant in descendants {
            let _ = self.world.despawn(descendant);
        }
    }

    /// Parent an entity, keeping its current local transform
    pub fn link(world: &mut World, parent: Entity, child: Entity) {
        hierarchy::link(world, parent, child);
    }

    /// Parent of an entity
    #[must_use]
    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        hierarchy::parent_of(&self.world, entity)
    }

    /// Container entity of a pool, if created
    #[must_use]
    pub fn pool_root(&self, prototype: &PrototypeKey) -> Option<Entity> {
        self.pool_roots.get(prototype).copied()
    }

    /// World-space transform of an entity
    #[must_use]
    pub fn global_transform(&self, entity: Entity) -> GlobalTransform {
        hierarchy::global_transform(&self.world, entity)
    }

    /// Is the entity active, taking its ancestors into account?
    #[must_use]
    pub fn is_active(&self, entity: Entity) -> bool {
        hierarchy::is_active_in_hierarchy(&self.world, entity)
    }

    /// Get a reference to the world
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get a mutable reference to the world
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn targets(&self, instance: Entity, reach: Reach) -> SmallVec<[Entity; 8]> {
        let mut targets = SmallVec::new();
        targets.push(instance);
        if reach == Reach::Descendants {
            targets.extend(hierarchy::descendants(&self.world, instance));
        }
        targets
    }

    fn reset_timer(&mut self, entity: Entity) {
        if let Ok(mut timer) = self.world.get::<&mut DespawnTimer>(entity) {
            timer.reset();
        }
    }
}

impl Default for EcsHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolHost for EcsHost {
    fn has_prototype(&self, prototype: &PrototypeKey) -> bool {
        self.templates.contains_key(prototype)
    }

    fn instantiate(&mut self, prototype: &PrototypeKey) -> PoolResult<Entity> {
        let template = self
            .templates
            .get(prototype)
            .ok_or_else(|| PoolError::MissingPrototype(prototype.clone()))?;
        let entity = (template.build)(&mut self.world);

        if self.world.get::<&Transform>(entity).is_err() {
            let _ = self.world.insert_one(entity, Transform::default());
        }
        if self.world.get::<&Name>(entity).is_err() {
            let _ = self.world.insert_one(entity, Name::new(prototype.as_str()));
        }
        Ok(entity)
    }

    fn destroy(&mut self, instance: Entity, immediate: bool) {
        if immediate {
            self.pending_destroy.remove(&instance);
            self.despawn_recursive(instance);
        } else {
            self.pending_destroy.insert(instance);
        }
    }

    fn is_alive(&self, instance: Entity) -> bool {
        self.world.contains(instance) && !self.pending_destroy.contains(&instance)
    }

    fn set_active(&mut self, instance: Entity, active: bool) {
        if active {
            let _ = self.world.remove_one::<Inactive>(instance);
        } else {
            let _ = self.world.insert_one(instance, Inactive);
        }
        self.reset_timer(instance);
    }

    fn apply_placement(&mut self, instance: Entity, placement: &Placement) {
        let scale = self
            .world
            .get::<&Transform>(instance)
            .map(|t| t.scale)
            .unwrap_or(Vec3::ONE);
        let world_matrix = Mat4::from_scale_rotation_translation(
            scale,
            placement.rotation,
            placement.position,
        );

        let local = match placement.parent {
            Some(parent) => {
                hierarchy::link(&mut self.world, parent, instance);
                if placement.world_position_stays {
                    let parent_matrix = hierarchy::global_transform(&self.world, parent).matrix;
                    Transform::from_matrix(parent_matrix.inverse() * world_matrix)
                } else {
                    Transform {
                        position: placement.position,
                        rotation: placement.rotation,
                        scale,
                    }
                }
            }
            None => {
                hierarchy::unlink(&mut self.world, instance);
                Transform::from_matrix(world_matrix)
            }
        };

        let _ = self.world.insert_one(instance, local);
    }

    fn clear_parent(&mut self, instance: Entity) {
        hierarchy::unlink(&mut self.world, instance);
    }

    fn attach_to_pool(&mut self, instance: Entity, prototype: &PrototypeKey) {
        let root = match self.pool_roots.get(prototype) {
            Some(&root) if self.world.contains(root) => root,
            _ => {
                let root = self.world.spawn((
                    Name::new(format!("[Pool] {prototype}")),
                    Transform::default(),
                ));
                self.pool_roots.insert(prototype.clone(), root);
                root
            }
        };
        hierarchy::link(&mut self.world, root, instance);
    }

    fn invoke_hooks(&mut self, instance: Entity, lifecycle: Lifecycle, reach: Reach) {
        for target in self.targets(instance, reach) {
            if let Ok(mut hooks) = self.world.get::<&mut LifecycleHooks>(target) {
                match lifecycle {
                    Lifecycle::Spawn => hooks.spawned(target),
                    Lifecycle::Despawn => hooks.despawned(target),
                }
            }
            if lifecycle == Lifecycle::Spawn {
                self.reset_timer(target);
            }
        }
    }

    fn send_message(&mut self, instance: Entity, message: &str, reach: Reach) {
        for target in self.targets(instance, reach) {
            if let Ok(mut handlers) = self.world.get::<&mut MessageHandlers>(target) {
                handlers.handle(message, target);
            }
            if message == Lifecycle::Spawn.message_name() {
                self.reset_timer(target);
            }
        }
    }

    fn default_placement(&self, prototype: &PrototypeKey) -> Placement {
        self.templates
            .get(prototype)
            .map_or_else(Placement::default, |t| t.origin)
    }

    fn on_pool_destroyed(&mut self, prototype: &PrototypeKey) {
        if let Some(root) = self.pool_roots.remove(prototype) {
            self.destroy(root, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;

    fn host() -> EcsHost {
        let mut host = EcsHost::new();
        host.register_prefab("crate", |world| world.spawn(()));
        host
    }

    #[test]
    fn test_instantiate_adds_defaults() {
        let mut host = host();
        let key = PrototypeKey::new("crate");

        let entity = host.instantiate(&key).unwrap();

        assert!(host.world().get::<&Transform>(entity).is_ok());
        assert_eq!(host.world().get::<&Name>(entity).unwrap().0, "crate");
        assert_eq!(
            host.instantiate(&PrototypeKey::new("missing")),
            Err(PoolError::MissingPrototype(PrototypeKey::new("missing")))
        );
    }

    #[test]
    fn test_deferred_destroy() {
        let mut host = host();
        let entity = host.instantiate(&PrototypeKey::new("crate")).unwrap();

        host.destroy(entity, false);
        assert!(!host.is_alive(entity));
        assert!(host.world().contains(entity));

        assert_eq!(host.flush_destroyed(), 1);
        assert!(!host.world().contains(entity));
    }

    #[test]
    fn test_deferred_destroy_deduplicates() {
        let mut host = host();
        let key = PrototypeKey::new("crate");
        let entities: Vec<Entity> = (0..100).map(|_| host.instantiate(&key).unwrap()).collect();

        for &entity in entities.iter().chain(&entities) {
            host.destroy(entity, false);
        }
        assert_eq!(host.pending_destroy_count(), 100);

        host.destroy(entities[0], true);
        assert_eq!(host.pending_destroy_count(), 99);
        assert!(entities.iter().all(|&e| !host.is_alive(e)));

        assert_eq!(host.flush_destroyed(), 99);
        assert_eq!(host.pending_destroy_count(), 0);
    }

    #[test]
    fn test_destroy_removes_children() {
        let mut host = host();
        let parent = host.world_mut().spawn(());
        let child = host.world_mut().spawn(());
        EcsHost::link(host.world_mut(), parent, child);

        host.destroy(parent, true);
        assert!(!host.world().contains(child));
    }

    #[test]
    fn test_set_active() {
        let mut host = host();
        let entity = host.instantiate(&PrototypeKey::new("crate")).unwrap();

        host.set_active(entity, false);
        assert!(!host.is_active(entity));
        host.set_active(entity, true);
        assert!(host.is_active(entity));
    }

    #[test]
    fn test_placement_world_position_stays() {
        let mut host = host();
        let parent = host
            .world_mut()
            .spawn((Transform::from_position(Vec3::new(10.0, 0.0, 0.0)),));
        let entity = host.instantiate(&PrototypeKey::new("crate")).unwrap();

        let placement =
            Placement::at(Vec3::new(12.0, 1.0, 0.0), Quat::IDENTITY).with_parent(parent, true);
        host.apply_placement(entity, &placement);

        assert_eq!(host.parent_of(entity), Some(parent));
        let local = *host.world().get::<&Transform>(entity).unwrap();
        assert!(local.position.abs_diff_eq(Vec3::new(2.0, 1.0, 0.0), 1e-4));
        let world = host.global_transform(entity).position();
        assert!(world.abs_diff_eq(Vec3::new(12.0, 1.0, 0.0), 1e-4));
    }

    #[test]
    fn test_placement_local_to_parent() {
        let mut host = host();
        let parent = host
            .world_mut()
            .spawn((Transform::from_position(Vec3::new(10.0, 0.0, 0.0)),));
        let entity = host.instantiate(&PrototypeKey::new("crate")).unwrap();

        host.apply_placement(
            entity,
            &Placement::at(Vec3::Y, Quat::IDENTITY).with_parent(parent, false),
        );
        let world = host.global_transform(entity).position();
        assert!(world.abs_diff_eq(Vec3::new(10.0, 1.0, 0.0), 1e-4));

        host.apply_placement(entity, &Placement::at(Vec3::Z, Quat::IDENTITY));
        assert_eq!(host.parent_of(entity), None);
    }

    #[test]
    fn test_attach_to_pool_creates_root() {
        let mut host = host();
        let key = PrototypeKey::new("crate");
        let a = host.instantiate(&key).unwrap();
        let b = host.instantiate(&key).unwrap();

        host.attach_to_pool(a, &key);
        host.attach_to_pool(b, &key);

        let root = host.pool_root(&key).unwrap();
        assert_eq!(host.parent_of(a), Some(root));
        assert_eq!(host.parent_of(b), Some(root));
        assert_eq!(host.world().get::<&Name>(root).unwrap().0, "[Pool] crate");

        host.on_pool_destroyed(&key);
        assert!(host.pool_root(&key).is_none());
    }

    #[test]
    fn test_default_placement_from_origin() {
        let mut host = EcsHost::new();
        let origin = Placement::at(Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY);
        host.register_prefab_with_origin("lamp", origin, |world| world.spawn(()));

        assert_eq!(host.default_placement(&PrototypeKey::new("lamp")), origin);
        assert_eq!(
            host.default_placement(&PrototypeKey::new("other")),
            Placement::default()
        );
    }
}
