//! Entity hierarchy components
//!
//! Provides parent-child relationships between entities. Both sides are
//! stored ([`Parent`] on the child, [`Children`] on the parent) and kept in
//! sync by [`link`] and [`unlink`].

use glam::{Mat4, Quat, Vec3};
use hecs::{Entity, World};
use smallvec::SmallVec;

use super::components::{Inactive, Transform};

/// Parent component - indicates this entity has a parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

impl Parent {
    /// Get the parent entity
    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.0
    }
}

/// Children component - tracks all children of this entity
#[derive(Debug, Clone, Default)]
pub struct Children(pub SmallVec<[Entity; 8]>);

impl Children {
    /// Add a child
    pub fn add(&mut self, child: Entity) {
        if !self.0.contains(&child) {
            self.0.push(child);
        }
    }

    /// Remove a child
    pub fn remove(&mut self, child: Entity) -> bool {
        if let Some(pos) = self.0.iter().position(|&e| e == child) {
            self.0.remove(pos);
            true
        } else {
            false
        }
    }

    /// Check if this entity has children
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the number of children
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over children
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.iter()
    }
}

/// Global transform - computed world-space transform
#[derive(Debug, Clone, Copy)]
pub struct GlobalTransform {
    /// World-space transformation matrix
    pub matrix: Mat4,
}

impl GlobalTransform {
    /// Get world position
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.matrix.col(3).truncate()
    }

    /// Get world rotation
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.matrix.to_scale_rotation_translation().1
    }
}

impl Default for GlobalTransform {
    fn default() -> Self {
        Self {
            matrix: Mat4::IDENTITY,
        }
    }
}

// ============================================================================
// Hierarchy Operations
// ============================================================================

/// Make `child` a child of `parent`, detaching it from any previous parent.
/// Linking an entity under itself or one of its descendants is ignored.
pub fn link(world: &mut World, parent: Entity, child: Entity) {
    if parent == child || descendants(world, child).contains(&parent) {
        log::warn!("Refusing to parent {child:?} under its own descendant {parent:?}");
        return;
    }

    unlink(world, child);

    let added = world
        .get::<&mut Children>(parent)
        .map(|mut children| children.add(child))
        .is_ok();
    if !added {
        let _ = world.insert_one(parent, Children(SmallVec::from_slice(&[child])));
    }
    let _ = world.insert_one(child, Parent(parent));
}

/// Detach `child` from its parent, if any
pub fn unlink(world: &mut World, child: Entity) {
    let Ok(Parent(parent)) = world.remove_one::<Parent>(child) else {
        return;
    };
    if let Ok(mut children) = world.get::<&mut Children>(parent) {
        children.remove(child);
    }
}

/// Parent of an entity
#[must_use]
pub fn parent_of(world: &World, entity: Entity) -> Option<Entity> {
    world.get::<&Parent>(entity).ok().map(|p| p.entity())
}

/// All descendants of `root`, depth first, excluding `root`
#[must_use]
pub fn descendants(world: &World, root: Entity) -> SmallVec<[Entity; 8]> {
    let mut found = SmallVec::new();
    let mut stack: SmallVec<[Entity; 8]> = SmallVec::new();
    stack.push(root);

    while let Some(entity) = stack.pop() {
        if let Ok(children) = world.get::<&Children>(entity) {
            for &child in children.0.iter().rev() {
                found.push(child);
                stack.push(child);
            }
        }
    }
    found
}

/// World-space transform of an entity, walking up the parent chain
#[must_use]
pub fn global_transform(world: &World, entity: Entity) -> GlobalTransform {
    let mut matrix = Mat4::IDENTITY;
    let mut current = Some(entity);

    while let Some(e) = current {
        if let Ok(transform) = world.get::<&Transform>(e) {
            matrix = transform.matrix() * matrix;
        }
        current = parent_of(world, e);
    }

    GlobalTransform { matrix }
}

/// Is the entity active, taking its ancestors into account?
#[must_use]
pub fn is_active_in_hierarchy(world: &World, entity: Entity) -> bool {
    let mut current = Some(entity);
    while let Some(e) = current {
        if world.get::<&Inactive>(e).is_ok() {
            return false;
        }
        current = parent_of(world, e);
    }
    world.contains(entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_add_remove() {
        let mut world = World::new();
        let entity1 = world.spawn(());
        let entity2 = world.spawn(());

        let mut children = Children::default();

        children.add(entity1);
        children.add(entity2);
        assert_eq!(children.len(), 2);

        // No duplicates
        children.add(entity1);
        assert_eq!(children.len(), 2);

        children.remove(entity1);
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn test_link_and_reparent() {
        let mut world = World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let child = world.spawn(());

        link(&mut world, a, child);
        assert_eq!(parent_of(&world, child), Some(a));

        link(&mut world, b, child);
        assert_eq!(parent_of(&world, child), Some(b));
        assert!(world.get::<&Children>(a).unwrap().is_empty());
        assert_eq!(world.get::<&Children>(b).unwrap().len(), 1);

        unlink(&mut world, child);
        assert_eq!(parent_of(&world, child), None);
    }

    #[test]
    fn test_link_rejects_cycles() {
        let mut world = World::new();
        let root = world.spawn(());
        let child = world.spawn(());
        link(&mut world, root, child);

        link(&mut world, child, root);
        assert_eq!(parent_of(&world, root), None);
    }

    #[test]
    fn test_descendants() {
        let mut world = World::new();
        let root = world.spawn(());
        let child = world.spawn(());
        let grandchild = world.spawn(());
        link(&mut world, root, child);
        link(&mut world, child, grandchild);

        assert_eq!(descendants(&world, root).as_slice(), &[child, grandchild]);
        assert!(descendants(&world, grandchild).is_empty());
    }

    #[test]
    fn test_global_transform() {
        let mut world = World::new();
        let parent = world.spawn((Transform::from_position(Vec3::new(1.0, 2.0, 3.0)),));
        let child = world.spawn((Transform::from_position(Vec3::X),));
        link(&mut world, parent, child);

        let pos = global_transform(&world, child).position();
        assert!((pos.x - 2.0).abs() < 0.001);
        assert!((pos.y - 2.0).abs() < 0.001);
        assert!((pos.z - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_inactive_parent() {
        let mut world = World::new();
        let parent = world.spawn((Inactive,));
        let child = world.spawn(());
        link(&mut world, parent, child);

        assert!(!is_active_in_hierarchy(&world, child));
        world.remove_one::<Inactive>(parent).unwrap();
        assert!(is_active_in_hierarchy(&world, child));
    }
}
