//! Instance handles and the registry resolving instances to them
//!
//! Every instance created by a pool gets a [`Handle`] recording its status and
//! owning prototype. The [`HandleRegistry`] is the only authority on whether
//! an instance is pool-managed: an instance missing from it is foreign, or
//! was disposed and must not be touched through the pool API again.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use hecs::Entity;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::host::PoolHost;

// ============================================================================
// Prototype Key
// ============================================================================

/// Stable identity of the template a pool instantiates from.
///
/// Cloning is cheap (shared string), so keys can be stored in handles and
/// events freely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PrototypeKey(Arc<str>);

impl PrototypeKey {
    /// Create a key from a name
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrototypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PrototypeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PrototypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PrototypeKey {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<PrototypeKey> for String {
    fn from(key: PrototypeKey) -> Self {
        key.0.to_string()
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Lifecycle status of a pooled instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HandleStatus {
    /// Parked in its pool, ready to be spawned
    #[default]
    Despawned,
    /// Handed out and counted against capacity
    Spawned,
    /// Handed out past capacity; destroyed on release, never recycled
    SpawnedOverCapacity,
}

/// A pool's record of one managed instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    instance: Entity,
    prototype: PrototypeKey,
    status: HandleStatus,
    registered: bool,
}

impl Handle {
    /// Create an unregistered handle
    #[must_use]
    pub fn new(instance: Entity, prototype: PrototypeKey, status: HandleStatus) -> Self {
        Self {
            instance,
            prototype,
            status,
            registered: false,
        }
    }

    /// The managed instance
    #[must_use]
    pub const fn instance(&self) -> Entity {
        self.instance
    }

    /// Prototype of the owning pool
    #[must_use]
    pub const fn prototype(&self) -> &PrototypeKey {
        &self.prototype
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> HandleStatus {
        self.status
    }

    /// Whether the handle is reachable through the registry
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Whether the instance is currently handed out
    #[must_use]
    pub const fn is_spawned(&self) -> bool {
        !matches!(self.status, HandleStatus::Despawned)
    }

    pub(crate) fn set_status(&mut self, status: HandleStatus) {
        self.status = status;
    }

    /// Destroy the instance through the host. The handle is consumed and
    /// returned unregistered.
    pub(crate) fn dispose<H: PoolHost + ?Sized>(mut self, host: &mut H, immediate: bool) -> Self {
        host.destroy(self.instance, immediate);
        self.registered = false;
        self
    }
}

// ============================================================================
// Handle Registry
// ============================================================================

/// Maps instances to their handles.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: FxHashMap<Entity, Handle>,
}

impl HandleRegistry {
    /// Default number of handles reserved up front.
    const DEFAULT_CAPACITY: usize = 128;

    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        let mut handles = FxHashMap::default();
        handles.reserve(Self::DEFAULT_CAPACITY);
        Self { handles }
    }

    /// Record a handle. A second registration of the same instance replaces
    /// the first and is reported in debug builds.
    pub fn register(&mut self, mut handle: Handle) {
        handle.registered = true;
        let previous = self.handles.insert(handle.instance, handle);
        debug_assert!(previous.is_none(), "instance registered twice");
    }

    /// Remove a handle, returning it unregistered
    pub fn unregister(&mut self, instance: Entity) -> Option<Handle> {
        self.handles.remove(&instance).map(|mut handle| {
            handle.registered = false;
            handle
        })
    }

    /// Unregister and destroy an instance
    pub fn dispose<H: PoolHost + ?Sized>(
        &mut self,
        instance: Entity,
        host: &mut H,
        immediate: bool,
    ) -> Option<Handle> {
        self.unregister(instance)
            .map(|handle| handle.dispose(host, immediate))
    }

    /// Get a handle
    #[must_use]
    #[inline]
    pub fn get(&self, instance: Entity) -> Option<&Handle> {
        self.handles.get(&instance)
    }

    pub(crate) fn get_mut(&mut self, instance: Entity) -> Option<&mut Handle> {
        self.handles.get_mut(&instance)
    }

    /// Is the instance pool-managed?
    #[must_use]
    #[inline]
    pub fn contains(&self, instance: Entity) -> bool {
        self.handles.contains_key(&instance)
    }

    /// Status of a managed instance
    #[must_use]
    #[inline]
    pub fn status_of(&self, instance: Entity) -> Option<HandleStatus> {
        self.handles.get(&instance).map(Handle::status)
    }

    /// Number of registered handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if no handle is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Forget every handle without destroying instances
    pub fn clear(&mut self) {
        self.handles.clear();
    }

    /// Iterate over all handles
    pub fn iter(&self) -> impl Iterator<Item = &Handle> {
        self.handles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(count: usize) -> Vec<Entity> {
        let mut world = hecs::World::new();
        (0..count).map(|_| world.spawn(())).collect()
    }

    #[test]
    fn test_register_and_lookup() {
        let e = entities(2);
        let mut registry = HandleRegistry::new();

        registry.register(Handle::new(e[0], "crate".into(), HandleStatus::Spawned));

        assert!(registry.contains(e[0]));
        assert!(!registry.contains(e[1]));
        assert_eq!(registry.status_of(e[0]), Some(HandleStatus::Spawned));
        assert!(registry.get(e[0]).unwrap().is_registered());
        assert_eq!(registry.get(e[0]).unwrap().prototype().as_str(), "crate");
    }

    #[test]
    fn test_unregister_clears_flag() {
        let e = entities(1);
        let mut registry = HandleRegistry::new();
        registry.register(Handle::new(e[0], "crate".into(), HandleStatus::Despawned));

        let handle = registry.unregister(e[0]).unwrap();
        assert!(!handle.is_registered());
        assert!(registry.is_empty());
        assert!(registry.unregister(e[0]).is_none());
    }

    #[test]
    fn test_prototype_key_borrow() {
        let mut map = FxHashMap::default();
        map.insert(PrototypeKey::new("spark"), 3);
        assert_eq!(map.get("spark"), Some(&3));
        assert_eq!(PrototypeKey::from("spark").to_string(), "spark");
    }

    #[test]
    fn test_prototype_key_serde() {
        let key = PrototypeKey::new("rock");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"rock\"");
        let back: PrototypeKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
