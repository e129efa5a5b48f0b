//! Per-prototype instance pool
//!
//! A [`Pool`] owns two ordered lists of instances:
//!
//! - `spawned`: handed out, oldest first (the front is evicted by `Recycle`)
//! - `despawned`: parked, oldest first (the front is reused next, FIFO)
//!
//! Their combined length is the managed count and never exceeds the
//! capacity. Over-capacity instances created by the `Instantiate` overflow
//! policies live in neither list; they are only known to the
//! [`HandleRegistry`] and are destroyed when released.
//!
//! The pool does not own the host, the handle registry or the event queue.
//! Operations that need them take a [`PoolAccess`] borrowed from the
//! registry.

use std::collections::VecDeque;

use hecs::Entity;
use smallvec::SmallVec;

use crate::core::{
    EventQueue, NotificationMode, OverflowPolicy, PoolError, PoolEvent, PoolResult, PoolSettings,
    ReleasePolicy,
};
use crate::host::{Lifecycle, PoolHost};
use crate::pool::handle::{Handle, HandleRegistry, HandleStatus, PrototypeKey};
use crate::pool::notify::NotificationDispatcher;

/// Snapshot buffer used by bulk operations
pub type InstanceSnapshot = SmallVec<[Entity; 16]>;

// ============================================================================
// Pool Access
// ============================================================================

/// Mutable collaborators a pool operates on.
pub struct PoolAccess<'a, H: PoolHost + ?Sized> {
    /// Creates, moves and destroys instances
    pub host: &'a mut H,
    /// Instance to handle lookup
    pub handles: &'a mut HandleRegistry,
    /// Where pool events are reported
    pub events: &'a mut EventQueue,
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of [`Pool::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// Oldest despawned instance, reactivated
    Reused(Entity),
    /// Freshly instantiated managed instance
    Created(Entity),
    /// Oldest spawned instance, handed out again without a despawn
    Recycled(Entity),
    /// Unmanaged instance created past capacity
    OverCapacity(Entity),
    /// Nothing could be handed out
    Empty,
}

impl Acquired {
    /// The acquired instance, if any
    #[must_use]
    pub const fn instance(self) -> Option<Entity> {
        match self {
            Self::Reused(e) | Self::Created(e) | Self::Recycled(e) | Self::OverCapacity(e) => {
                Some(e)
            }
            Self::Empty => None,
        }
    }

    /// No instance was produced
    #[must_use]
    pub const fn is_nullable(self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Outcome of [`Pool::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// Parked in the despawned list
    Parked,
    /// Over-capacity instance, destroyed
    Destroyed,
    /// Was already despawned, nothing done
    AlreadyDespawned,
}

/// Outcome of [`Pool::populate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Populated {
    /// Instances created
    pub created: usize,
    /// Population stopped because the pool is full
    pub capacity_reached: bool,
}

/// Per-pool counters, reset by [`Pool::destroy_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Instances created from the prototype
    pub instantiated: u64,
    /// Successful spawns
    pub spawns: u64,
    /// Successful despawns
    pub despawns: u64,
    /// Spawns plus despawns
    pub total_actions: u64,
}

// ============================================================================
// Pool
// ============================================================================

/// Pool of instances of one prototype.
#[derive(Debug)]
pub struct Pool {
    prototype: PrototypeKey,
    settings: PoolSettings,
    dispatcher: NotificationDispatcher,
    spawned: VecDeque<Entity>,
    despawned: VecDeque<Entity>,
    stats: PoolStats,
}

impl Pool {
    /// Create an empty pool. Preloading is done separately with
    /// [`populate`](Self::populate).
    #[must_use]
    pub fn new(prototype: PrototypeKey, mut settings: PoolSettings) -> Self {
        settings.preload = settings.preload.min(settings.capacity);
        Self {
            prototype,
            dispatcher: NotificationDispatcher::new(settings.notification),
            spawned: VecDeque::with_capacity(settings.capacity),
            despawned: VecDeque::with_capacity(settings.capacity),
            settings,
            stats: PoolStats::default(),
        }
    }

    /// Hand out an instance.
    ///
    /// Reuses the oldest despawned instance, creates a new one while under
    /// capacity, and otherwise applies the overflow policy. Spawn
    /// notifications are not delivered here, see
    /// [`notify_spawn`](Self::notify_spawn).
    ///
    /// # Errors
    ///
    /// - `CapacityExceeded` when full under `ThrowException`
    /// - `MissingPrototype` when the host cannot instantiate the prototype
    pub fn acquire<H: PoolHost + ?Sized>(
        &mut self,
        cx: &mut PoolAccess<'_, H>,
    ) -> PoolResult<Acquired> {
        while let Some(instance) = self.despawned.pop_front() {
            if !cx.host.is_alive(instance) {
                log::error!(
                    "Pool '{}': despawned instance {instance:?} was destroyed externally, dropping it",
                    self.prototype
                );
                cx.handles.unregister(instance);
                continue;
            }

            if let Some(handle) = cx.handles.get_mut(instance) {
                handle.set_status(HandleStatus::Spawned);
            }
            cx.host.set_active(instance, true);
            self.spawned.push_back(instance);
            self.record_spawn(cx, instance);
            return Ok(Acquired::Reused(instance));
        }

        if self.managed_count() < self.settings.capacity {
            let instance = self.instantiate(cx, HandleStatus::Despawned)?;
            if let Some(handle) = cx.handles.get_mut(instance) {
                handle.set_status(HandleStatus::Spawned);
            }
            self.spawned.push_back(instance);
            self.record_spawn(cx, instance);
            return Ok(Acquired::Created(instance));
        }

        match self.settings.overflow {
            OverflowPolicy::Recycle => {
                let Some(instance) = self.spawned.pop_front() else {
                    return Ok(Acquired::Empty);
                };
                self.spawned.push_back(instance);
                log::debug!("Pool '{}': recycling {instance:?}", self.prototype);
                self.record_spawn(cx, instance);
                Ok(Acquired::Recycled(instance))
            }
            OverflowPolicy::Instantiate | OverflowPolicy::InstantiateWithCallbacks => {
                let instance = self.instantiate(cx, HandleStatus::SpawnedOverCapacity)?;
                log::debug!(
                    "Pool '{}': capacity {} reached, {instance:?} spawned over capacity",
                    self.prototype,
                    self.settings.capacity
                );
                self.record_spawn(cx, instance);
                Ok(Acquired::OverCapacity(instance))
            }
            OverflowPolicy::ReturnNullableClone => Ok(Acquired::Empty),
            OverflowPolicy::ThrowException => Err(PoolError::CapacityExceeded {
                prototype: self.prototype.clone(),
                capacity: self.settings.capacity,
            }),
        }
    }

    /// Deliver the spawn notification for a result of [`acquire`](Self::acquire).
    ///
    /// Over-capacity instances are only notified under
    /// `InstantiateWithCallbacks`.
    pub fn notify_spawn<H: PoolHost + ?Sized>(&self, host: &mut H, acquired: Acquired) {
        match acquired {
            Acquired::Reused(instance) | Acquired::Created(instance) | Acquired::Recycled(instance) => {
                self.dispatcher.dispatch(host, instance, Lifecycle::Spawn);
            }
            Acquired::OverCapacity(instance) => {
                if self.settings.overflow == OverflowPolicy::InstantiateWithCallbacks {
                    self.dispatcher.dispatch(host, instance, Lifecycle::Spawn);
                }
            }
            Acquired::Empty => {}
        }
    }

    /// Take an instance back.
    ///
    /// Despawn notifications are delivered before the instance is
    /// deactivated.
    ///
    /// # Errors
    ///
    /// - `UseAfterDispose` when the instance has no handle, or was destroyed
    ///   behind the pool's back
    /// - `NotPoolManaged` when the instance belongs to another pool
    pub fn release<H: PoolHost + ?Sized>(
        &mut self,
        cx: &mut PoolAccess<'_, H>,
        instance: Entity,
    ) -> PoolResult<Released> {
        let status = match cx.handles.get(instance) {
            Some(handle) if handle.prototype() != &self.prototype => {
                return Err(PoolError::NotPoolManaged(instance));
            }
            Some(handle) => handle.status(),
            None => return Err(PoolError::UseAfterDispose(instance)),
        };

        match status {
            HandleStatus::Despawned => {
                if self.settings.warn_on_misuse {
                    log::warn!(
                        "Pool '{}': {instance:?} is already despawned",
                        self.prototype
                    );
                }
                Ok(Released::AlreadyDespawned)
            }
            HandleStatus::SpawnedOverCapacity => {
                if self.settings.overflow == OverflowPolicy::InstantiateWithCallbacks {
                    self.dispatcher
                        .dispatch(cx.host, instance, Lifecycle::Despawn);
                }
                cx.handles.dispose(instance, cx.host, true);
                self.record_despawn(cx, instance);
                cx.events.push(PoolEvent::Destroyed {
                    prototype: self.prototype.clone(),
                    instance,
                });
                Ok(Released::Destroyed)
            }
            HandleStatus::Spawned => {
                if !cx.host.is_alive(instance) {
                    log::error!(
                        "Pool '{}': spawned instance {instance:?} was destroyed externally",
                        self.prototype
                    );
                    self.remove_instance(instance);
                    cx.handles.unregister(instance);
                    return Err(PoolError::UseAfterDispose(instance));
                }

                self.dispatcher
                    .dispatch(cx.host, instance, Lifecycle::Despawn);
                cx.host.set_active(instance, false);
                self.park(cx.host, instance);

                let index = self.spawned.iter().position(|&e| e == instance);
                debug_assert!(index.is_some(), "spawned instance missing from spawned list");
                if let Some(index) = index {
                    self.spawned.remove(index);
                }
                debug_assert!(
                    !self.despawned.contains(&instance),
                    "instance in both spawned and despawned lists"
                );
                self.despawned.push_back(instance);

                if let Some(handle) = cx.handles.get_mut(instance) {
                    handle.set_status(HandleStatus::Despawned);
                }
                self.record_despawn(cx, instance);
                Ok(Released::Parked)
            }
        }
    }

    /// Create up to `count` despawned instances.
    ///
    /// Stops early, without failing, once the pool is full.
    ///
    /// # Errors
    ///
    /// Returns `MissingPrototype` when the host cannot instantiate the
    /// prototype.
    pub fn populate<H: PoolHost + ?Sized>(
        &mut self,
        cx: &mut PoolAccess<'_, H>,
        count: usize,
    ) -> PoolResult<Populated> {
        let mut result = Populated::default();

        for _ in 0..count {
            if self.managed_count() >= self.settings.capacity {
                if self.settings.warn_on_misuse {
                    log::warn!(
                        "Pool '{}': capacity {} reached while populating, {} of {count} created",
                        self.prototype,
                        self.settings.capacity,
                        result.created
                    );
                }
                result.capacity_reached = true;
                break;
            }

            let instance = self.instantiate(cx, HandleStatus::Despawned)?;
            cx.host.set_active(instance, false);
            self.park(cx.host, instance);
            self.despawned.push_back(instance);
            result.created += 1;
        }

        Ok(result)
    }

    /// Change the capacity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCapacity` if `capacity` is below the managed count.
    pub fn set_capacity(&mut self, capacity: usize) -> PoolResult<()> {
        let managed = self.managed_count();
        if capacity < managed {
            return Err(PoolError::InvalidCapacity {
                requested: capacity,
                managed,
            });
        }
        if capacity == 0 && self.settings.warn_on_misuse {
            log::warn!("Pool '{}': capacity set to 0", self.prototype);
        }

        self.settings.capacity = capacity;
        self.settings.preload = self.settings.preload.min(capacity);
        Ok(())
    }

    /// Destroy every instance of this pool, including over-capacity ones,
    /// and reset the counters.
    pub fn destroy_all<H: PoolHost + ?Sized>(&mut self, cx: &mut PoolAccess<'_, H>, immediate: bool) {
        self.destroy_spawned(cx, immediate);
        self.destroy_despawned(cx, immediate);
        self.stats = PoolStats::default();
        log::debug!("Pool '{}': destroyed all instances", self.prototype);
    }

    /// Destroy the live instances of this pool, over-capacity ones included.
    /// Parked instances and the counters are left alone.
    pub fn destroy_spawned<H: PoolHost + ?Sized>(&mut self, cx: &mut PoolAccess<'_, H>, immediate: bool) {
        let mut doomed: InstanceSnapshot = self.spawned.drain(..).collect();
        doomed.extend(
            cx.handles
                .iter()
                .filter(|h| {
                    h.prototype() == &self.prototype && h.status() == HandleStatus::SpawnedOverCapacity
                })
                .map(Handle::instance),
        );
        self.destroy_instances(cx, doomed, immediate);
    }

    /// Destroy the parked instances of this pool
    pub fn destroy_despawned<H: PoolHost + ?Sized>(&mut self, cx: &mut PoolAccess<'_, H>, immediate: bool) {
        let doomed: InstanceSnapshot = self.despawned.drain(..).collect();
        self.destroy_instances(cx, doomed, immediate);
    }

    fn destroy_instances<H: PoolHost + ?Sized>(
        &self,
        cx: &mut PoolAccess<'_, H>,
        instances: InstanceSnapshot,
        immediate: bool,
    ) {
        for instance in instances {
            // Handles may already be gone after a quitting reset
            if cx.handles.dispose(instance, cx.host, immediate).is_none() {
                cx.host.destroy(instance, immediate);
            }
            cx.events.push(PoolEvent::Destroyed {
                prototype: self.prototype.clone(),
                instance,
            });
        }
    }

    /// Forget an instance without touching its handle or the host.
    /// Returns whether it was in one of the lists.
    pub fn remove_instance(&mut self, instance: Entity) -> bool {
        if let Some(index) = self.spawned.iter().position(|&e| e == instance) {
            self.spawned.remove(index);
            return true;
        }
        if let Some(index) = self.despawned.iter().position(|&e| e == instance) {
            self.despawned.remove(index);
            return true;
        }
        false
    }

    /// Copy of the spawned list, oldest first
    #[must_use]
    pub fn spawned_snapshot(&self) -> InstanceSnapshot {
        self.spawned.iter().copied().collect()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn instantiate<H: PoolHost + ?Sized>(
        &mut self,
        cx: &mut PoolAccess<'_, H>,
        status: HandleStatus,
    ) -> PoolResult<Entity> {
        let instance = cx.host.instantiate(&self.prototype)?;
        cx.handles
            .register(Handle::new(instance, self.prototype.clone(), status));
        self.stats.instantiated += 1;
        cx.events.push(PoolEvent::Instantiated {
            prototype: self.prototype.clone(),
            instance,
        });
        Ok(instance)
    }

    fn park<H: PoolHost + ?Sized>(&self, host: &mut H, instance: Entity) {
        match self.settings.release {
            ReleasePolicy::DeactivateAndReparent => host.attach_to_pool(instance, &self.prototype),
            ReleasePolicy::DeactivateAndClearParent => host.clear_parent(instance),
            ReleasePolicy::DeactivateOnly => {}
        }
    }

    fn record_spawn<H: PoolHost + ?Sized>(&mut self, cx: &mut PoolAccess<'_, H>, instance: Entity) {
        self.stats.spawns += 1;
        self.stats.total_actions += 1;
        cx.events.push(PoolEvent::Spawned {
            prototype: self.prototype.clone(),
            instance,
        });
    }

    fn record_despawn<H: PoolHost + ?Sized>(
        &mut self,
        cx: &mut PoolAccess<'_, H>,
        instance: Entity,
    ) {
        self.stats.despawns += 1;
        self.stats.total_actions += 1;
        cx.events.push(PoolEvent::Despawned {
            prototype: self.prototype.clone(),
            instance,
        });
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Change the overflow policy
    pub fn set_overflow(&mut self, overflow: OverflowPolicy) {
        self.settings.overflow = overflow;
    }

    /// Change the release policy
    pub fn set_release(&mut self, release: ReleasePolicy) {
        self.settings.release = release;
    }

    /// Change the notification mode
    pub fn set_notification(&mut self, notification: NotificationMode) {
        self.settings.notification = notification;
        self.dispatcher.set_mode(notification);
    }

    /// Enable or disable misuse warnings
    pub fn set_warnings(&mut self, warn_on_misuse: bool) {
        self.settings.warn_on_misuse = warn_on_misuse;
    }

    pub(crate) fn set_persistent(&mut self, persistent: bool) {
        self.settings.persistent = persistent;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Prototype this pool instantiates
    #[must_use]
    #[inline]
    pub fn prototype(&self) -> &PrototypeKey {
        &self.prototype
    }

    /// Current settings
    #[must_use]
    #[inline]
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Maximum number of managed instances
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    /// Overflow policy
    #[must_use]
    #[inline]
    pub fn overflow(&self) -> OverflowPolicy {
        self.settings.overflow
    }

    /// Survives scene resets
    #[must_use]
    #[inline]
    pub fn is_persistent(&self) -> bool {
        self.settings.persistent
    }

    /// Number of handed-out managed instances
    #[must_use]
    #[inline]
    pub fn spawned_count(&self) -> usize {
        self.spawned.len()
    }

    /// Number of parked instances
    #[must_use]
    #[inline]
    pub fn despawned_count(&self) -> usize {
        self.despawned.len()
    }

    /// Spawned plus despawned, excluding over-capacity instances
    #[must_use]
    #[inline]
    pub fn managed_count(&self) -> usize {
        self.spawned.len() + self.despawned.len()
    }

    /// Counters
    #[must_use]
    #[inline]
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Is the instance in one of this pool's lists?
    #[must_use]
    pub fn contains(&self, instance: Entity) -> bool {
        self.spawned.contains(&instance) || self.despawned.contains(&instance)
    }

    /// Spawned instances, oldest first
    pub fn spawned(&self) -> impl Iterator<Item = Entity> + '_ {
        self.spawned.iter().copied()
    }

    /// Despawned instances, next to be reused first
    pub fn despawned(&self) -> impl Iterator<Item = Entity> + '_ {
        self.despawned.iter().copied()
    }

    /// Visit every spawned instance
    pub fn for_each_spawned(&self, f: impl FnMut(Entity)) {
        self.spawned().for_each(f);
    }

    /// Visit every despawned instance
    pub fn for_each_despawned(&self, f: impl FnMut(Entity)) {
        self.despawned().for_each(f);
    }

    /// Visit every managed instance, spawned first
    pub fn for_each(&self, f: impl FnMut(Entity)) {
        self.spawned().chain(self.despawned()).for_each(f);
    }
}

// ============================================================================
// Tests
// ============================================================================
