//! Pool registry
//!
//! [`PoolRegistry`] is the entry point of the crate. It owns the host, one
//! [`Pool`] per prototype, the [`HandleRegistry`], the delayed despawn queue
//! and the pool event queue. There is no global state: create one registry
//! per world (or per test) and drive it from the game loop.
//!
//! # Example
//!
//! ```ignore
//! let mut pools = PoolRegistry::new(host, RegistryConfig::default());
//!
//! let bullet = PrototypeKey::new("bullet");
//! pools.install(bullet.clone(), PoolSettings::default().with_capacity(128))?;
//!
//! if let Some(instance) = pools.spawn_at(&bullet, muzzle, Quat::IDENTITY)? {
//!     pools.despawn(instance, 2.0)?;
//! }
//!
//! // Once per frame
//! pools.tick(dt);
//! ```

use glam::{Quat, Vec3};
use hecs::Entity;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::{EventQueue, PoolError, PoolEvent, PoolResult, PoolSettings, RegistryConfig};
use crate::host::{Placement, PoolHost};
use crate::pool::delayed::{DelayedReleaseQueue, ScheduleOutcome};
use crate::pool::handle::{Handle, HandleRegistry, HandleStatus, PrototypeKey};
use crate::pool::pool::{Acquired, Pool, PoolAccess, Populated, Released};
use crate::pool::preset::PoolsPreset;

/// Lifecycle state of the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostState {
    /// Normal operation
    #[default]
    Running,
    /// The application is shutting down; spawn/despawn are refused
    Quitting,
}

/// Owns every pool of a host and resolves instances back to them.
pub struct PoolRegistry<H: PoolHost> {
    host: H,
    config: RegistryConfig,
    pools: FxHashMap<PrototypeKey, Pool>,
    persistent: FxHashSet<PrototypeKey>,
    handles: HandleRegistry,
    delayed: DelayedReleaseQueue,
    events: EventQueue,
    state: HostState,
    /// Scratch buffer for delayed despawns due this tick
    due: Vec<Entity>,
}

impl<H: PoolHost> PoolRegistry<H> {
    /// Create a registry around a host
    pub fn new(host: H, config: RegistryConfig) -> Self {
        Self {
            host,
            delayed: DelayedReleaseQueue::new(config.delayed_conflict),
            config,
            pools: FxHashMap::default(),
            persistent: FxHashSet::default(),
            handles: HandleRegistry::new(),
            events: EventQueue::new(),
            state: HostState::Running,
            due: Vec::new(),
        }
    }

    // ========================================================================
    // Pool Management
    // ========================================================================

    /// Install a new pool.
    ///
    /// # Errors
    ///
    /// - `DuplicatePool` if a pool for this prototype already exists
    /// - `MissingPrototype` if the host cannot instantiate it
    pub fn install(&mut self, prototype: PrototypeKey, settings: PoolSettings) -> PoolResult<&mut Pool> {
        if self.pools.contains_key(&prototype) {
            return Err(PoolError::DuplicatePool(prototype));
        }
        self.create_pool(prototype, settings)
    }

    /// Get the pool of a prototype, creating it with the registry defaults.
    ///
    /// # Errors
    ///
    /// Returns `MissingPrototype` if the pool has to be created and the host
    /// cannot instantiate the prototype.
    pub fn get_or_create(&mut self, prototype: &PrototypeKey) -> PoolResult<&mut Pool> {
        let settings = self.config.defaults.clone().with_preload(0);
        self.get_or_create_with(prototype, settings)
    }

    /// Get the pool of a prototype, creating it with `settings`.
    ///
    /// # Errors
    ///
    /// Returns `MissingPrototype` if the pool has to be created and the host
    /// cannot instantiate the prototype.
    pub fn get_or_create_with(
        &mut self,
        prototype: &PrototypeKey,
        settings: PoolSettings,
    ) -> PoolResult<&mut Pool> {
        if !self.pools.contains_key(prototype) {
            return self.create_pool(prototype.clone(), settings);
        }
        self.pools
            .get_mut(prototype)
            .ok_or_else(|| PoolError::MissingPrototype(prototype.clone()))
    }

    fn create_pool(&mut self, prototype: PrototypeKey, settings: PoolSettings) -> PoolResult<&mut Pool> {
        if !self.host.has_prototype(&prototype) {
            return Err(PoolError::MissingPrototype(prototype));
        }

        let pool = Pool::new(prototype.clone(), settings);
        let preload = pool.settings().preload;
        if pool.is_persistent() {
            self.persistent.insert(prototype.clone());
        }
        log::info!(
            "Created pool '{prototype}' (capacity {}, {:?})",
            pool.capacity(),
            pool.overflow()
        );
        self.pools.insert(prototype.clone(), pool);

        if preload > 0
            && let Some((pool, mut cx)) = self.split(&prototype)
        {
            pool.populate(&mut cx, preload)?;
        }

        self.pools
            .get_mut(&prototype)
            .ok_or(PoolError::MissingPrototype(prototype))
    }

    /// Install every enabled entry of a preset. Returns the number of pools
    /// created.
    ///
    /// Failing entries are logged and skipped. An entry whose pool already
    /// exists is skipped silently when both are persistent.
    pub fn install_preset(&mut self, preset: &PoolsPreset) -> usize {
        let mut installed = 0;

        for entry in preset.presets.iter().filter(|p| p.enabled) {
            if let Some(existing) = self.pools.get(&entry.prototype) {
                if !(existing.is_persistent() && entry.settings.persistent) {
                    log::error!("{}", PoolError::DuplicatePool(entry.prototype.clone()));
                }
                continue;
            }

            match self.create_pool(entry.prototype.clone(), entry.settings.clone()) {
                Ok(_) => installed += 1,
                Err(e) => log::error!("Skipping preset entry '{}': {e}", entry.prototype),
            }
        }

        installed
    }

    /// Borrow a pool together with the collaborators it operates on
    fn split(&mut self, prototype: &PrototypeKey) -> Option<(&mut Pool, PoolAccess<'_, H>)> {
        let pool = self.pools.get_mut(prototype)?;
        Some((
            pool,
            PoolAccess {
                host: &mut self.host,
                handles: &mut self.handles,
                events: &mut self.events,
            },
        ))
    }

    // ========================================================================
    // Spawn / Despawn
    // ========================================================================

    /// Spawn an instance of a prototype, creating its pool on demand.
    ///
    /// Returns `Ok(None)` when the pool is full and its overflow policy
    /// yields no instance, or while the host is quitting. With `placement`
    /// unset the host's default placement is used.
    ///
    /// # Errors
    ///
    /// - `MissingPrototype` if the host cannot instantiate the prototype
    /// - `CapacityExceeded` under `ThrowException` in strict mode
    pub fn spawn(
        &mut self,
        prototype: &PrototypeKey,
        placement: Option<Placement>,
    ) -> PoolResult<Option<Entity>> {
        if self.state == HostState::Quitting {
            log::error!("Cannot spawn '{prototype}': {}", PoolError::ShuttingDown);
            return Ok(None);
        }

        self.get_or_create(prototype)?;
        let strict = self.config.strict;
        let Some((pool, mut cx)) = self.split(prototype) else {
            return Err(PoolError::MissingPrototype(prototype.clone()));
        };

        let acquired = match pool.acquire(&mut cx) {
            Ok(acquired) => acquired,
            Err(e @ PoolError::CapacityExceeded { .. }) if !strict => {
                log::error!("{e}");
                Acquired::Empty
            }
            Err(e) => return Err(e),
        };

        let Some(instance) = acquired.instance() else {
            return Ok(None);
        };

        let placement = placement.unwrap_or_else(|| cx.host.default_placement(prototype));
        cx.host.apply_placement(instance, &placement);
        pool.notify_spawn(cx.host, acquired);

        // The evicted spawn is over, so is its pending despawn
        if let Acquired::Recycled(recycled) = acquired {
            self.delayed.cancel(recycled);
        }

        log::debug!("Spawned {instance:?} from '{prototype}'");
        Ok(Some(instance))
    }

    /// Spawn at a world position and rotation
    ///
    /// # Errors
    ///
    /// See [`spawn`](Self::spawn).
    pub fn spawn_at(
        &mut self,
        prototype: &PrototypeKey,
        position: Vec3,
        rotation: Quat,
    ) -> PoolResult<Option<Entity>> {
        self.spawn(prototype, Some(Placement::at(position, rotation)))
    }

    /// Spawn as a child of `parent`
    ///
    /// # Errors
    ///
    /// See [`spawn`](Self::spawn).
    pub fn spawn_under(
        &mut self,
        prototype: &PrototypeKey,
        parent: Entity,
        world_position_stays: bool,
    ) -> PoolResult<Option<Entity>> {
        let placement = self
            .host
            .default_placement(prototype)
            .with_parent(parent, world_position_stays);
        self.spawn(prototype, Some(placement))
    }

    /// Despawn an instance, now or after `delay` seconds.
    ///
    /// Instances not managed by any pool are destroyed through the host
    /// instead. Despawning an already despawned instance does nothing.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDelayedRelease` if a delayed despawn is already
    /// pending under the `ThrowException` conflict policy in strict mode.
    pub fn despawn(&mut self, instance: Entity, delay: f32) -> PoolResult<()> {
        if self.state == HostState::Quitting {
            log::debug!("Ignoring despawn of {instance:?}: {}", PoolError::ShuttingDown);
            return Ok(());
        }

        let Some(handle) = self.handles.get(instance) else {
            log::warn!("{}, destroying it", PoolError::NotPoolManaged(instance));
            self.host.destroy(instance, delay <= 0.0);
            return Ok(());
        };

        if handle.status() == HandleStatus::Despawned {
            if self.warns(handle.prototype()) {
                log::warn!("{instance:?} is already despawned");
            }
            return Ok(());
        }

        if delay > 0.0 {
            let outcome = self.delayed.schedule(instance, delay, self.config.strict)?;
            if outcome == ScheduleOutcome::Kept {
                log::debug!("Delayed despawn of {instance:?} already pending, kept");
            }
            return Ok(());
        }

        self.release_now(instance).map(|_| ())
    }

    /// Release an instance immediately, cancelling any pending delayed despawn
    fn release_now(&mut self, instance: Entity) -> PoolResult<Released> {
        let Some(prototype) = self.handles.get(instance).map(|h| h.prototype().clone()) else {
            return Err(PoolError::UseAfterDispose(instance));
        };
        self.delayed.cancel(instance);

        match self.split(&prototype) {
            Some((pool, mut cx)) => pool.release(&mut cx, instance),
            None => {
                log::warn!("Pool '{prototype}' no longer exists, destroying {instance:?}");
                self.handles.dispose(instance, &mut self.host, true);
                Ok(Released::Destroyed)
            }
        }
    }

    /// Despawn every spawned instance of a prototype. Returns the number of
    /// instances released.
    pub fn despawn_all(&mut self, prototype: &PrototypeKey) -> usize {
        let Some(snapshot) = self.pools.get(prototype).map(Pool::spawned_snapshot) else {
            return 0;
        };

        let mut released = 0;
        for instance in snapshot {
            match self.release_now(instance) {
                Ok(Released::Parked | Released::Destroyed) => released += 1,
                Ok(Released::AlreadyDespawned) => {}
                Err(e) => log::warn!("Could not despawn {instance:?}: {e}"),
            }
        }
        released
    }

    /// Advance delayed despawns by `dt` seconds and publish last frame's
    /// pool events. Call once per frame.
    pub fn tick(&mut self, dt: f32) {
        self.events.swap();

        if self.state == HostState::Quitting {
            return;
        }

        let mut due = std::mem::take(&mut self.due);
        let handles = &self.handles;
        self.delayed.tick(
            dt,
            |instance| handles.status_of(instance).is_none_or(|s| s == HandleStatus::Despawned),
            &mut due,
        );

        for instance in due.drain(..) {
            if let Err(e) = self.release_now(instance) {
                log::warn!("Delayed despawn of {instance:?} failed: {e}");
            }
        }
        self.due = due;
    }

    // ========================================================================
    // Populate / Capacity
    // ========================================================================

    /// Pre-create despawned instances, creating the pool on demand.
    ///
    /// # Errors
    ///
    /// Returns `MissingPrototype` if the host cannot instantiate the
    /// prototype.
    pub fn populate(&mut self, prototype: &PrototypeKey, count: usize) -> PoolResult<Populated> {
        self.get_or_create(prototype)?;
        let Some((pool, mut cx)) = self.split(prototype) else {
            return Err(PoolError::MissingPrototype(prototype.clone()));
        };
        pool.populate(&mut cx, count)
    }

    /// Change the capacity of a pool, creating it on demand.
    ///
    /// # Errors
    ///
    /// - `InvalidCapacity` if the pool owns more instances than `capacity`
    /// - `MissingPrototype` if the host cannot instantiate the prototype
    pub fn set_capacity(&mut self, prototype: &PrototypeKey, capacity: usize) -> PoolResult<()> {
        self.get_or_create(prototype)?.set_capacity(capacity)
    }

    /// Mark a pool persistent (or not)
    pub fn set_persistent(&mut self, prototype: &PrototypeKey, persistent: bool) -> bool {
        let Some(pool) = self.pools.get_mut(prototype) else {
            return false;
        };
        pool.set_persistent(persistent);
        if persistent {
            self.persistent.insert(prototype.clone());
        } else {
            self.persistent.remove(prototype);
        }
        true
    }

    // ========================================================================
    // Destruction
    // ========================================================================

    /// Destroy a single instance, managed or not
    pub fn destroy_instance(&mut self, instance: Entity, immediate: bool) {
        self.delayed.cancel(instance);

        let Some(prototype) = self.handles.get(instance).map(|h| h.prototype().clone()) else {
            log::warn!("{}, destroying it", PoolError::NotPoolManaged(instance));
            self.host.destroy(instance, immediate);
            return;
        };

        if let Some(pool) = self.pools.get_mut(&prototype) {
            pool.remove_instance(instance);
        }
        self.handles.dispose(instance, &mut self.host, immediate);
        self.events.push(PoolEvent::Destroyed {
            prototype,
            instance,
        });
    }

    /// Destroy a pool and every instance it owns. Returns whether the pool
    /// existed.
    pub fn destroy_pool(&mut self, prototype: &PrototypeKey, immediate: bool) -> bool {
        let Some((pool, mut cx)) = self.split(prototype) else {
            return false;
        };
        pool.destroy_all(&mut cx, immediate);

        self.pools.remove(prototype);
        self.persistent.remove(prototype);
        self.host.on_pool_destroyed(prototype);
        log::info!("Destroyed pool '{prototype}'");
        true
    }

    /// Destroy every instance of a pool but keep the pool itself. Returns
    /// whether the pool exists.
    pub fn clear_pool(&mut self, prototype: &PrototypeKey, immediate: bool) -> bool {
        let Some((pool, mut cx)) = self.split(prototype) else {
            return false;
        };
        pool.destroy_all(&mut cx, immediate);
        self.drop_unmanaged_requests();
        true
    }

    /// Destroy the spawned instances of a pool, over-capacity ones included.
    /// Returns whether the pool exists.
    pub fn destroy_spawned(&mut self, prototype: &PrototypeKey, immediate: bool) -> bool {
        let Some((pool, mut cx)) = self.split(prototype) else {
            return false;
        };
        pool.destroy_spawned(&mut cx, immediate);
        self.drop_unmanaged_requests();
        true
    }

    /// Destroy the despawned instances of a pool. Returns whether the pool
    /// exists.
    pub fn destroy_despawned(&mut self, prototype: &PrototypeKey, immediate: bool) -> bool {
        let Some((pool, mut cx)) = self.split(prototype) else {
            return false;
        };
        pool.destroy_despawned(&mut cx, immediate);
        true
    }

    fn drop_unmanaged_requests(&mut self) {
        let handles = &self.handles;
        self.delayed.retain(|instance| handles.contains(instance));
    }

    /// Destroy every pool.
    ///
    /// # Errors
    ///
    /// Returns `ShuttingDown` while the host is quitting.
    pub fn destroy_all_pools(&mut self, immediate: bool) -> PoolResult<()> {
        if self.state == HostState::Quitting {
            return Err(PoolError::ShuttingDown);
        }

        let keys: Vec<PrototypeKey> = self.pools.keys().cloned().collect();
        for key in &keys {
            self.destroy_pool(key, immediate);
        }
        self.delayed.clear();
        Ok(())
    }

    // ========================================================================
    // Host Lifecycle
    // ========================================================================

    /// The host started shutting down. Spawn and despawn become no-ops.
    pub fn on_quitting(&mut self) {
        log::info!("Pool registry shutting down");
        self.state = HostState::Quitting;
    }

    /// The scene (or the whole application, when quitting) is being torn down
    pub fn on_teardown(&mut self) {
        self.reset();
    }

    /// Scene-level reset.
    ///
    /// Persistent pools survive; their live instances are despawned unless
    /// the host is quitting. Every other pool is destroyed. The handle
    /// registry is only cleared on a full quit.
    pub fn reset(&mut self) {
        let quitting = self.state == HostState::Quitting;

        if !quitting && self.config.despawn_persistent_on_reset {
            let persistent: Vec<PrototypeKey> = self.persistent.iter().cloned().collect();
            for key in &persistent {
                self.despawn_all(key);
            }
        }

        let transient: Vec<PrototypeKey> = self
            .pools
            .keys()
            .filter(|k| !self.persistent.contains(*k))
            .cloned()
            .collect();
        for key in &transient {
            if quitting {
                self.pools.remove(key);
            } else {
                self.destroy_pool(key, false);
            }
        }

        self.delayed.clear();

        if quitting {
            self.handles.clear();
            self.events.clear();
        }
        log::debug!(
            "Pool registry reset ({} persistent pools kept)",
            self.pools.len()
        );
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Is the instance managed by a pool?
    #[must_use]
    pub fn is_managed(&self, instance: Entity) -> bool {
        self.handles.contains(instance)
    }

    /// Status of a managed instance
    #[must_use]
    pub fn status_of(&self, instance: Entity) -> Option<HandleStatus> {
        self.handles.status_of(instance)
    }

    /// Handle of a managed instance
    #[must_use]
    pub fn handle(&self, instance: Entity) -> Option<&Handle> {
        self.handles.get(instance)
    }

    /// Pool of a prototype
    #[must_use]
    pub fn pool(&self, prototype: &PrototypeKey) -> Option<&Pool> {
        self.pools.get(prototype)
    }

    /// Pool of a prototype, mutably
    pub fn pool_mut(&mut self, prototype: &PrototypeKey) -> Option<&mut Pool> {
        self.pools.get_mut(prototype)
    }

    /// Pool owning an instance
    #[must_use]
    pub fn pool_of(&self, instance: Entity) -> Option<&Pool> {
        self.handles
            .get(instance)
            .and_then(|h| self.pools.get(h.prototype()))
    }

    /// Number of pools
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Does this prototype have a persistent pool?
    #[must_use]
    pub fn is_persistent(&self, prototype: &PrototypeKey) -> bool {
        self.persistent.contains(prototype)
    }

    /// Remaining time of a pending delayed despawn
    #[must_use]
    pub fn pending_despawn(&self, instance: Entity) -> Option<f32> {
        self.delayed.remaining(instance)
    }

    /// Visit every pool
    pub fn for_each_pool(&self, mut f: impl FnMut(&Pool)) {
        for pool in self.pools.values() {
            f(pool);
        }
    }

    /// Visit the managed instances of one pool, or of every pool
    pub fn for_each_instance(&self, prototype: Option<&PrototypeKey>, mut f: impl FnMut(Entity)) {
        match prototype {
            Some(key) => {
                if let Some(pool) = self.pools.get(key) {
                    pool.for_each(&mut f);
                }
            }
            None => {
                for pool in self.pools.values() {
                    pool.for_each(&mut f);
                }
            }
        }
    }

    /// Handle registry
    #[must_use]
    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    /// Pool events of the previous frame
    #[must_use]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Pool events of the previous frame, mutably (to drain them)
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Host lifecycle state
    #[must_use]
    pub fn state(&self) -> HostState {
        self.state
    }

    /// The host
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn warns(&self, prototype: &PrototypeKey) -> bool {
        self.pools
            .get(prototype)
            .is_none_or(|p| p.settings().warn_on_misuse)
    }
}

// ============================================================================
// Tests
// ============================================================================
