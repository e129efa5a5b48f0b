//! Despawn timers
//!
//! An instance carrying a [`DespawnTimer`] goes back to its pool once it has
//! been active for `duration` seconds. The timer restarts whenever the
//! instance is activated, deactivated or receives a spawn notification, so a
//! recycled instance gets a fresh countdown.

use hecs::Entity;

use super::hierarchy;
use super::world::EcsHost;
use crate::pool::PoolRegistry;

/// Despawns its entity after a fixed active time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DespawnTimer {
    /// Seconds before despawn
    pub duration: f32,
    elapsed: f32,
    fired: bool,
}

impl DespawnTimer {
    /// Create a timer
    #[must_use]
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            elapsed: 0.0,
            fired: false,
        }
    }

    /// Seconds since the last reset
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Restart the countdown
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.fired = false;
    }

    /// Advance by `dt`. Returns true exactly once per countdown.
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.fired {
            return false;
        }
        self.elapsed += dt;
        if self.elapsed >= self.duration {
            self.fired = true;
            return true;
        }
        false
    }
}

impl Default for DespawnTimer {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl EcsHost {
    /// Advance the timers of entities active in the hierarchy. Returns the
    /// entities whose timer ran out.
    pub fn advance_despawn_timers(&mut self, dt: f32) -> Vec<Entity> {
        let world = self.world();
        let running: Vec<Entity> = world
            .query::<&DespawnTimer>()
            .iter()
            .map(|(entity, _)| entity)
            .filter(|&entity| hierarchy::is_active_in_hierarchy(world, entity))
            .collect();

        let world = self.world_mut();
        running
            .into_iter()
            .filter(|&entity| {
                world
                    .get::<&mut DespawnTimer>(entity)
                    .is_ok_and(|mut timer| timer.advance(dt))
            })
            .collect()
    }
}

impl PoolRegistry<EcsHost> {
    /// Advance despawn timers and despawn the instances whose timer ran out.
    /// Returns how many were despawned.
    pub fn run_despawn_timers(&mut self, dt: f32) -> usize {
        let due = self.host_mut().advance_despawn_timers(dt);
        let mut despawned = 0;
        for entity in due {
            match self.despawn(entity, 0.0) {
                Ok(()) => despawned += 1,
                Err(e) => log::warn!("Despawn timer of {entity:?} failed: {e}"),
            }
        }
        despawned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::PoolHost;
    use crate::core::RegistryConfig;
    use crate::pool::{HandleStatus, PrototypeKey};

    #[test]
    fn test_timer_fires_once() {
        let mut timer = DespawnTimer::new(1.0);
        assert!(!timer.advance(0.5));
        assert!(timer.advance(0.5));
        assert!(!timer.advance(0.5));

        timer.reset();
        assert_eq!(timer.elapsed(), 0.0);
        assert!(timer.advance(1.0));
    }

    #[test]
    fn test_timer_despawns_instance() {
        let mut host = EcsHost::new();
        host.register_prefab("flash", |world| world.spawn((DespawnTimer::new(0.5),)));
        let mut pools = PoolRegistry::new(host, RegistryConfig::default());
        let flash = PrototypeKey::new("flash");

        let instance = pools.spawn(&flash, None).unwrap().unwrap();
        assert_eq!(pools.run_despawn_timers(0.3), 0);
        assert_eq!(pools.run_despawn_timers(0.3), 1);
        assert_eq!(pools.status_of(instance), Some(HandleStatus::Despawned));

        // Inactive instances do not count down
        assert_eq!(pools.run_despawn_timers(1.0), 0);

        // Reuse restarts the countdown
        let again = pools.spawn(&flash, None).unwrap().unwrap();
        assert_eq!(again, instance);
        assert_eq!(pools.run_despawn_timers(0.3), 0);
        assert_eq!(pools.run_despawn_timers(0.3), 1);
    }

    #[test]
    fn test_timer_paused_under_inactive_ancestor() {
        let mut host = EcsHost::new();
        host.register_prefab("burst", |world| {
            let root = world.spawn(());
            let spark = world.spawn((DespawnTimer::new(0.5),));
            hierarchy::link(world, root, spark);
            root
        });
        let mut pools = PoolRegistry::new(host, RegistryConfig::default());
        let burst = PrototypeKey::new("burst");

        let root = pools.spawn(&burst, None).unwrap().unwrap();
        let spark = pools.host().world().get::<&hierarchy::Children>(root).unwrap().0[0];
        pools.despawn(root, 0.0).unwrap();

        assert_eq!(pools.run_despawn_timers(10.0), 0);
        assert!(pools.host().is_alive(spark));
        let timer = *pools.host().world().get::<&DespawnTimer>(spark).unwrap();
        assert_eq!(timer.elapsed(), 0.0);
    }
}
