//! Demo: a turret firing pooled bullets with muzzle flashes
//!
//! Run with `RUST_LOG=debug` to trace every spawn and despawn.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use prefab_pool::prelude::*;

const FRAME_TIME: f32 = 1.0 / 60.0;
const FRAMES: usize = 600;

const PRESET: &str = r#"(
    presets: [
        (prototype: "bullet", settings: (capacity: 24, preload: 16, overflow: Recycle)),
        (prototype: "flash", settings: (capacity: 4, overflow: ReturnNullableClone)),
    ],
)"#;

fn register_prefabs(host: &mut EcsHost, hits: &Arc<AtomicUsize>) {
    let hits = Arc::clone(hits);
    host.register_prefab("bullet", move |world| {
        let hits = Arc::clone(&hits);
        world.spawn((
            Transform::default(),
            LifecycleHooks::new().on_despawn(move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            }),
        ))
    });

    host.register_prefab_with_origin(
        "flash",
        Placement::at(Vec3::new(0.0, 1.5, 0.0), Quat::IDENTITY),
        |world| world.spawn((DespawnTimer::new(0.1),)),
    );
}

fn main() -> Result<(), PoolError> {
    env_logger::init();

    let hits = Arc::new(AtomicUsize::new(0));
    let mut host = EcsHost::new();
    register_prefabs(&mut host, &hits);

    let mut pools = PoolRegistry::new(host, RegistryConfig::default());
    let installed = pools.install_preset(&PoolsPreset::from_ron_str(PRESET)?);
    log::info!("Installed {installed} pools");

    let bullet = PrototypeKey::new("bullet");
    let flash = PrototypeKey::new("flash");

    for frame in 0..FRAMES {
        pools.tick(FRAME_TIME);
        pools.run_despawn_timers(FRAME_TIME);

        if frame % 6 == 0 {
            let angle = frame as f32 * 0.05;
            let direction = Quat::from_rotation_y(angle);
            if let Some(shot) = pools.spawn_at(&bullet, direction * Vec3::NEG_Z, direction)? {
                pools.despawn(shot, 0.75)?;
            }
            pools.spawn(&flash, None)?;
        }

        for event in pools.events_mut().drain() {
            if let PoolEvent::Instantiated { prototype, instance } = event {
                log::debug!("frame {frame}: new {prototype} instance {instance:?}");
            }
        }

        pools.host_mut().flush_destroyed();
    }

    pools.for_each_pool(|pool| {
        let stats = pool.stats();
        log::info!(
            "{}: {} instances, {} spawns, {} despawns",
            pool.prototype(),
            stats.instantiated,
            stats.spawns,
            stats.despawns
        );
    });
    log::info!("{} bullets returned", hits.load(Ordering::Relaxed));

    pools.on_quitting();
    pools.on_teardown();
    Ok(())
}
