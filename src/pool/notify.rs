//! Spawn/despawn notification delivery

use hecs::Entity;

use crate::core::NotificationMode;
use crate::host::{Lifecycle, PoolHost, Reach};

/// Routes lifecycle notifications to the host according to a pool's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationDispatcher {
    mode: NotificationMode,
}

impl NotificationDispatcher {
    /// Create a dispatcher for a mode
    #[must_use]
    pub const fn new(mode: NotificationMode) -> Self {
        Self { mode }
    }

    /// Current mode
    #[must_use]
    pub const fn mode(&self) -> NotificationMode {
        self.mode
    }

    /// Change the mode
    pub fn set_mode(&mut self, mode: NotificationMode) {
        self.mode = mode;
    }

    /// Deliver a notification for an instance
    pub fn dispatch<H: PoolHost + ?Sized>(&self, host: &mut H, instance: Entity, lifecycle: Lifecycle) {
        match self.mode {
            NotificationMode::None => {}
            NotificationMode::DirectInterfaces => {
                host.invoke_hooks(instance, lifecycle, Reach::Instance);
            }
            NotificationMode::InterfacesIncludingDescendants => {
                host.invoke_hooks(instance, lifecycle, Reach::Descendants);
            }
            NotificationMode::NamedMessageDirect => {
                host.send_message(instance, lifecycle.message_name(), Reach::Instance);
            }
            NotificationMode::NamedMessageBroadcast => {
                host.send_message(instance, lifecycle.message_name(), Reach::Descendants);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::ecs::{EcsHost, LifecycleHooks, MessageHandlers};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    /// Root with hooks and a message handler, plus one child with the same.
    fn host_with_hierarchy(hooks: &Arc<AtomicUsize>, messages: &Arc<AtomicUsize>) -> (EcsHost, Entity) {
        let mut host = EcsHost::new();
        let root = host.world_mut().spawn(());
        let child = host.world_mut().spawn(());
        EcsHost::link(host.world_mut(), root, child);

        for entity in [root, child] {
            let h = Arc::clone(hooks);
            let m = Arc::clone(messages);
            host.world_mut()
                .insert(
                    entity,
                    (
                        LifecycleHooks::new().on_spawn(move |_| {
                            h.fetch_add(1, Ordering::SeqCst);
                        }),
                        MessageHandlers::new().with("OnSpawn", move |_| {
                            m.fetch_add(1, Ordering::SeqCst);
                        }),
                    ),
                )
                .unwrap();
        }

        (host, root)
    }

    #[test]
    fn test_none_mode_is_silent() {
        let (hooks, messages) = (counter(), counter());
        let (mut host, root) = host_with_hierarchy(&hooks, &messages);

        NotificationDispatcher::new(NotificationMode::None).dispatch(&mut host, root, Lifecycle::Spawn);

        assert_eq!(hooks.load(Ordering::SeqCst), 0);
        assert_eq!(messages.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_interface_modes() {
        let (hooks, messages) = (counter(), counter());
        let (mut host, root) = host_with_hierarchy(&hooks, &messages);

        NotificationDispatcher::new(NotificationMode::DirectInterfaces)
            .dispatch(&mut host, root, Lifecycle::Spawn);
        assert_eq!(hooks.load(Ordering::SeqCst), 1);

        NotificationDispatcher::new(NotificationMode::InterfacesIncludingDescendants)
            .dispatch(&mut host, root, Lifecycle::Spawn);
        assert_eq!(hooks.load(Ordering::SeqCst), 3);
        assert_eq!(messages.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_message_modes() {
        let (hooks, messages) = (counter(), counter());
        let (mut host, root) = host_with_hierarchy(&hooks, &messages);

        NotificationDispatcher::new(NotificationMode::NamedMessageDirect)
            .dispatch(&mut host, root, Lifecycle::Spawn);
        assert_eq!(messages.load(Ordering::SeqCst), 1);

        NotificationDispatcher::new(NotificationMode::NamedMessageBroadcast)
            .dispatch(&mut host, root, Lifecycle::Spawn);
        assert_eq!(messages.load(Ordering::SeqCst), 3);

        // No receiver registered for this message
        NotificationDispatcher::new(NotificationMode::NamedMessageBroadcast)
            .dispatch(&mut host, root, Lifecycle::Despawn);
        assert_eq!(messages.load(Ordering::SeqCst), 3);
        assert_eq!(hooks.load(Ordering::SeqCst), 0);
    }
}
