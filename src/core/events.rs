//! Pool Event Queue
//!
//! Pools report what happened to their instances through a double-buffered
//! queue owned by the registry. Events written during frame N become visible
//! after the swap at the start of frame N+1, so observers (audio, UI, stats)
//! never see a half-finished frame.
//!
//! # Example
//!
//! ```ignore
//! registry.tick(dt);
//!
//! for event in registry.events().iter() {
//!     if let PoolEvent::Spawned { instance, .. } = event {
//!         play_spawn_effect(*instance);
//!     }
//! }
//! ```

use std::collections::VecDeque;

use hecs::Entity;

use crate::pool::PrototypeKey;

// ============================================================================
// Event Types
// ============================================================================

/// Something that happened to a pooled instance.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PoolEvent {
    /// A new instance was created from the prototype.
    Instantiated {
        /// Owning prototype
        prototype: PrototypeKey,
        /// The new instance
        instance: Entity,
    },

    /// An instance was handed out by `spawn`.
    Spawned {
        /// Owning prototype
        prototype: PrototypeKey,
        /// The spawned instance
        instance: Entity,
    },

    /// An instance was returned to its pool (or destroyed, if over capacity).
    Despawned {
        /// Owning prototype
        prototype: PrototypeKey,
        /// The despawned instance
        instance: Entity,
    },

    /// An instance was destroyed and will never be reused.
    Destroyed {
        /// Owning prototype
        prototype: PrototypeKey,
        /// The destroyed instance
        instance: Entity,
    },
}

impl PoolEvent {
    /// Instance the event refers to
    #[must_use]
    pub const fn instance(&self) -> Entity {
        match self {
            Self::Instantiated { instance, .. }
            | Self::Spawned { instance, .. }
            | Self::Despawned { instance, .. }
            | Self::Destroyed { instance, .. } => *instance,
        }
    }
}

// ============================================================================
// Event Queue
// ============================================================================

/// Double-buffered queue of pool events.
#[derive(Debug)]
pub struct EventQueue {
    /// Events being written this frame
    pending: VecDeque<PoolEvent>,
    /// Events from previous frame, ready for processing
    processing: VecDeque<PoolEvent>,
}

impl EventQueue {
    /// Default initial capacity for event queues.
    const DEFAULT_CAPACITY: usize = 64;

    /// Create a new event queue with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a new event queue with specified initial capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(capacity),
            processing: VecDeque::with_capacity(capacity),
        }
    }

    /// Push an event to be processed next frame.
    #[inline]
    pub fn push(&mut self, event: PoolEvent) {
        self.pending.push_back(event);
    }

    /// Swap the pending and processing queues.
    ///
    /// After swapping, `iter()` returns the events of the previous frame.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.processing);
        self.pending.clear();
    }

    /// Iterate over events from the previous frame.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PoolEvent> {
        self.processing.iter()
    }

    /// Drain all events from the previous frame.
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = PoolEvent> + '_ {
        self.processing.drain(..)
    }

    /// Check if there are any events to process.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processing.is_empty()
    }

    /// Get the number of events ready for processing.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.processing.len()
    }

    /// Get the number of events pending for next frame.
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Iterate over events written this frame, not yet swapped in.
    pub fn pending(&self) -> impl Iterator<Item = &PoolEvent> {
        self.pending.iter()
    }

    /// Clear all events (both pending and processing).
    pub fn clear(&mut self) {
        self.pending.clear();
        self.processing.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_entity() -> Entity {
        let mut world = hecs::World::new();
        world.spawn(())
    }

    fn spawned(instance: Entity) -> PoolEvent {
        PoolEvent::Spawned {
            prototype: PrototypeKey::new("orb"),
            instance,
        }
    }

    #[test]
    fn test_event_queue_push_and_swap() {
        let mut queue = EventQueue::new();
        let entity = test_entity();

        queue.push(spawned(entity));
        assert!(queue.is_empty(), "Events should not be visible before swap");
        assert_eq!(queue.pending_count(), 1);

        queue.swap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next().map(PoolEvent::instance), Some(entity));
    }

    #[test]
    fn test_event_queue_double_buffer_isolation() {
        let mut queue = EventQueue::new();
        let first = test_entity();

        queue.push(spawned(first));
        queue.swap();

        queue.push(PoolEvent::Despawned {
            prototype: PrototypeKey::new("orb"),
            instance: first,
        });

        let events: Vec<_> = queue.iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PoolEvent::Spawned { .. }));

        queue.swap();
        let events: Vec<_> = queue.iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PoolEvent::Despawned { .. }));
    }

    #[test]
    fn test_event_queue_drain_and_clear() {
        let mut queue = EventQueue::new();
        let entity = test_entity();

        queue.push(spawned(entity));
        queue.push(spawned(entity));
        queue.swap();

        let events: Vec<_> = queue.drain().collect();
        assert_eq!(events.len(), 2);
        assert!(queue.is_empty());

        queue.push(spawned(entity));
        queue.clear();
        assert_eq!(queue.pending_count(), 0);
    }
}
