//! Delayed despawn scheduling
//!
//! Requests are kept in an unordered list and advanced by [`tick`]. Removal
//! while iterating uses `swap_remove`, so the firing order between different
//! instances is unspecified.
//!
//! [`tick`]: DelayedReleaseQueue::tick

use hecs::Entity;

use crate::core::{DelayedConflictPolicy, PoolError, PoolResult};

/// A pending delayed despawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayedRelease {
    /// Instance to despawn
    pub instance: Entity,
    /// Seconds left before it fires
    pub remaining: f32,
}

/// Result of scheduling a delayed despawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A new request was queued
    Scheduled,
    /// An existing request got a new remaining time
    Updated,
    /// An existing request was left untouched
    Kept,
}

/// Pending delayed despawns, at most one per instance.
#[derive(Debug)]
pub struct DelayedReleaseQueue {
    requests: Vec<DelayedRelease>,
    policy: DelayedConflictPolicy,
}

impl DelayedReleaseQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new(policy: DelayedConflictPolicy) -> Self {
        Self {
            requests: Vec::new(),
            policy,
        }
    }

    /// Conflict policy
    #[must_use]
    pub const fn policy(&self) -> DelayedConflictPolicy {
        self.policy
    }

    /// Change the conflict policy
    pub fn set_policy(&mut self, policy: DelayedConflictPolicy) {
        self.policy = policy;
    }

    /// Schedule a despawn of `instance` in `delay` seconds.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDelayedRelease` when a request is already pending,
    /// the policy is `ThrowException` and `strict` is set.
    pub fn schedule(&mut self, instance: Entity, delay: f32, strict: bool) -> PoolResult<ScheduleOutcome> {
        let Some(existing) = self.requests.iter_mut().find(|r| r.instance == instance) else {
            self.requests.push(DelayedRelease {
                instance,
                remaining: delay,
            });
            return Ok(ScheduleOutcome::Scheduled);
        };

        let overwrite = match self.policy {
            DelayedConflictPolicy::Ignore => false,
            DelayedConflictPolicy::ResetDelay => true,
            DelayedConflictPolicy::ResetDelayIfNewTimeIsLess => delay < existing.remaining,
            DelayedConflictPolicy::ResetDelayIfNewTimeIsGreater => delay > existing.remaining,
            DelayedConflictPolicy::ThrowException => {
                if strict {
                    return Err(PoolError::DuplicateDelayedRelease(instance));
                }
                log::error!("{}", PoolError::DuplicateDelayedRelease(instance));
                false
            }
        };

        if overwrite {
            existing.remaining = delay;
            Ok(ScheduleOutcome::Updated)
        } else {
            Ok(ScheduleOutcome::Kept)
        }
    }

    /// Drop the pending request of an instance, if any
    pub fn cancel(&mut self, instance: Entity) -> bool {
        match self.requests.iter().position(|r| r.instance == instance) {
            Some(index) => {
                self.requests.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Advance every request by `dt` seconds.
    ///
    /// Requests whose instance `is_stale` (already despawned or no longer
    /// managed) are dropped without firing. Requests reaching zero are
    /// removed and their instances appended to `due`.
    pub fn tick(&mut self, dt: f32, is_stale: impl Fn(Entity) -> bool, due: &mut Vec<Entity>) {
        let mut i = 0;
        while i < self.requests.len() {
            let request = &mut self.requests[i];
            if is_stale(request.instance) {
                self.requests.swap_remove(i);
                continue;
            }

            request.remaining -= dt;
            if request.remaining <= 0.0 {
                due.push(request.instance);
                self.requests.swap_remove(i);
                continue;
            }

            i += 1;
        }
    }

    /// Remaining time of a pending request
    #[must_use]
    pub fn remaining(&self, instance: Entity) -> Option<f32> {
        self.requests
            .iter()
            .find(|r| r.instance == instance)
            .map(|r| r.remaining)
    }

    /// Is a request pending for this instance?
    #[must_use]
    pub fn contains(&self, instance: Entity) -> bool {
        self.requests.iter().any(|r| r.instance == instance)
    }

    /// Number of pending requests
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Keep only the requests whose instance passes `keep`
    pub fn retain(&mut self, keep: impl Fn(Entity) -> bool) {
        self.requests.retain(|r| keep(r.instance));
    }

    /// Drop every pending request
    pub fn clear(&mut self) {
        self.requests.clear();
    }

    /// Iterate over pending requests
    pub fn iter(&self) -> impl Iterator<Item = &DelayedRelease> {
        self.requests.iter()
    }
}

impl Default for DelayedReleaseQueue {
    fn default() -> Self {
        Self::new(DelayedConflictPolicy::ResetDelay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(count: usize) -> Vec<Entity> {
        let mut world = hecs::World::new();
        (0..count).map(|_| world.spawn(())).collect()
    }

    fn queue(policy: DelayedConflictPolicy) -> DelayedReleaseQueue {
        DelayedReleaseQueue::new(policy)
    }

    #[test]
    fn test_tick_fires_when_due() {
        let e = entities(2);
        let mut q = queue(DelayedConflictPolicy::ResetDelay);
        q.schedule(e[0], 1.0, true).unwrap();
        q.schedule(e[1], 0.25, true).unwrap();

        let mut due = Vec::new();
        q.tick(0.5, |_| false, &mut due);
        assert_eq!(due, vec![e[1]]);
        assert_eq!(q.len(), 1);

        due.clear();
        q.tick(0.5, |_| false, &mut due);
        assert_eq!(due, vec![e[0]]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_stale_requests_are_dropped() {
        let e = entities(3);
        let mut q = queue(DelayedConflictPolicy::ResetDelay);
        for &entity in &e {
            q.schedule(entity, 0.1, true).unwrap();
        }

        let mut due = Vec::new();
        q.tick(1.0, |entity| entity == e[0] || entity == e[2], &mut due);

        assert_eq!(due, vec![e[1]]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_reset_delay_if_less() {
        let e = entities(1);
        let mut q = queue(DelayedConflictPolicy::ResetDelayIfNewTimeIsLess);

        assert_eq!(q.schedule(e[0], 5.0, true), Ok(ScheduleOutcome::Scheduled));
        assert_eq!(q.schedule(e[0], 3.0, true), Ok(ScheduleOutcome::Updated));
        assert_eq!(q.remaining(e[0]), Some(3.0));
        assert_eq!(q.schedule(e[0], 10.0, true), Ok(ScheduleOutcome::Kept));
        assert_eq!(q.remaining(e[0]), Some(3.0));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_reset_delay_overwrites() {
        let e = entities(1);
        let mut q = queue(DelayedConflictPolicy::ResetDelay);

        assert_eq!(q.schedule(e[0], 2.0, true), Ok(ScheduleOutcome::Scheduled));
        assert_eq!(q.schedule(e[0], 5.0, true), Ok(ScheduleOutcome::Updated));
        assert_eq!(q.remaining(e[0]), Some(5.0));
        assert_eq!(q.schedule(e[0], 0.5, true), Ok(ScheduleOutcome::Updated));
        assert_eq!(q.remaining(e[0]), Some(0.5));
        assert_eq!(q.len(), 1);

        let mut due = Vec::new();
        q.tick(0.6, |_| false, &mut due);
        assert_eq!(due, vec![e[0]]);
    }

    #[test]
    fn test_retain() {
        let e = entities(3);
        let mut q = queue(DelayedConflictPolicy::ResetDelay);
        for &entity in &e {
            q.schedule(entity, 1.0, true).unwrap();
        }

        q.retain(|entity| entity != e[1]);
        assert_eq!(q.len(), 2);
        assert!(!q.contains(e[1]));
    }

    #[test]
    fn test_reset_delay_if_greater() {
        let e = entities(1);
        let mut q = queue(DelayedConflictPolicy::ResetDelayIfNewTimeIsGreater);

        q.schedule(e[0], 2.0, true).unwrap();
        q.schedule(e[0], 1.0, true).unwrap();
        assert_eq!(q.remaining(e[0]), Some(2.0));
        q.schedule(e[0], 4.0, true).unwrap();
        assert_eq!(q.remaining(e[0]), Some(4.0));
    }

    #[test]
    fn test_ignore_keeps_single_request() {
        let e = entities(1);
        let mut q = queue(DelayedConflictPolicy::Ignore);

        q.schedule(e[0], 2.0, true).unwrap();
        assert_eq!(q.schedule(e[0], 0.5, true), Ok(ScheduleOutcome::Kept));
        assert_eq!(q.len(), 1);
        assert_eq!(q.remaining(e[0]), Some(2.0));
    }

    #[test]
    fn test_throw_exception_strictness() {
        let e = entities(1);
        let mut q = queue(DelayedConflictPolicy::ThrowException);
        q.schedule(e[0], 2.0, true).unwrap();

        assert_eq!(
            q.schedule(e[0], 1.0, true),
            Err(PoolError::DuplicateDelayedRelease(e[0]))
        );
        assert_eq!(q.schedule(e[0], 1.0, false), Ok(ScheduleOutcome::Kept));
        assert_eq!(q.remaining(e[0]), Some(2.0));
    }

    #[test]
    fn test_cancel() {
        let e = entities(2);
        let mut q = queue(DelayedConflictPolicy::ResetDelay);
        q.schedule(e[0], 1.0, true).unwrap();

        assert!(q.cancel(e[0]));
        assert!(!q.cancel(e[1]));
        assert!(!q.contains(e[0]));
    }
}
