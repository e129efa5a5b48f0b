//! Pool and registry configuration
//!
//! Settings can be built in code with the `with_*` builders or loaded from
//! RON (preferred) or JSON documents.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{PoolError, PoolResult};

/// What a pool does when it is full and has no despawned instance to hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Reuse the oldest spawned instance. Its previous spawn ends without a
    /// despawn notification.
    Recycle,
    /// Create an unmanaged instance that is destroyed on release. No callbacks.
    Instantiate,
    /// Like `Instantiate`, but spawn/despawn notifications are delivered.
    InstantiateWithCallbacks,
    /// Return no instance.
    ReturnNullableClone,
    /// Fail with `CapacityExceeded` (strict) or return no instance (permissive).
    ThrowException,
}

impl OverflowPolicy {
    /// Whether overflow instances are created past capacity
    #[must_use]
    pub const fn instantiates(self) -> bool {
        matches!(self, Self::Instantiate | Self::InstantiateWithCallbacks)
    }
}

/// How a released instance is parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReleasePolicy {
    /// Deactivate and reparent under the pool's container
    DeactivateAndReparent,
    /// Deactivate and detach from any parent
    DeactivateAndClearParent,
    /// Deactivate only
    DeactivateOnly,
}

/// How spawn/despawn notifications reach an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationMode {
    /// No notifications
    None,
    /// Hooks attached to the instance itself
    DirectInterfaces,
    /// Hooks on the instance and all of its descendants
    InterfacesIncludingDescendants,
    /// Named message handled by the instance itself
    NamedMessageDirect,
    /// Named message handled by the instance and its descendants
    NamedMessageBroadcast,
}

/// Reaction to a delayed despawn of an instance that already has one pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DelayedConflictPolicy {
    /// Keep the pending request, drop the new one
    Ignore,
    /// Overwrite the remaining time
    ResetDelay,
    /// Overwrite only if the new delay is shorter
    ResetDelayIfNewTimeIsLess,
    /// Overwrite only if the new delay is longer
    ResetDelayIfNewTimeIsGreater,
    /// Fail with `DuplicateDelayedRelease` (strict) or do nothing (permissive)
    ThrowException,
}

/// Settings of a single pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of managed instances
    pub capacity: usize,
    /// Behaviour once capacity is reached
    pub overflow: OverflowPolicy,
    /// How released instances are parked
    pub release: ReleasePolicy,
    /// How lifecycle notifications are delivered
    pub notification: NotificationMode,
    /// Survive scene-level resets
    pub persistent: bool,
    /// Log warnings on misuse (double despawn, capacity reached while populating)
    pub warn_on_misuse: bool,
    /// Despawned instances created as soon as the pool is set up
    pub preload: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            capacity: 32,
            overflow: OverflowPolicy::InstantiateWithCallbacks,
            release: ReleasePolicy::DeactivateAndReparent,
            notification: NotificationMode::DirectInterfaces,
            persistent: false,
            warn_on_misuse: true,
            preload: 0,
        }
    }
}

impl PoolSettings {
    /// Set capacity
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set overflow policy
    #[must_use]
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Set release policy
    #[must_use]
    pub fn with_release(mut self, release: ReleasePolicy) -> Self {
        self.release = release;
        self
    }

    /// Set notification mode
    #[must_use]
    pub fn with_notification(mut self, notification: NotificationMode) -> Self {
        self.notification = notification;
        self
    }

    /// Mark the pool persistent
    #[must_use]
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Enable or disable misuse warnings
    #[must_use]
    pub fn with_warnings(mut self, warn_on_misuse: bool) -> Self {
        self.warn_on_misuse = warn_on_misuse;
        self
    }

    /// Set the preload size
    #[must_use]
    pub fn with_preload(mut self, preload: usize) -> Self {
        self.preload = preload;
        self
    }
}

/// Registry-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Settings for pools created on demand by `spawn`/`populate`
    pub defaults: PoolSettings,
    /// Reaction to repeated delayed despawns
    pub delayed_conflict: DelayedConflictPolicy,
    /// Turn `ThrowException` policies into hard errors
    pub strict: bool,
    /// Despawn live instances of persistent pools on reset
    pub despawn_persistent_on_reset: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            defaults: PoolSettings::default().with_capacity(64),
            delayed_conflict: DelayedConflictPolicy::ResetDelay,
            strict: cfg!(debug_assertions),
            despawn_persistent_on_reset: true,
        }
    }
}

impl RegistryConfig {
    /// Set the settings used for on-demand pools
    #[must_use]
    pub fn with_defaults(mut self, defaults: PoolSettings) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set the delayed despawn conflict policy
    #[must_use]
    pub fn with_delayed_conflict(mut self, policy: DelayedConflictPolicy) -> Self {
        self.delayed_conflict = policy;
        self
    }

    /// Enable or disable strict error reporting
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set whether persistent pools despawn their live instances on reset
    #[must_use]
    pub fn with_despawn_persistent_on_reset(mut self, despawn: bool) -> Self {
        self.despawn_persistent_on_reset = despawn;
        self
    }

    /// Parse a configuration from a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid configuration
    pub fn from_ron_str(source: &str) -> PoolResult<Self> {
        ron::from_str(source).map_err(|e| PoolError::Config(e.to_string()))
    }

    /// Load a configuration from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_ron(path: impl AsRef<Path>) -> PoolResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| PoolError::Config(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Parse a configuration from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid configuration
    pub fn from_json_str(source: &str) -> PoolResult<Self> {
        serde_json::from_str(source).map_err(|e| PoolError::Config(e.to_string()))
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_json(path: impl AsRef<Path>) -> PoolResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| PoolError::Config(e.to_string()))?;
        Self::from_json_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PoolSettings::default();
        assert_eq!(settings.capacity, 32);
        assert_eq!(settings.overflow, OverflowPolicy::InstantiateWithCallbacks);
        assert_eq!(settings.release, ReleasePolicy::DeactivateAndReparent);

        let config = RegistryConfig::default();
        assert_eq!(config.defaults.capacity, 64);
        assert_eq!(config.delayed_conflict, DelayedConflictPolicy::ResetDelay);
    }

    #[test]
    fn test_registry_config_ron() {
        let config = RegistryConfig::from_ron_str(
            "(defaults: (capacity: 8, overflow: Recycle), delayed_conflict: Ignore, strict: false)",
        )
        .unwrap();

        assert_eq!(config.defaults.capacity, 8);
        assert_eq!(config.defaults.overflow, OverflowPolicy::Recycle);
        // Unspecified fields keep their defaults
        assert_eq!(config.defaults.notification, NotificationMode::DirectInterfaces);
        assert_eq!(config.delayed_conflict, DelayedConflictPolicy::Ignore);
        assert!(!config.strict);
        assert!(config.despawn_persistent_on_reset);
    }

    #[test]
    fn test_registry_config_json() {
        let config =
            RegistryConfig::from_json_str(r#"{"defaults": {"persistent": true}, "strict": true}"#)
                .unwrap();
        assert!(config.defaults.persistent);
        assert!(config.strict);
    }

    #[test]
    fn test_invalid_config() {
        let result = RegistryConfig::from_ron_str("(defaults: (capacity: -1))");
        assert!(matches!(result, Err(PoolError::Config(_))));
    }

    #[test]
    fn test_overflow_instantiates() {
        assert!(OverflowPolicy::Instantiate.instantiates());
        assert!(OverflowPolicy::InstantiateWithCallbacks.instantiates());
        assert!(!OverflowPolicy::Recycle.instantiates());
    }
}
