//! Error type shared by every pool operation

use hecs::Entity;

use crate::pool::PrototypeKey;

/// Result alias used across the crate
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur while managing pools and their instances
#[derive(Debug, Clone, PartialEq)]
pub enum PoolError {
    /// Capacity reached under the `ThrowException` overflow policy
    CapacityExceeded {
        /// Prototype whose pool is full
        prototype: PrototypeKey,
        /// Capacity of that pool
        capacity: usize,
    },
    /// Capacity would drop below the number of managed instances
    InvalidCapacity {
        /// Capacity that was requested
        requested: usize,
        /// Instances currently owned by the pool
        managed: usize,
    },
    /// A pool for this prototype is already installed
    DuplicatePool(PrototypeKey),
    /// A delayed release is already pending under the `ThrowException` reaction
    DuplicateDelayedRelease(Entity),
    /// The instance was disposed (or never registered) and can no longer be used
    UseAfterDispose(Entity),
    /// The instance was not created by any pool
    NotPoolManaged(Entity),
    /// The host does not know how to instantiate this prototype
    MissingPrototype(PrototypeKey),
    /// The host is quitting; pool operations are refused
    ShuttingDown,
    /// Configuration or preset could not be read or parsed
    Config(String),
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityExceeded {
                prototype,
                capacity,
            } => write!(
                f,
                "capacity of pool '{prototype}' reached ({capacity}), no instance can be spawned"
            ),
            Self::InvalidCapacity { requested, managed } => write!(
                f,
                "capacity {requested} is less than the {managed} instances owned by the pool"
            ),
            Self::DuplicatePool(prototype) => {
                write!(f, "a pool for prototype '{prototype}' already exists")
            }
            Self::DuplicateDelayedRelease(entity) => {
                write!(f, "a delayed release is already pending for {entity:?}")
            }
            Self::UseAfterDispose(entity) => write!(f, "{entity:?} has been disposed"),
            Self::NotPoolManaged(entity) => write!(f, "{entity:?} is not managed by any pool"),
            Self::MissingPrototype(prototype) => {
                write!(f, "prototype '{prototype}' is unknown to the host")
            }
            Self::ShuttingDown => write!(f, "the host is shutting down"),
            Self::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for PoolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PoolError::InvalidCapacity {
            requested: 2,
            managed: 5,
        };
        assert_eq!(
            err.to_string(),
            "capacity 2 is less than the 5 instances owned by the pool"
        );

        let err = PoolError::DuplicatePool(PrototypeKey::new("bullet"));
        assert!(err.to_string().contains("'bullet'"));
    }
}
