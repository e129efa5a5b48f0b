//! Core module
//!
//! Configuration, the crate error type and the pool event queue

mod config;
mod error;
mod events;

pub use config::{
    DelayedConflictPolicy, NotificationMode, OverflowPolicy, PoolSettings, RegistryConfig,
    ReleasePolicy,
};
pub use error::{PoolError, PoolResult};
pub use events::{EventQueue, PoolEvent};
