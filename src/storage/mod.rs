//! Storage for configuration and the shared PRD document.

pub mod atomic;
pub mod config;
pub mod paths;
pub mod prd_lock;

pub use atomic::atomic_write;
pub use config::{
    Config, ConfigSource, ENV_CONFIG, ENV_MODEL, ENV_TIMEOUT, ResolvedUltrathink,
    UltrathinkOverrides,
};
pub use paths::AppPaths;
pub use prd_lock::{LockEvent, LockStatus, PrdLock, PrdLockConfig, WriteOutcome, lock_key};
