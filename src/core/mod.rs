//! Core infrastructure: providers, transport, logging and admission control.

pub mod credentials;
pub mod events;
pub mod http;
pub mod logging;
pub mod provider;
pub mod rate_limit;

pub use credentials::Credentials;
pub use events::Observer;
pub use http::ApiResponse;
pub use provider::Provider;
pub use rate_limit::{
    CircuitState, ExecuteFailure, ExecuteHooks, ExecuteOutcome, ProviderBudget, ProviderStatus,
    RateLimitConfig, RateLimitEvent, RateLimiter,
};
