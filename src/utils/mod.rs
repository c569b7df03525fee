pub mod circuit_breaker;
pub mod in_flight;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use in_flight::{InFlightGuard, InFlightRegistry};
