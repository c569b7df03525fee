// ============================================================================
// Order Domain - Lifecycle of a single Order
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderId, OrderStatus, ActorRole, CancelReason)
// - State machine (transition table, next_state)
// - Entity (Order snapshot, totals, validation)
// - Commands and Events (what is asked, what happened)
// - Errors (OrderError, RemoteFailure)
// - Dispatcher (local checks + one backend call per operation)
//
// ============================================================================

pub mod value_objects;
pub mod state_machine;
pub mod entity;
pub mod events;
pub mod commands;
pub mod errors;
pub mod dispatcher;

// Re-export for convenience
pub use value_objects::*;
pub use state_machine::*;
pub use entity::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use dispatcher::*;
