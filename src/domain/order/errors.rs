use super::state_machine::Transition;
use super::value_objects::{ActorRole, OrderId, OrderStatus};

// ============================================================================
// Order Business Rule Errors
// ============================================================================

/// The requested (status, transition, role) triple is not in the transition table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot {transition} an order in status {from} as {role}")]
pub struct IllegalTransition {
    pub from: OrderStatus,
    pub transition: Transition,
    pub role: ActorRole,
}

/// Failure reported by (or on the way to) the backend API
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteFailure {
    #[error("Order not found on backend: {0}")]
    NotFound(OrderId),

    /// The backend's state disagrees with the snapshot the caller holds.
    /// Re-fetch the order instead of retrying the same transition.
    #[error("Backend state conflict: {message}")]
    Conflict {
        message: String,
        remote_status: Option<OrderStatus>,
    },

    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Backend rejected request (status {status:?}): {message}")]
    Rejected { status: Option<u16>, message: String },
}

impl RemoteFailure {
    pub fn metric_label(&self) -> &'static str {
        match self {
            RemoteFailure::NotFound(_) => "remote_not_found",
            RemoteFailure::Conflict { .. } => "remote_conflict",
            RemoteFailure::Unreachable(_) => "remote_unreachable",
            RemoteFailure::Rejected { .. } => "remote_rejected",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("Invalid order data: {0}")]
    InvalidOrderData(String),

    #[error("Cancellation reason must be 5-500 characters, got {length}")]
    InvalidReason { length: usize },

    #[error("{role} {user} is not permitted to {transition} order {order_id}")]
    Unauthorized {
        order_id: OrderId,
        user: String,
        role: ActorRole,
        transition: Transition,
    },

    #[error("A transition is already in flight for order {0}")]
    TransitionInFlight(OrderId),

    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}

impl OrderError {
    /// True when the caller's snapshot is stale and should be re-fetched
    pub fn is_conflict(&self) -> bool {
        matches!(self, OrderError::Remote(RemoteFailure::Conflict { .. }))
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            OrderError::IllegalTransition(_) => "illegal",
            OrderError::InvalidOrderData(_) => "invalid_order",
            OrderError::InvalidReason { .. } => "invalid_reason",
            OrderError::Unauthorized { .. } => "unauthorized",
            OrderError::TransitionInFlight(_) => "in_flight",
            OrderError::Remote(failure) => failure.metric_label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error("Unknown actor role: {0}")]
    UnknownRole(String),
}
