// ============================================================================
// Backend API - the remote authority on order state
// ============================================================================
//
// The dispatcher talks to the backend only through `BackendApi`. Two
// implementations live here:
// - http   - reqwest client for the storefront REST API
// - memory - authoritative in-process store, for tests and the demo
//
// ============================================================================

mod http;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::order::{ActorContext, Order, OrderCommand, OrderId, OrderStatus, RemoteFailure};

pub use http::HttpBackend;
pub use memory::InMemoryBackend;

/// One transition request as sent to the backend
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub request_id: Uuid,
    pub order_id: OrderId,
    pub actor: ActorContext,
    pub command: OrderCommand,
}

impl TransitionRequest {
    pub fn new(order_id: OrderId, actor: ActorContext, command: OrderCommand) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            order_id,
            actor,
            command,
        }
    }
}

/// What the backend reports after accepting a transition.
/// Every field is optional; an empty ack means "accepted, nothing to add".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionAck {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
}

/// Standard response envelope of the storefront API
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Ask the backend to perform one transition. Called at most once per
    /// dispatcher operation.
    async fn submit(&self, request: &TransitionRequest) -> Result<TransitionAck, RemoteFailure>;

    /// Fetch the canonical order, used to recover from a conflict
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, RemoteFailure>;
}
