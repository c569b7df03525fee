use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{BackendApi, TransitionAck, TransitionRequest};
use crate::domain::order::{ActorRole, Order, OrderEvent, OrderId, RemoteFailure};

/// Authoritative in-process order store speaking the `BackendApi` contract.
///
/// Runs the same state machine server-side, so a request built from a stale
/// snapshot comes back as `Conflict`. Counts `submit` calls and can simulate
/// latency and a dropped connection.
#[derive(Default)]
pub struct InMemoryBackend {
    orders: Mutex<HashMap<OrderId, Order>>,
    calls: AtomicUsize,
    fail_next: AtomicBool,
    latency: Duration,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let orders = orders
            .into_iter()
            .map(|order| (order.id().clone(), order))
            .collect();

        Self {
            orders: Mutex::new(orders),
            ..Self::default()
        }
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn insert(&self, order: Order) {
        self.orders.lock().await.insert(order.id().clone(), order);
    }

    pub async fn get(&self, order_id: &OrderId) -> Option<Order> {
        self.orders.lock().await.get(order_id).cloned()
    }

    /// Number of `submit` calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next `submit` fail as if the network dropped
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BackendApi for InMemoryBackend {
    async fn submit(&self, request: &TransitionRequest) -> Result<TransitionAck, RemoteFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(RemoteFailure::Unreachable("simulated network failure".to_string()));
        }

        let mut orders = self.orders.lock().await;
        let current = orders
            .get(&request.order_id)
            .ok_or_else(|| RemoteFailure::NotFound(request.order_id.clone()))?;

        let party = match request.actor.role {
            ActorRole::Buyer => Some(current.buyer_id()),
            ActorRole::Seller => Some(current.seller_id()),
            ActorRole::Admin => None,
        };
        if party.is_some_and(|party| *party != request.actor.user_id) {
            return Err(RemoteFailure::Rejected {
                status: Some(403),
                message: format!("{} is not a party to this order", request.actor.user_id),
            });
        }

        let event = OrderEvent::from_command(&request.command, request.actor.role, Utc::now());
        let next = current.apply(&event).map_err(|e| RemoteFailure::Conflict {
            message: e.to_string(),
            remote_status: Some(current.status()),
        })?;

        let ack = TransitionAck {
            status: Some(next.status()),
            updated_at: Some(next.updated_at()),
            cancel_reason: next.cancel_reason().map(|reason| reason.as_str().to_string()),
        };

        tracing::debug!(
            order_id = %request.order_id,
            event_type = event.event_type(),
            status = %next.status(),
            "In-memory backend applied transition"
        );

        orders.insert(request.order_id.clone(), next);
        Ok(ack)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, RemoteFailure> {
        self.get(order_id)
            .await
            .ok_or_else(|| RemoteFailure::NotFound(order_id.clone()))
    }
}
