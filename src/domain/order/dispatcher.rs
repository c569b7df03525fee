use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::backend::{BackendApi, TransitionRequest};
use crate::metrics::DispatchMetrics;
use crate::utils::{InFlightGuard, InFlightRegistry};

use super::commands::OrderCommand;
use super::entity::Order;
use super::errors::{OrderError, RemoteFailure};
use super::events::OrderEvent;
use super::state_machine::{next_state, Transition};
use super::value_objects::{ActorContext, ActorRole, OrderId};

// ============================================================================
// Order Command Dispatcher
// ============================================================================
//
// Orchestrates: local checks -> State Machine -> one Backend call -> new Order
//
// Every local rejection happens before the backend is contacted. The caller's
// order is never modified; success returns a fresh snapshot. Nothing is
// retried here.
//
// ============================================================================

pub struct OrderDispatcher {
    backend: Arc<dyn BackendApi>,
    metrics: Option<Arc<DispatchMetrics>>,
    in_flight: Option<InFlightRegistry<OrderId>>,
}

impl OrderDispatcher {
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        Self {
            backend,
            metrics: None,
            in_flight: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Refuse a second transition on an order while one is awaiting the backend
    pub fn with_in_flight_guard(mut self, registry: InFlightRegistry<OrderId>) -> Self {
        self.in_flight = Some(registry);
        self
    }

    /// Pending -> Confirmed (seller)
    pub async fn confirm(&self, order: &Order, actor: &ActorContext) -> Result<Order, OrderError> {
        self.dispatch(order, actor, OrderCommand::Confirm).await
    }

    /// Confirmed -> Paid (seller)
    pub async fn mark_paid(&self, order: &Order, actor: &ActorContext) -> Result<Order, OrderError> {
        self.dispatch(order, actor, OrderCommand::MarkPaid).await
    }

    /// Paid -> Completed (buyer only, checked before anything else)
    pub async fn complete(&self, order: &Order, actor: &ActorContext) -> Result<Order, OrderError> {
        self.dispatch(order, actor, OrderCommand::Complete).await
    }

    /// Current -> Cancelled. The reason is validated before any other check.
    pub async fn cancel(
        &self,
        order: &Order,
        actor: &ActorContext,
        reason: &str,
    ) -> Result<Order, OrderError> {
        let command = match OrderCommand::cancel(reason) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id(),
                    role = %actor.role,
                    error = %e,
                    "Cancellation rejected locally"
                );
                self.record(Transition::Cancel, e.metric_label());
                return Err(e);
            }
        };

        self.dispatch(order, actor, command).await
    }

    /// Re-fetch the canonical order, e.g. after a `Conflict`
    pub async fn refresh(&self, order_id: &OrderId) -> Result<Order, OrderError> {
        Ok(self.backend.fetch_order(order_id).await?)
    }

    /// Single entry point behind the four operations
    pub async fn dispatch(
        &self,
        order: &Order,
        actor: &ActorContext,
        command: OrderCommand,
    ) -> Result<Order, OrderError> {
        let transition = command.transition();
        let result = self.execute(order, actor, command).await;

        let outcome = match &result {
            Ok(_) => "accepted",
            Err(e) => e.metric_label(),
        };
        self.record(transition, outcome);

        result
    }

    async fn execute(
        &self,
        order: &Order,
        actor: &ActorContext,
        command: OrderCommand,
    ) -> Result<Order, OrderError> {
        let transition = command.transition();

        self.authorize(order, actor, transition)?;

        let target = next_state(order.status(), transition, actor.role).map_err(|e| {
            tracing::warn!(
                order_id = %order.id(),
                status = %order.status(),
                transition = %transition,
                role = %actor.role,
                "Illegal transition rejected locally"
            );
            OrderError::from(e)
        })?;

        let _guard = self.acquire(order.id())?;

        let request = TransitionRequest::new(order.id().clone(), actor.clone(), command);
        let started = Instant::now();
        let result = self.backend.submit(&request).await;

        if let Some(metrics) = &self.metrics {
            metrics.observe_remote_call(transition.as_str(), started.elapsed().as_secs_f64());
        }

        let ack = result.map_err(|failure| {
            match &failure {
                RemoteFailure::Conflict { .. } => tracing::warn!(
                    order_id = %order.id(),
                    transition = %transition,
                    request_id = %request.request_id,
                    error = %failure,
                    "Backend reports a conflicting state, snapshot is stale"
                ),
                _ => tracing::error!(
                    order_id = %order.id(),
                    transition = %transition,
                    request_id = %request.request_id,
                    error = %failure,
                    "Backend call failed"
                ),
            }
            OrderError::Remote(failure)
        })?;

        if let Some(remote_status) = ack.status {
            if remote_status != target {
                tracing::warn!(
                    order_id = %order.id(),
                    expected = %target,
                    reported = %remote_status,
                    "Backend acknowledged a different status"
                );
                return Err(RemoteFailure::Conflict {
                    message: format!("backend reports {remote_status}, expected {target}"),
                    remote_status: Some(remote_status),
                }
                .into());
            }
        }

        if let (OrderCommand::Cancel { reason }, Some(remote_reason)) =
            (&request.command, ack.cancel_reason.as_deref())
        {
            if remote_reason.trim() != reason.as_str() {
                tracing::warn!(
                    order_id = %order.id(),
                    submitted = %reason,
                    reported = remote_reason,
                    "Backend stored a different cancel reason"
                );
                return Err(RemoteFailure::Conflict {
                    message: "backend reports a different cancel reason".to_string(),
                    remote_status: ack.status,
                }
                .into());
            }
        }

        // the backend's clock is authoritative when it reports one
        let occurred_at = ack.updated_at.unwrap_or_else(Utc::now);
        let event = OrderEvent::from_command(&request.command, actor.role, occurred_at);
        let updated = order.apply(&event)?;

        tracing::info!(
            order_id = %order.id(),
            from = %order.status(),
            to = %updated.status(),
            role = %actor.role,
            request_id = %request.request_id,
            "Order transition accepted"
        );

        Ok(updated)
    }

    /// Role and party checks that do not depend on the current status
    fn authorize(
        &self,
        order: &Order,
        actor: &ActorContext,
        transition: Transition,
    ) -> Result<(), OrderError> {
        let permitted = match (transition, actor.role) {
            (Transition::Complete, role) if role != ActorRole::Buyer => false,
            (_, ActorRole::Buyer) => *order.buyer_id() == actor.user_id,
            (_, ActorRole::Seller) => *order.seller_id() == actor.user_id,
            // admins are never a party; the transition table rejects them
            (_, ActorRole::Admin) => true,
        };

        if permitted {
            return Ok(());
        }

        tracing::warn!(
            order_id = %order.id(),
            user = %actor.user_id,
            role = %actor.role,
            transition = %transition,
            "Unauthorized transition rejected locally"
        );

        Err(OrderError::Unauthorized {
            order_id: order.id().clone(),
            user: actor.user_id.to_string(),
            role: actor.role,
            transition,
        })
    }

    fn acquire(&self, order_id: &OrderId) -> Result<Option<InFlightGuard<OrderId>>, OrderError> {
        match &self.in_flight {
            None => Ok(None),
            Some(registry) => match registry.try_acquire(order_id) {
                Some(guard) => Ok(Some(guard)),
                None => {
                    tracing::warn!(order_id = %order_id, "Transition already in flight");
                    Err(OrderError::TransitionInFlight(order_id.clone()))
                }
            },
        }
    }

    fn record(&self, transition: Transition, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_outcome(transition.as_str(), outcome);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
