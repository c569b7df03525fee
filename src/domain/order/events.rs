use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commands::OrderCommand;
use super::state_machine::Transition;
use super::value_objects::{ActorRole, CancelReason};

// ============================================================================
// Order Events - accepted transitions
// ============================================================================
//
// An event is only built after the backend has acknowledged the command.
// Applying it to an Order yields the next snapshot.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Confirmed(OrderConfirmed),
    MarkedPaid(OrderMarkedPaid),
    Completed(OrderCompleted),
    Cancelled(OrderCancelled),
}

/// Seller confirmed stock availability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub confirmed_by: ActorRole,
    pub confirmed_at: DateTime<Utc>,
}

/// Seller attested payment received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderMarkedPaid {
    pub marked_by: ActorRole,
    pub paid_at: DateTime<Utc>,
}

/// Buyer attested goods received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub completed_by: ActorRole,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub reason: CancelReason,
    pub cancelled_by: ActorRole,
    pub cancelled_at: DateTime<Utc>,
}

impl OrderEvent {
    /// The event an acknowledged command produces
    pub fn from_command(command: &OrderCommand, actor: ActorRole, at: DateTime<Utc>) -> Self {
        match command {
            OrderCommand::Confirm => OrderEvent::Confirmed(OrderConfirmed {
                confirmed_by: actor,
                confirmed_at: at,
            }),
            OrderCommand::MarkPaid => OrderEvent::MarkedPaid(OrderMarkedPaid {
                marked_by: actor,
                paid_at: at,
            }),
            OrderCommand::Complete => OrderEvent::Completed(OrderCompleted {
                completed_by: actor,
                completed_at: at,
            }),
            OrderCommand::Cancel { reason } => OrderEvent::Cancelled(OrderCancelled {
                reason: reason.clone(),
                cancelled_by: actor,
                cancelled_at: at,
            }),
        }
    }

    pub fn transition(&self) -> Transition {
        match self {
            OrderEvent::Confirmed(_) => Transition::Confirm,
            OrderEvent::MarkedPaid(_) => Transition::MarkPaid,
            OrderEvent::Completed(_) => Transition::Complete,
            OrderEvent::Cancelled(_) => Transition::Cancel,
        }
    }

    pub fn actor(&self) -> ActorRole {
        match self {
            OrderEvent::Confirmed(e) => e.confirmed_by,
            OrderEvent::MarkedPaid(e) => e.marked_by,
            OrderEvent::Completed(e) => e.completed_by,
            OrderEvent::Cancelled(e) => e.cancelled_by,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Confirmed(e) => e.confirmed_at,
            OrderEvent::MarkedPaid(e) => e.paid_at,
            OrderEvent::Completed(e) => e.completed_at,
            OrderEvent::Cancelled(e) => e.cancelled_at,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Confirmed(_) => "OrderConfirmed",
            OrderEvent::MarkedPaid(_) => "OrderMarkedPaid",
            OrderEvent::Completed(_) => "OrderCompleted",
            OrderEvent::Cancelled(_) => "OrderCancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_mirrors_command() {
        let at = Utc::now();
        let command = OrderCommand::cancel("Out of stock").unwrap();
        let event = OrderEvent::from_command(&command, ActorRole::Seller, at);

        assert_eq!(event.transition(), command.transition());
        assert_eq!(event.actor(), ActorRole::Seller);
        assert_eq!(event.occurred_at(), at);
        assert_eq!(event.event_type(), "OrderCancelled");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = OrderEvent::from_command(&OrderCommand::Confirm, ActorRole::Seller, Utc::now());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Confirmed");
        assert_eq!(json["data"]["confirmed_by"], "seller");
    }
}
