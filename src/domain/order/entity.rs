use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::OrderError;
use super::events::OrderEvent;
use super::state_machine::next_state;
use super::value_objects::{CancelReason, OrderId, OrderItem, OrderStatus, UserId};

// ============================================================================
// Order Entity
// ============================================================================
//
// Canonical snapshot of one order. Fields are private so the total and the
// cancel reason can never drift from the rules below:
//
//   total_amount = Σ line totals + shipping_fee - discount
//   cancel_reason.is_some() == (status == Cancelled)
//
// Transitions never mutate in place: `apply` returns the next snapshot.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OrderRecord", into = "OrderRecord")]
pub struct Order {
    id: OrderId,
    buyer_id: UserId,
    seller_id: UserId,
    items: Vec<OrderItem>,
    shipping_fee: Decimal,
    discount: Decimal,
    total_amount: Decimal,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cancel_reason: Option<CancelReason>,
}

/// Input for a brand new order, as produced by checkout
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
}

impl NewOrder {
    pub fn new(
        id: impl Into<String>,
        buyer_id: impl Into<String>,
        seller_id: impl Into<String>,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            id: OrderId::new(id),
            buyer_id: UserId::new(buyer_id),
            seller_id: UserId::new(seller_id),
            items,
            shipping_fee: Decimal::ZERO,
            discount: Decimal::ZERO,
        }
    }

    pub fn with_shipping_fee(mut self, fee: Decimal) -> Self {
        self.shipping_fee = fee;
        self
    }

    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }
}

/// Backend wire shape of an order (camelCase JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(alias = "_id")]
    pub id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub shipping_fee: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl Order {
    /// Create a new order in `Pending`
    pub fn create(new: NewOrder) -> Result<Self, OrderError> {
        let now = Utc::now();
        let total_amount = compute_total(&new.items, new.shipping_fee, new.discount)?;

        Ok(Self {
            id: new.id,
            buyer_id: new.buyer_id,
            seller_id: new.seller_id,
            items: new.items,
            shipping_fee: new.shipping_fee,
            discount: new.discount,
            total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            cancel_reason: None,
        })
    }

    /// Restore a snapshot received from the backend, checking every invariant
    pub fn from_record(record: OrderRecord) -> Result<Self, OrderError> {
        let total_amount = compute_total(&record.items, record.shipping_fee, record.discount)?;

        if let Some(reported) = record.total_amount {
            if reported != total_amount {
                return Err(OrderError::InvalidOrderData(format!(
                    "reported total {reported} does not match computed total {total_amount}"
                )));
            }
        }

        if record.updated_at < record.created_at {
            return Err(OrderError::InvalidOrderData(
                "updatedAt precedes createdAt".to_string(),
            ));
        }

        let cancel_reason = match (record.status, record.cancel_reason) {
            (OrderStatus::Cancelled, Some(reason)) => Some(
                CancelReason::parse(&reason)
                    .map_err(|e| OrderError::InvalidOrderData(format!("cancelReason: {e}")))?,
            ),
            (OrderStatus::Cancelled, None) => {
                return Err(OrderError::InvalidOrderData(
                    "cancelled order without cancelReason".to_string(),
                ))
            }
            (_, Some(_)) => {
                return Err(OrderError::InvalidOrderData(format!(
                    "cancelReason present on {} order",
                    record.status
                )))
            }
            (_, None) => None,
        };

        Ok(Self {
            id: record.id,
            buyer_id: record.buyer_id,
            seller_id: record.seller_id,
            items: record.items,
            shipping_fee: record.shipping_fee,
            discount: record.discount,
            total_amount,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
            cancel_reason,
        })
    }

    /// Apply an accepted transition, returning the next snapshot.
    ///
    /// `updated_at` never moves backwards even if the event clock lags.
    pub fn apply(&self, event: &OrderEvent) -> Result<Order, OrderError> {
        let status = next_state(self.status, event.transition(), event.actor())?;

        let mut next = self.clone();
        next.status = status;
        next.updated_at = if event.occurred_at() > self.updated_at {
            event.occurred_at()
        } else {
            // clocks disagree; still move forward
            self.updated_at + Duration::milliseconds(1)
        };
        if let OrderEvent::Cancelled(cancelled) = event {
            next.cancel_reason = Some(cancelled.reason.clone());
        }

        Ok(next)
    }

    /// Sum of line totals before shipping and discount
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().filter_map(OrderItem::line_total).sum()
    }

    /// Recompute the total from the line items
    pub fn recompute_total(&self) -> Result<Decimal, OrderError> {
        compute_total(&self.items, self.shipping_fee, self.discount)
    }

    /// Re-check the derived fields against the stored ones
    pub fn validate(&self) -> Result<(), OrderError> {
        let recomputed = self.recompute_total()?;
        if recomputed != self.total_amount {
            return Err(OrderError::InvalidOrderData(format!(
                "stored total {} does not match computed total {recomputed}",
                self.total_amount
            )));
        }
        if self.cancel_reason.is_some() != (self.status == OrderStatus::Cancelled) {
            return Err(OrderError::InvalidOrderData(
                "cancel reason does not match status".to_string(),
            ));
        }
        Ok(())
    }

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn buyer_id(&self) -> &UserId {
        &self.buyer_id
    }

    pub fn seller_id(&self) -> &UserId {
        &self.seller_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn shipping_fee(&self) -> Decimal {
        self.shipping_fee
    }

    pub fn discount(&self) -> Decimal {
        self.discount
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn cancel_reason(&self) -> Option<&CancelReason> {
        self.cancel_reason.as_ref()
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = OrderError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        Self::from_record(record)
    }
}

impl From<Order> for OrderRecord {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            items: order.items,
            shipping_fee: order.shipping_fee,
            discount: order.discount,
            total_amount: Some(order.total_amount),
            status: order.status,
            created_at: order.created_at,
            updated_at: order.updated_at,
            cancel_reason: order.cancel_reason.map(String::from),
        }
    }
}

fn compute_total(
    items: &[OrderItem],
    shipping_fee: Decimal,
    discount: Decimal,
) -> Result<Decimal, OrderError> {
    if items.is_empty() {
        return Err(OrderError::InvalidOrderData(
            "order must contain at least one item".to_string(),
        ));
    }
    if shipping_fee < Decimal::ZERO {
        return Err(OrderError::InvalidOrderData(format!(
            "negative shipping fee: {shipping_fee}"
        )));
    }
    if discount < Decimal::ZERO {
        return Err(OrderError::InvalidOrderData(format!(
            "negative discount: {discount}"
        )));
    }

    let mut subtotal = Decimal::ZERO;
    for item in items {
        if item.quantity <= Decimal::ZERO {
            return Err(OrderError::InvalidOrderData(format!(
                "quantity must be positive for product {}: {}",
                item.product_id, item.quantity
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(OrderError::InvalidOrderData(format!(
                "unit price must not be negative for product {}: {}",
                item.product_id, item.unit_price
            )));
        }
        subtotal = item
            .line_total()
            .and_then(|line| subtotal.checked_add(line))
            .ok_or_else(|| OrderError::InvalidOrderData("order total overflows".to_string()))?;
    }

    let total = subtotal
        .checked_add(shipping_fee)
        .and_then(|t| t.checked_sub(discount))
        .ok_or_else(|| OrderError::InvalidOrderData("order total overflows".to_string()))?;

    if total < Decimal::ZERO {
        return Err(OrderError::InvalidOrderData(format!(
            "discount {discount} exceeds order value"
        )));
    }

    Ok(total)
}
