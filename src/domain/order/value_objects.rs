use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::errors::{OrderError, ParseError};

// ============================================================================
// Order Value Objects
// ============================================================================

/// Shortest accepted cancellation reason, counted in characters after trimming.
pub const MIN_CANCEL_REASON_CHARS: usize = 5;
/// Longest accepted cancellation reason, counted in characters after trimming.
pub const MAX_CANCEL_REASON_CHARS: usize = 500;

/// Opaque order identifier assigned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque identifier of a buyer, seller or admin account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Lifecycle status of an order.
///
/// Serialized in PascalCase. Parsing accepts any ASCII casing and normalizes it,
/// since the backend has been seen to send `confirmed` as well as `Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Paid,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Paid,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Paid => "Paid",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let status = Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseError::UnknownStatus(raw.to_string()))?;

        if status.as_str() != raw {
            tracing::warn!(
                raw = %raw,
                normalized = %status,
                "Normalized non-canonical order status"
            );
        }

        Ok(status)
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Permission identity an operation is invoked under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Buyer,
    Seller,
    Admin,
}

impl ActorRole {
    pub const ALL: [ActorRole; 3] = [ActorRole::Buyer, ActorRole::Seller, ActorRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Buyer => "buyer",
            ActorRole::Seller => "seller",
            ActorRole::Admin => "admin",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| ParseError::UnknownRole(raw.to_string()))
    }
}

/// Who is asking for a transition. Passed into every dispatcher call instead of
/// being read from ambient session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub user_id: UserId,
    pub role: ActorRole,
}

impl ActorContext {
    pub fn new(user_id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            user_id: UserId::new(user_id),
            role,
        }
    }

    pub fn buyer(user_id: impl Into<String>) -> Self {
        Self::new(user_id, ActorRole::Buyer)
    }

    pub fn seller(user_id: impl Into<String>) -> Self {
        Self::new(user_id, ActorRole::Seller)
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self::new(user_id, ActorRole::Admin)
    }
}

/// One line of an order. The line total is always derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn new(product_id: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// `quantity × unit_price`, or `None` on overflow
    pub fn line_total(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }
}

/// A validated cancellation reason: trimmed, 5 to 500 characters inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CancelReason(String);

impl CancelReason {
    /// The upper bound applies to the raw input, the lower bound to the
    /// trimmed text.
    pub fn parse(raw: &str) -> Result<Self, OrderError> {
        let raw_length = raw.chars().count();
        if raw_length > MAX_CANCEL_REASON_CHARS {
            return Err(OrderError::InvalidReason { length: raw_length });
        }

        let trimmed = raw.trim();
        let length = trimmed.chars().count();
        if length < MIN_CANCEL_REASON_CHARS {
            return Err(OrderError::InvalidReason { length });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CancelReason {
    type Error = OrderError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<CancelReason> for String {
    fn from(reason: CancelReason) -> Self {
        reason.0
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_any_casing() {
        assert_eq!("Confirmed".parse::<OrderStatus>().unwrap(), OrderStatus::Confirmed);
        assert_eq!("confirmed".parse::<OrderStatus>().unwrap(), OrderStatus::Confirmed);
        assert_eq!("CANCELLED".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert_eq!(" paid ".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result = "Shipped".parse::<OrderStatus>();
        assert!(matches!(result, Err(ParseError::UnknownStatus(s)) if s == "Shipped"));
    }

    #[test]
    fn test_status_serializes_pascal_case() {
        let json = serde_json::to_string(&OrderStatus::Completed).unwrap();
        assert_eq!(json, "\"Completed\"");

        let status: OrderStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, OrderStatus::Pending);
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(OrderStatus::is_terminal)
            .collect();
        assert_eq!(terminal, vec![OrderStatus::Completed, OrderStatus::Cancelled]);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Seller".parse::<ActorRole>().unwrap(), ActorRole::Seller);
        assert_eq!("buyer".parse::<ActorRole>().unwrap(), ActorRole::Buyer);
        assert!("shopper".parse::<ActorRole>().is_err());
    }

    #[test]
    fn test_line_total() {
        let item = OrderItem::new("p-1", Decimal::new(15, 1), Decimal::from(25_000));
        assert_eq!(item.line_total(), Some(Decimal::from(37_500)));
    }

    #[test]
    fn test_cancel_reason_bounds() {
        for raw in ["", "a", "ab", "abc", "abcd", "     ", "  ab  "] {
            assert!(
                matches!(CancelReason::parse(raw), Err(OrderError::InvalidReason { .. })),
                "{raw:?} should be rejected"
            );
        }

        assert!(CancelReason::parse("abcde").is_ok());
        assert!(CancelReason::parse(&"x".repeat(500)).is_ok());

        let too_long = "x".repeat(501);
        assert!(matches!(
            CancelReason::parse(&too_long),
            Err(OrderError::InvalidReason { length: 501 })
        ));
    }

    #[test]
    fn test_cancel_reason_counts_characters_not_bytes() {
        // 8 characters, 12 bytes
        let reason = CancelReason::parse("Hết hàng").unwrap();
        assert_eq!(reason.as_str(), "Hết hàng");

        // 500 multi-byte characters is still within bounds
        assert!(CancelReason::parse(&"ế".repeat(500)).is_ok());
    }

    #[test]
    fn test_cancel_reason_padding_counts_toward_upper_bound() {
        let padded = format!("{} ", "x".repeat(500));
        assert!(matches!(
            CancelReason::parse(&padded),
            Err(OrderError::InvalidReason { length: 501 })
        ));

        let padded_ok = format!("  {}  ", "x".repeat(496));
        assert_eq!(CancelReason::parse(&padded_ok).unwrap().as_str().len(), 496);
    }

    #[test]
    fn test_cancel_reason_is_trimmed() {
        let reason = CancelReason::parse("  out of stock \n").unwrap();
        assert_eq!(reason.as_str(), "out of stock");
    }

    #[test]
    fn test_cancel_reason_deserialization_validates() {
        let ok: CancelReason = serde_json::from_str("\"Customer changed mind\"").unwrap();
        assert_eq!(ok.as_str(), "Customer changed mind");

        assert!(serde_json::from_str::<CancelReason>("\"no\"").is_err());
    }
}
