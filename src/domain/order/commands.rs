use super::errors::OrderError;
use super::state_machine::Transition;
use super::value_objects::CancelReason;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OrderCommand {
    Confirm,
    MarkPaid,
    Complete,
    Cancel { reason: CancelReason },
}

impl OrderCommand {
    /// Build a cancel command, validating the raw reason
    pub fn cancel(reason: &str) -> Result<Self, OrderError> {
        Ok(OrderCommand::Cancel {
            reason: CancelReason::parse(reason)?,
        })
    }

    pub fn transition(&self) -> Transition {
        match self {
            OrderCommand::Confirm => Transition::Confirm,
            OrderCommand::MarkPaid => Transition::MarkPaid,
            OrderCommand::Complete => Transition::Complete,
            OrderCommand::Cancel { .. } => Transition::Cancel,
        }
    }
}
