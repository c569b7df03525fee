use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::IllegalTransition;
use super::value_objects::{ActorRole, OrderStatus};

// ============================================================================
// Order State Machine
// ============================================================================
//
// Pending -> Confirmed -> Paid -> Completed, with Cancelled as a side exit
// from Pending (buyer or seller) and Confirmed (seller only).
//
// Pure functions only: no I/O, no clock, no shared state.
//
// ============================================================================

/// A requested change of order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    Confirm,
    MarkPaid,
    Complete,
    Cancel,
}

impl Transition {
    pub const ALL: [Transition; 4] = [
        Transition::Confirm,
        Transition::MarkPaid,
        Transition::Complete,
        Transition::Cancel,
    ];

    /// Status an accepted transition lands in
    pub fn target(&self) -> OrderStatus {
        match self {
            Transition::Confirm => OrderStatus::Confirmed,
            Transition::MarkPaid => OrderStatus::Paid,
            Transition::Complete => OrderStatus::Completed,
            Transition::Cancel => OrderStatus::Cancelled,
        }
    }

    /// Kebab-case name, also the backend path segment
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::MarkPaid => "mark-paid",
            Transition::Complete => "complete",
            Transition::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Rule {
    from: OrderStatus,
    transition: Transition,
    roles: &'static [ActorRole],
}

const TRANSITION_TABLE: &[Rule] = &[
    Rule {
        from: OrderStatus::Pending,
        transition: Transition::Confirm,
        roles: &[ActorRole::Seller],
    },
    Rule {
        from: OrderStatus::Pending,
        transition: Transition::Cancel,
        roles: &[ActorRole::Seller, ActorRole::Buyer],
    },
    Rule {
        from: OrderStatus::Confirmed,
        transition: Transition::MarkPaid,
        roles: &[ActorRole::Seller],
    },
    Rule {
        from: OrderStatus::Confirmed,
        transition: Transition::Cancel,
        roles: &[ActorRole::Seller],
    },
    Rule {
        from: OrderStatus::Paid,
        transition: Transition::Complete,
        roles: &[ActorRole::Buyer],
    },
];

/// Decide the status that follows `current` when `role` requests `transition`.
pub fn next_state(
    current: OrderStatus,
    transition: Transition,
    role: ActorRole,
) -> Result<OrderStatus, IllegalTransition> {
    let allowed = TRANSITION_TABLE.iter().any(|rule| {
        rule.from == current && rule.transition == transition && rule.roles.contains(&role)
    });

    if allowed {
        Ok(transition.target())
    } else {
        Err(IllegalTransition {
            from: current,
            transition,
            role,
        })
    }
}

/// Transitions `role` may request from `status`, in table order
pub fn allowed_transitions(status: OrderStatus, role: ActorRole) -> Vec<Transition> {
    TRANSITION_TABLE
        .iter()
        .filter(|rule| rule.from == status && rule.roles.contains(&role))
        .map(|rule| rule.transition)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGAL: &[(OrderStatus, Transition, ActorRole)] = &[
        (OrderStatus::Pending, Transition::Confirm, ActorRole::Seller),
        (OrderStatus::Pending, Transition::Cancel, ActorRole::Seller),
        (OrderStatus::Pending, Transition::Cancel, ActorRole::Buyer),
        (OrderStatus::Confirmed, Transition::MarkPaid, ActorRole::Seller),
        (OrderStatus::Confirmed, Transition::Cancel, ActorRole::Seller),
        (OrderStatus::Paid, Transition::Complete, ActorRole::Buyer),
    ];

    fn all_triples() -> impl Iterator<Item = (OrderStatus, Transition, ActorRole)> {
        OrderStatus::ALL.into_iter().flat_map(|status| {
            Transition::ALL.into_iter().flat_map(move |transition| {
                ActorRole::ALL
                    .into_iter()
                    .map(move |role| (status, transition, role))
            })
        })
    }

    #[test]
    fn test_legal_transitions_reach_their_target() {
        for &(status, transition, role) in LEGAL {
            assert_eq!(next_state(status, transition, role), Ok(transition.target()));
        }
    }

    #[test]
    fn test_everything_outside_the_table_is_illegal() {
        let mut illegal = 0;
        for (status, transition, role) in all_triples() {
            if LEGAL.contains(&(status, transition, role)) {
                continue;
            }
            illegal += 1;
            assert_eq!(
                next_state(status, transition, role),
                Err(IllegalTransition {
                    from: status,
                    transition,
                    role
                }),
                "{status} --{transition}--> as {role} should be illegal"
            );
        }
        assert_eq!(illegal, 5 * 4 * 3 - LEGAL.len());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for (status, transition, role) in all_triples().filter(|(s, _, _)| s.is_terminal()) {
            assert!(next_state(status, transition, role).is_err());
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for (status, transition, role) in all_triples() {
            if let Ok(next) = next_state(status, transition, role) {
                assert_ne!(next, status);
            }
        }
    }

    #[test]
    fn test_wrong_role_on_a_legal_pair() {
        assert!(next_state(OrderStatus::Pending, Transition::Confirm, ActorRole::Buyer).is_err());
        assert!(next_state(OrderStatus::Confirmed, Transition::Cancel, ActorRole::Buyer).is_err());
        assert!(next_state(OrderStatus::Paid, Transition::Complete, ActorRole::Seller).is_err());
    }

    #[test]
    fn test_admin_has_no_transitions() {
        for status in OrderStatus::ALL {
            assert!(allowed_transitions(status, ActorRole::Admin).is_empty());
        }
    }

    #[test]
    fn test_allowed_transitions() {
        assert_eq!(
            allowed_transitions(OrderStatus::Pending, ActorRole::Seller),
            vec![Transition::Confirm, Transition::Cancel]
        );
        assert_eq!(
            allowed_transitions(OrderStatus::Pending, ActorRole::Buyer),
            vec![Transition::Cancel]
        );
        assert_eq!(
            allowed_transitions(OrderStatus::Paid, ActorRole::Buyer),
            vec![Transition::Complete]
        );
        assert!(allowed_transitions(OrderStatus::Completed, ActorRole::Buyer).is_empty());
    }
}
