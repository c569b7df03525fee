// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Pure order rules plus the dispatcher that drives them against a backend.
// Transport lives in `crate::backend`.
//
// ============================================================================

pub mod order;
