// ── Core error types ──
//
// User-facing errors from portgate-core. Adapter and store failures are
// wrapped rather than re-exposed raw; callers pattern-match on variants
// instead of inspecting swallowed exceptions.

use thiserror::Error;

use crate::store::StoreError;
use portgate_snmp::AdapterError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Switch not found: {identifier}")]
    SwitchNotFound { identifier: String },

    #[error("Machine not found: {identifier}")]
    MachineNotFound { identifier: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Wrapped collaborator failures ────────────────────────────────
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The deferred-execution facility rejected or failed an operation.
    #[error("Deferred execution error: {message}")]
    Deferred { message: String },
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn deferred(message: impl Into<String>) -> Self {
        Self::Deferred {
            message: message.into(),
        }
    }
}
