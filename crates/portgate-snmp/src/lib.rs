//! Blocking SNMP protocol adapter for a single managed switch.
//!
//! This crate owns everything that talks SNMP on the wire:
//!
//! - **[`SnmpAdapter`]** — stateless-per-call wrapper around one switch's
//!   management endpoint. Reads interface operational/administrative state,
//!   walks the bridge forwarding table (dot1dTpFdbPort), reads the bridge's
//!   own hardware address, and writes interface administrative state.
//! - **[`oid`]** — dotted-OID helpers, including the decimal-suffix ↔
//!   hexadecimal MAC translation the forwarding table indexes by.
//!
//! The adapter knows nothing about other switches or about the device
//! inventory. `portgate-core` composes adapters into snapshots and
//! reconciliation passes.
//!
//! All calls are synchronous. Callers that need parallelism run adapters on
//! blocking worker tasks (see `portgate-core::reconcile`).

pub mod adapter;
pub mod error;
pub mod oid;

pub use adapter::{AdapterConfig, PortAdminState, PortStatus, SnmpAdapter};
pub use error::AdapterError;
