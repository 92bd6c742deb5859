//! Business logic for portgate: lab network access control over SNMP.
//!
//! This crate owns the domain model and the four services that sit between
//! the protocol adapter (`portgate-snmp`) and the user-facing surfaces:
//!
//! - **[`snapshot`]** — builds normalized per-port snapshots for one switch,
//!   keeping only ports whose learned hardware address matches the device
//!   inventory (deliberately lossy).
//! - **[`Reconciler`]** — merges live forwarding-table probes (Pass A) and
//!   persisted snapshots (Pass B) into the machine inventory and the port
//!   binding table, discovering new devices and refreshing stale bindings.
//!   Partial SNMP failures degrade to diagnostics, never abort a run.
//! - **[`Actuator`]** — applies administrative state changes to specific
//!   ports and mirrors results into the binding table.
//! - **[`Scheduler`]** — registers deferred block/unblock command pairs with
//!   the external deferred-execution facility and records an audit trail.
//!
//! Persistence and deferred execution are consumed through the
//! [`RecordStore`] and [`DeferredExecutor`] contracts; callers inject
//! implementations (JSON files + user crontab in the CLI, in-memory fakes
//! in tests). No process-wide mutable state exists anywhere in this crate.

pub mod actuate;
pub mod error;
pub mod model;
pub mod probe;
pub mod reconcile;
pub mod schedule;
pub mod snapshot;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use actuate::{Actuator, PortActionOutcome};
pub use error::CoreError;
pub use probe::{ProbeFactory, SnmpProbeFactory, SwitchProbe};
pub use reconcile::{Diagnostic, ReconcileReport, Reconciler};
pub use schedule::{
    CronEntry, CronSpec, DeferredExecutor, MemoryExecutor, Registration, Scheduler, WindowRequest,
};
pub use store::{JsonStore, MemoryStore, RecordStore, StoreError};

// Re-export model types at the crate root for ergonomics.
pub use model::{AccessSchedule, MacAddress, Machine, PortBinding, PortSnapshot, Room, Switch};
