//! Persistence contract for the tabular record store.
//!
//! The core never touches disk directly; it consumes this repository
//! interface. Write discipline is load-modify-store with full-replace
//! saves, so a failed save can always be retried safely. Concurrent
//! reconciliation runs must be serialized by the caller (single engine
//! instance, run-to-completion).

mod json;
mod memory;

use thiserror::Error;

use crate::model::{AccessSchedule, Machine, PortBinding, PortSnapshot, Room, Switch};

pub use json::JsonStore;
pub use memory::MemoryStore;

/// Failure to load or durably write a record table. The in-memory
/// computation that preceded a failed save is never lost; retrying the
/// save is safe (idempotent full-replace write).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record data in {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Typed repository over the record tables the core reads and writes.
///
/// Switches and rooms are inventory-managed externally, so the core only
/// reads them. Machines gain rows through discovery; bindings and
/// snapshots are fully owned by the core; schedules are append-only audit.
pub trait RecordStore: Send + Sync {
    // ── Inventory (read-only from the core's perspective) ───────────
    fn switches(&self) -> Result<Vec<Switch>, StoreError>;
    fn rooms(&self) -> Result<Vec<Room>, StoreError>;

    // ── Machines ─────────────────────────────────────────────────────
    fn machines(&self) -> Result<Vec<Machine>, StoreError>;
    fn replace_machines(&self, rows: &[Machine]) -> Result<(), StoreError>;
    fn append_machine(&self, row: &Machine) -> Result<(), StoreError>;
    /// Max existing machine id + 1.
    fn next_machine_id(&self) -> Result<u32, StoreError>;

    // ── Port bindings ────────────────────────────────────────────────
    fn bindings(&self) -> Result<Vec<PortBinding>, StoreError>;
    fn replace_bindings(&self, rows: &[PortBinding]) -> Result<(), StoreError>;

    // ── Port snapshots ───────────────────────────────────────────────
    fn snapshots(&self) -> Result<Vec<PortSnapshot>, StoreError>;
    fn replace_snapshots(&self, rows: &[PortSnapshot]) -> Result<(), StoreError>;

    // ── Access schedules (append-only audit trail) ───────────────────
    fn schedules(&self) -> Result<Vec<AccessSchedule>, StoreError>;
    fn append_schedule(&self, row: &AccessSchedule) -> Result<(), StoreError>;
}
