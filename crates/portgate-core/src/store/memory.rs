// ── In-memory record store ──
//
// Backs tests and ad-hoc tooling. Same replace/append semantics as the
// file-backed store, without the disk.

use std::sync::Mutex;

use crate::model::{AccessSchedule, Machine, PortBinding, PortSnapshot, Room, Switch};

use super::{RecordStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    switches: Vec<Switch>,
    rooms: Vec<Room>,
    machines: Vec<Machine>,
    bindings: Vec<PortBinding>,
    snapshots: Vec<PortSnapshot>,
    schedules: Vec<AccessSchedule>,
}

/// Mutex-backed [`RecordStore`] holding every table in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the (externally managed) switch inventory.
    pub fn seed_switches(&self, rows: Vec<Switch>) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.switches = rows;
        }
    }

    /// Seed the (externally managed) room inventory.
    pub fn seed_rooms(&self, rows: Vec<Room>) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.rooms = rows;
        }
    }

    /// Seed machines without going through discovery.
    pub fn seed_machines(&self, rows: Vec<Machine>) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.machines = rows;
        }
    }

    /// Seed snapshot rows directly (normally written by the engine).
    pub fn seed_snapshots(&self, rows: Vec<PortSnapshot>) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.snapshots = rows;
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T, StoreError> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&mut tables))
    }
}

impl RecordStore for MemoryStore {
    fn switches(&self) -> Result<Vec<Switch>, StoreError> {
        self.with(|t| t.switches.clone())
    }

    fn rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.with(|t| t.rooms.clone())
    }

    fn machines(&self) -> Result<Vec<Machine>, StoreError> {
        self.with(|t| t.machines.clone())
    }

    fn replace_machines(&self, rows: &[Machine]) -> Result<(), StoreError> {
        self.with(|t| t.machines = rows.to_vec())
    }

    fn append_machine(&self, row: &Machine) -> Result<(), StoreError> {
        self.with(|t| t.machines.push(row.clone()))
    }

    fn next_machine_id(&self) -> Result<u32, StoreError> {
        self.with(|t| t.machines.iter().map(|m| m.id).max().unwrap_or(0) + 1)
    }

    fn bindings(&self) -> Result<Vec<PortBinding>, StoreError> {
        self.with(|t| t.bindings.clone())
    }

    fn replace_bindings(&self, rows: &[PortBinding]) -> Result<(), StoreError> {
        self.with(|t| t.bindings = rows.to_vec())
    }

    fn snapshots(&self) -> Result<Vec<PortSnapshot>, StoreError> {
        self.with(|t| t.snapshots.clone())
    }

    fn replace_snapshots(&self, rows: &[PortSnapshot]) -> Result<(), StoreError> {
        self.with(|t| t.snapshots = rows.to_vec())
    }

    fn schedules(&self) -> Result<Vec<AccessSchedule>, StoreError> {
        self.with(|t| t.schedules.clone())
    }

    fn append_schedule(&self, row: &AccessSchedule) -> Result<(), StoreError> {
        self.with(|t| t.schedules.push(row.clone()))
    }
}
