// ── File-backed record store ──
//
// One JSON array file per entity under a data directory. Loads tolerate
// a missing file (empty table); saves rewrite the whole file, matching
// the full-replace write discipline of the store contract.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::model::{AccessSchedule, Machine, PortBinding, PortSnapshot, Room, Switch};

use super::{RecordStore, StoreError};

const SWITCHES_FILE: &str = "switches.json";
const ROOMS_FILE: &str = "rooms.json";
const MACHINES_FILE: &str = "machines.json";
const BINDINGS_FILE: &str = "bindings.json";
const SNAPSHOTS_FILE: &str = "snapshots.json";
const SCHEDULES_FILE: &str = "schedules.json";

/// [`RecordStore`] persisting each table as a pretty-printed JSON array
/// under `dir`.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open (and create, if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StoreError> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }

    // Write-then-rename: an interrupted save leaves the previous table
    // intact, so a failed save is always retryable.
    fn save<T: Serialize>(&self, file: &str, rows: &[T]) -> Result<(), StoreError> {
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{file}.tmp"));
        let raw = serde_json::to_string_pretty(rows).map_err(|source| StoreError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;
        fs::write(&tmp, raw).map_err(|source| StoreError::Io {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), rows = rows.len(), "table written");
        Ok(())
    }
}

impl RecordStore for JsonStore {
    fn switches(&self) -> Result<Vec<Switch>, StoreError> {
        self.load(SWITCHES_FILE)
    }

    fn rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.load(ROOMS_FILE)
    }

    fn machines(&self) -> Result<Vec<Machine>, StoreError> {
        self.load(MACHINES_FILE)
    }

    fn replace_machines(&self, rows: &[Machine]) -> Result<(), StoreError> {
        self.save(MACHINES_FILE, rows)
    }

    fn append_machine(&self, row: &Machine) -> Result<(), StoreError> {
        let mut rows = self.machines()?;
        rows.push(row.clone());
        self.save(MACHINES_FILE, &rows)
    }

    fn next_machine_id(&self) -> Result<u32, StoreError> {
        Ok(self.machines()?.iter().map(|m| m.id).max().unwrap_or(0) + 1)
    }

    fn bindings(&self) -> Result<Vec<PortBinding>, StoreError> {
        self.load(BINDINGS_FILE)
    }

    fn replace_bindings(&self, rows: &[PortBinding]) -> Result<(), StoreError> {
        self.save(BINDINGS_FILE, rows)
    }

    fn snapshots(&self) -> Result<Vec<PortSnapshot>, StoreError> {
        self.load(SNAPSHOTS_FILE)
    }

    fn replace_snapshots(&self, rows: &[PortSnapshot]) -> Result<(), StoreError> {
        self.save(SNAPSHOTS_FILE, rows)
    }

    fn schedules(&self) -> Result<Vec<AccessSchedule>, StoreError> {
        self.load(SCHEDULES_FILE)
    }

    fn append_schedule(&self, row: &AccessSchedule) -> Result<(), StoreError> {
        let mut rows = self.schedules()?;
        rows.push(row.clone());
        self.save(SCHEDULES_FILE, &rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::MacAddress;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_tables_load_empty() {
        let (_dir, store) = store();
        assert!(store.machines().unwrap().is_empty());
        assert!(store.bindings().unwrap().is_empty());
        assert_eq!(store.next_machine_id().unwrap(), 1);
    }

    #[test]
    fn replace_round_trips() {
        let (_dir, store) = store();
        let rows = vec![PortBinding {
            machine_id: 3,
            switch_id: 1,
            port: 7,
            up: true,
        }];
        store.replace_bindings(&rows).unwrap();
        assert_eq!(store.bindings().unwrap(), rows);

        // Full replace, not append.
        store.replace_bindings(&[]).unwrap();
        assert!(store.bindings().unwrap().is_empty());
    }

    #[test]
    fn saves_rename_into_place() {
        let (dir, store) = store();
        let rows = vec![PortBinding {
            machine_id: 3,
            switch_id: 1,
            port: 7,
            up: true,
        }];
        store.replace_bindings(&rows).unwrap();
        store.replace_bindings(&rows).unwrap();

        // Only the table file remains after the rename.
        assert!(dir.path().join("bindings.json").exists());
        assert!(!dir.path().join("bindings.json.tmp").exists());
        assert_eq!(store.bindings().unwrap(), rows);
    }

    #[test]
    fn append_and_next_id() {
        let (_dir, store) = store();
        store
            .append_machine(&Machine::discovered(4, MacAddress::new("AA:BB:CC:DD:EE:01")))
            .unwrap();
        store
            .append_machine(&Machine::discovered(9, MacAddress::new("AA:BB:CC:DD:EE:02")))
            .unwrap();
        assert_eq!(store.machines().unwrap().len(), 2);
        assert_eq!(store.next_machine_id().unwrap(), 10);
    }
}
