// ── Derived state records ──
//
// Bindings and snapshots are written exclusively by the core services;
// schedules are written by the Scheduler and kept as an audit trail.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::mac::MacAddress;

/// Persisted association between a machine and the switch/port it is
/// currently connected through. At most one row per (machine, switch);
/// reconciliation updates in place rather than appending duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub machine_id: u32,
    pub switch_id: u32,
    pub port: u16,
    /// Administrative up/down as last observed or actuated.
    pub up: bool,
}

/// Last-observed truth for one (switch, port): one row per key, replaced
/// on every snapshot run, never accumulated. Only ports whose learned
/// address matched the inventory are persisted at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSnapshot {
    pub switch_id: u32,
    pub switch_addr: String,
    pub port: u16,
    pub operational: i64,
    pub administrative: i64,
    #[serde(default)]
    pub mac: Option<MacAddress>,
    #[serde(default)]
    pub bridge_mac: Option<MacAddress>,
}

/// Audit record for a scheduled access window. Independent from the
/// deferred-execution facility's own entries, which are linked by tags
/// derived from `id`. Rows are never deleted, even on cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSchedule {
    /// Unique schedule id (uuid, hex form).
    pub id: String,
    #[serde(default)]
    pub room_id: Option<u32>,
    #[serde(default)]
    pub switch_id: Option<u32>,
    #[serde(default)]
    pub machine_id: Option<u32>,
    #[serde(default)]
    pub mac: Option<MacAddress>,
    pub switch_addr: String,
    pub community: String,
    pub snmp_version: u32,
    pub ports: Vec<u16>,
    /// Block begins (ports disabled). Minute precision.
    pub start: NaiveDateTime,
    /// Block ends (ports re-enabled). Always strictly after `start`.
    pub end: NaiveDateTime,
}
