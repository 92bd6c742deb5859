//! Scheduled access windows.
//!
//! A window is a pair of deferred one-shot commands: disable the selected
//! ports at `start`, re-enable them at `end`. The commands are handed to
//! an external deferred-execution facility through the [`DeferredExecutor`]
//! contract, tagged so they can be found and cancelled later, and every
//! registration is appended to the schedule audit trail whether or not the
//! facility accepted it.
//!
//! Timing is minute-granular: seconds are truncated, and a window whose
//! end does not lie after its start is stretched to one minute with a
//! warning rather than rejected.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{AccessSchedule, MacAddress};
use crate::store::RecordStore;

// ── Cron primitives ──────────────────────────────────────────────────

/// A one-shot cron time spec (weekday always `*`). Built from a concrete
/// datetime instead of pasted together from strings, so a malformed
/// schedule line cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronSpec {
    pub minute: u32,
    pub hour: u32,
    pub day: u32,
    pub month: u32,
}

impl CronSpec {
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self {
            minute: at.minute(),
            hour: at.hour(),
            day: at.day(),
            month: at.month(),
        }
    }
}

impl fmt::Display for CronSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {} *", self.minute, self.hour, self.day, self.month)
    }
}

/// One managed deferred command: when, what, and the tag that marks the
/// entry as ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronEntry {
    pub tag: String,
    pub spec: CronSpec,
    pub command: String,
}

/// Join an argv into a single shell command line, quoting anything the
/// shell would otherwise mangle.
pub fn shell_join(argv: &[String]) -> String {
    fn needs_quoting(arg: &str) -> bool {
        arg.is_empty()
            || !arg
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"_-./:=@+,".contains(&b))
    }

    argv.iter()
        .map(|arg| {
            if needs_quoting(arg) {
                format!("'{}'", arg.replace('\'', r"'\''"))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Deferred-execution contract ──────────────────────────────────────

/// The external facility that runs commands at a later time (the user
/// crontab in production). Mutations take effect immediately on the
/// facility's in-memory view; [`commit`](DeferredExecutor::commit) makes
/// them durable.
pub trait DeferredExecutor: Send + Sync {
    fn schedule(&self, entry: CronEntry) -> Result<(), CoreError>;

    /// Entries currently managed by us (foreign entries are invisible).
    fn entries(&self) -> Result<Vec<CronEntry>, CoreError>;

    /// Remove every entry whose tag starts with `tag_prefix`; returns how
    /// many were removed.
    fn remove_tagged(&self, tag_prefix: &str) -> Result<usize, CoreError>;

    fn commit(&self) -> Result<(), CoreError>;
}

/// In-memory [`DeferredExecutor`]; nothing to commit.
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    entries: Mutex<Vec<CronEntry>>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeferredExecutor for MemoryExecutor {
    fn schedule(&self, entry: CronEntry) -> Result<(), CoreError> {
        self.entries
            .lock()
            .map_err(|_| CoreError::deferred("executor lock poisoned"))?
            .push(entry);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CronEntry>, CoreError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| CoreError::deferred("executor lock poisoned"))?
            .clone())
    }

    fn remove_tagged(&self, tag_prefix: &str) -> Result<usize, CoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CoreError::deferred("executor lock poisoned"))?;
        let before = entries.len();
        entries.retain(|e| !e.tag.starts_with(tag_prefix));
        Ok(before - entries.len())
    }

    fn commit(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

// ── Scheduler ────────────────────────────────────────────────────────

/// Everything needed to register one access window.
#[derive(Debug, Clone)]
pub struct WindowRequest {
    pub switch_addr: String,
    pub community: String,
    pub snmp_version: u32,
    pub ports: Vec<u16>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub room_id: Option<u32>,
    pub switch_id: Option<u32>,
    pub machine_id: Option<u32>,
    pub mac: Option<MacAddress>,
}

/// Result of a registration attempt. The audit row always exists; the
/// deferred entries may not, which `registration_complete` reflects.
#[derive(Debug)]
pub struct Registration {
    pub schedule: AccessSchedule,
    pub end_adjusted: bool,
    /// Both deferred entries were found on read-back after commit.
    pub registration_complete: bool,
    pub warnings: Vec<String>,
}

/// Registers, lists, and cancels access windows.
pub struct Scheduler {
    store: Arc<dyn RecordStore>,
    executor: Arc<dyn DeferredExecutor>,
    tag_prefix: String,
    /// Argv that re-invokes this program for the deferred `port` commands
    /// (typically just the binary path).
    invoke_argv: Vec<String>,
}

fn truncate_to_minute(at: NaiveDateTime) -> NaiveDateTime {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

impl Scheduler {
    pub const DEFAULT_TAG_PREFIX: &'static str = "portgate";

    pub fn new(
        store: Arc<dyn RecordStore>,
        executor: Arc<dyn DeferredExecutor>,
        invoke_argv: Vec<String>,
    ) -> Self {
        Self {
            store,
            executor,
            tag_prefix: Self::DEFAULT_TAG_PREFIX.to_owned(),
            invoke_argv,
        }
    }

    #[must_use]
    pub fn with_tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = prefix.into();
        self
    }

    fn window_tag(&self, id: &str) -> String {
        format!("{}_{id}", self.tag_prefix)
    }

    fn port_command(&self, action: &str, request: &WindowRequest) -> String {
        let ports = request
            .ports
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut argv = self.invoke_argv.clone();
        argv.extend([
            "port".to_owned(),
            action.to_owned(),
            request.switch_addr.clone(),
            request.community.clone(),
            ports,
            "--version".to_owned(),
            request.snmp_version.to_string(),
        ]);
        shell_join(&argv)
    }

    /// Register one access window: two deferred commands plus an audit row.
    pub fn register(&self, request: &WindowRequest) -> Result<Registration, CoreError> {
        if request.ports.is_empty() {
            return Err(CoreError::validation("an access window needs at least one port"));
        }
        if request.switch_addr.trim().is_empty() {
            return Err(CoreError::validation("an access window needs a switch address"));
        }

        let start = truncate_to_minute(request.start);
        let mut end = truncate_to_minute(request.end);
        let mut warnings = Vec::new();
        let mut end_adjusted = false;
        if end <= start {
            end = start + Duration::minutes(1);
            end_adjusted = true;
            warnings.push(format!(
                "window end {} not after start {start}; stretched to {end}",
                truncate_to_minute(request.end)
            ));
        }

        let id = Uuid::new_v4().simple().to_string();
        let window_tag = self.window_tag(&id);
        let entries = [
            CronEntry {
                tag: format!("{window_tag}_start"),
                spec: CronSpec::from_datetime(start),
                command: self.port_command("disable", request),
            },
            CronEntry {
                tag: format!("{window_tag}_end"),
                spec: CronSpec::from_datetime(end),
                command: self.port_command("enable", request),
            },
        ];

        for entry in entries {
            let tag = entry.tag.clone();
            if let Err(e) = self.executor.schedule(entry) {
                warnings.push(format!("deferred entry {tag} not scheduled: {e}"));
            }
        }
        let committed = match self.executor.commit() {
            Ok(()) => true,
            Err(e) => {
                warnings.push(format!("deferred entries not committed: {e}"));
                false
            }
        };

        // Audit row first, verification second: the record of intent must
        // survive a half-failed registration.
        let schedule = AccessSchedule {
            id: id.clone(),
            room_id: request.room_id,
            switch_id: request.switch_id,
            machine_id: request.machine_id,
            mac: request.mac.clone(),
            switch_addr: request.switch_addr.clone(),
            community: request.community.clone(),
            snmp_version: request.snmp_version,
            ports: request.ports.clone(),
            start,
            end,
        };
        self.store.append_schedule(&schedule)?;

        // An uncommitted table is not durable, no matter what the
        // facility's in-memory view claims.
        let registration_complete = committed
            && match self.executor.entries() {
                Ok(entries) => {
                    entries
                        .iter()
                        .filter(|e| e.tag.starts_with(&window_tag))
                        .count()
                        >= 2
                }
                Err(e) => {
                    warnings.push(format!("deferred entries not verifiable: {e}"));
                    false
                }
            };

        if registration_complete {
            info!(window = %id, %start, %end, ports = ?request.ports, "access window registered");
        } else {
            warn!(window = %id, "access window registration incomplete");
        }

        Ok(Registration {
            schedule,
            end_adjusted,
            registration_complete,
            warnings,
        })
    }

    /// Audit rows paired with whether their deferred entries still exist.
    pub fn list(&self) -> Result<Vec<(AccessSchedule, bool)>, CoreError> {
        let entries = self.executor.entries()?;
        let rows = self.store.schedules()?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let tag = self.window_tag(&row.id);
                let active = entries.iter().any(|e| e.tag.starts_with(&tag));
                (row, active)
            })
            .collect())
    }

    /// Drop one window's deferred entries. The audit row stays.
    pub fn cancel(&self, id: &str) -> Result<usize, CoreError> {
        let removed = self.executor.remove_tagged(&self.window_tag(id))?;
        self.executor.commit()?;
        info!(window = %id, removed, "access window cancelled");
        Ok(removed)
    }

    /// Drop every managed deferred entry. Audit rows stay.
    pub fn cancel_all(&self) -> Result<usize, CoreError> {
        let removed = self
            .executor
            .remove_tagged(&format!("{}_", self.tag_prefix))?;
        self.executor.commit()?;
        info!(removed, "all access windows cancelled");
        Ok(removed)
    }
}
