//! The protocol adapter proper: one instance per switch endpoint.
//!
//! Every operation opens a fresh session, so an adapter carries no wire
//! state between calls. Transport failures on reads surface as
//! [`AdapterError::Transport`]; writes degrade to `false` because a failed
//! SET must never abort a batch caller mid-run.

use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use snmp2::{Oid, SyncSession, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AdapterError;
use crate::oid;

/// Hard ceiling on table-walk length, guarding against agents that
/// never leave the requested column.
const MAX_WALK_ENTRIES: usize = 65_536;

const DEFAULT_COMMUNITY: &str = "public";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_RETRIES: u32 = 1;
const DEFAULT_SNMP_PORT: u16 = 161;

// ── Port administrative state ───────────────────────────────────────

/// Desired administrative state of a switch port (ifAdminStatus codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortAdminState {
    Enabled,
    Disabled,
}

impl PortAdminState {
    /// ifAdminStatus value meaning "up".
    pub const ENABLED_CODE: i64 = 1;

    /// The integer written to (or read from) ifAdminStatus.
    pub fn code(self) -> i64 {
        match self {
            Self::Enabled => 1,
            Self::Disabled => 2,
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl std::fmt::Display for PortAdminState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Operational + administrative state of one port, as last read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStatus {
    pub port: u16,
    pub operational: i64,
    pub administrative: i64,
}

// ── Configuration ───────────────────────────────────────────────────

/// Connection parameters for one switch's management endpoint.
///
/// Only the target address is mandatory; everything else has safe
/// defaults (`public` read community, write community falling back to
/// the read community, version 2, short timeout, one retry).
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub addr: String,
    pub read_community: SecretString,
    pub write_community: Option<SecretString>,
    pub version: u32,
    pub timeout: Duration,
    pub retries: u32,
}

impl AdapterConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            read_community: SecretString::from(DEFAULT_COMMUNITY.to_owned()),
            write_community: None,
            version: 2,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }

    pub fn community(mut self, community: impl Into<String>) -> Self {
        self.read_community = SecretString::from(community.into());
        self
    }

    pub fn write_community(mut self, community: impl Into<String>) -> Self {
        self.write_community = Some(SecretString::from(community.into()));
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

// ── Owned varbind values ────────────────────────────────────────────

// `snmp2::Value` borrows the session's receive buffer; everything the
// adapter hands out is converted to an owned form first.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OwnedValue {
    Int(i64),
    Bytes(Vec<u8>),
    /// noSuchObject / noSuchInstance / endOfMibView exception markers.
    Absent,
    Other,
}

impl OwnedValue {
    fn from_value(value: &Value<'_>) -> Self {
        match value {
            Value::Integer(i) => Self::Int(*i),
            Value::Counter32(c) => Self::Int(i64::from(*c)),
            Value::Unsigned32(u) => Self::Int(i64::from(*u)),
            Value::Timeticks(t) => Self::Int(i64::from(*t)),
            Value::Counter64(c) => Self::Int(i64::try_from(*c).unwrap_or(i64::MAX)),
            Value::OctetString(b) => Self::Bytes(b.to_vec()),
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => Self::Absent,
            _ => Self::Other,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

fn hex_mac(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(
        bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

// ── Adapter ─────────────────────────────────────────────────────────

/// Stateless-per-call SNMP wrapper around a single switch.
#[derive(Debug)]
pub struct SnmpAdapter {
    config: AdapterConfig,
    target: String,
}

impl SnmpAdapter {
    /// Validate the configuration and build an adapter. Fails only on
    /// configuration problems — no traffic is sent here.
    pub fn new(config: AdapterConfig) -> Result<Self, AdapterError> {
        let addr = config.addr.trim();
        if addr.is_empty() {
            return Err(AdapterError::config("a target address is required"));
        }
        if !matches!(config.version, 1 | 2) {
            return Err(AdapterError::config(format!(
                "unsupported SNMP version {} (expected 1 or 2)",
                config.version
            )));
        }
        let target = if addr.contains(':') {
            addr.to_owned()
        } else {
            format!("{addr}:{DEFAULT_SNMP_PORT}")
        };
        Ok(Self { config, target })
    }

    /// The resolved `host:port` this adapter talks to.
    pub fn target(&self) -> &str {
        &self.target
    }

    // ── Session plumbing ────────────────────────────────────────────

    // Opens a session, degrading to a timeout-less session if the
    // transport rejects the tuned construction.
    fn open(&self, community: &[u8]) -> Result<SyncSession, AdapterError> {
        let build = |timeout: Option<Duration>| match self.config.version {
            1 => SyncSession::new_v1(self.target.as_str(), community, timeout, 0),
            _ => SyncSession::new_v2c(self.target.as_str(), community, timeout, 0),
        };
        match build(Some(self.config.timeout)) {
            Ok(session) => Ok(session),
            Err(first) => {
                debug!(target = %self.target, error = ?first, "session construction with timeout failed, retrying without");
                build(None).map_err(|_| AdapterError::Transport {
                    target: self.target.clone(),
                    message: format!("{first:?}"),
                })
            }
        }
    }

    fn open_read(&self) -> Result<SyncSession, AdapterError> {
        self.open(self.config.read_community.expose_secret().as_bytes())
    }

    fn open_write(&self) -> Result<SyncSession, AdapterError> {
        let community = self
            .config
            .write_community
            .as_ref()
            .unwrap_or(&self.config.read_community);
        self.open(community.expose_secret().as_bytes())
    }

    fn get_owned(
        &self,
        session: &mut SyncSession,
        parts: &[u64],
    ) -> Result<Option<OwnedValue>, AdapterError> {
        let oid = Oid::from(parts)
            .map_err(|e| AdapterError::parse(format!("bad OID {parts:?}: {e:?}")))?;
        let mut last_err = None;
        for _ in 0..=self.config.retries {
            match session.get(&oid) {
                Ok(mut pdu) => {
                    let value = pdu
                        .varbinds
                        .next()
                        .map(|(_, v)| OwnedValue::from_value(&v));
                    return Ok(match value {
                        Some(OwnedValue::Absent) | None => None,
                        other => other,
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(self.exhausted(last_err))
    }

    fn getnext_owned(
        &self,
        session: &mut SyncSession,
        parts: &[u64],
    ) -> Result<Option<(String, OwnedValue)>, AdapterError> {
        let oid = Oid::from(parts)
            .map_err(|e| AdapterError::parse(format!("bad OID {parts:?}: {e:?}")))?;
        let mut last_err = None;
        for _ in 0..=self.config.retries {
            match session.getnext(&oid) {
                Ok(mut pdu) => {
                    return Ok(pdu
                        .varbinds
                        .next()
                        .map(|(o, v)| (o.to_string(), OwnedValue::from_value(&v))));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(self.exhausted(last_err))
    }

    fn exhausted(&self, last: Option<snmp2::Error>) -> AdapterError {
        match last {
            Some(e) => AdapterError::transport(&self.target, &e),
            None => AdapterError::Transport {
                target: self.target.clone(),
                message: "no response".into(),
            },
        }
    }

    // Walks one column, returning (full dotted OID, value) rows in
    // lexical OID order. Stops at the end of the column, on exception
    // markers, or when the agent stops advancing.
    fn walk_column(&self, column: &[u64]) -> Result<Vec<(String, OwnedValue)>, AdapterError> {
        let column_dotted = oid::dotted(column);
        let mut session = self.open_read()?;
        let mut rows = Vec::new();
        let mut cursor: Vec<u64> = column.to_vec();

        while rows.len() < MAX_WALK_ENTRIES {
            let Some((next_dotted, value)) = self.getnext_owned(&mut session, &cursor)? else {
                break;
            };
            if oid::strip_prefix(&next_dotted, &column_dotted).is_none() {
                break;
            }
            if value == OwnedValue::Absent {
                break;
            }
            let Some(next) = oid::parse_dotted(&next_dotted) else {
                return Err(AdapterError::parse(format!(
                    "agent returned unparseable OID {next_dotted}"
                )));
            };
            if next == cursor {
                warn!(target = %self.target, oid = %next_dotted, "agent is not advancing the walk, stopping");
                break;
            }
            rows.push((next_dotted, value));
            cursor = next;
        }
        Ok(rows)
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Operational + administrative state for `port`, or for every port
    /// when `port == 0` (1-indexed, in interface order).
    pub fn port_states(&self, port: u16) -> Result<Vec<PortStatus>, AdapterError> {
        if port > 0 {
            let mut session = self.open_read()?;
            let oper = self
                .get_owned(&mut session, &oid::instance(oid::IF_OPER_STATUS, &[u64::from(port)]))?
                .and_then(|v| v.as_int());
            let admin = self
                .get_owned(&mut session, &oid::instance(oid::IF_ADMIN_STATUS, &[u64::from(port)]))?
                .and_then(|v| v.as_int());
            if oper.is_none() && admin.is_none() {
                debug!(target = %self.target, port, "agent reports no such interface");
            }
            return Ok(vec![PortStatus {
                port,
                operational: oper.unwrap_or(0),
                administrative: admin.unwrap_or(0),
            }]);
        }

        let oper_rows = self.walk_column(oid::IF_OPER_STATUS)?;
        let admin_rows = self.walk_column(oid::IF_ADMIN_STATUS)?;
        Ok(oper_rows
            .iter()
            .zip(admin_rows.iter())
            .enumerate()
            .map(|(idx, ((_, oper), (_, admin)))| PortStatus {
                port: u16::try_from(idx + 1).unwrap_or(u16::MAX),
                operational: oper.as_int().unwrap_or(0),
                administrative: admin.as_int().unwrap_or(0),
            })
            .collect())
    }

    /// Walk the bridge forwarding table: `(hardware address, port)` per
    /// learned entry. Entries with undecodable index suffixes are skipped.
    pub fn fdb_entries(&self) -> Result<Vec<(String, u16)>, AdapterError> {
        let column = oid::dotted(oid::FDB_PORT);
        let mut entries = Vec::new();
        for (full_oid, value) in self.walk_column(oid::FDB_PORT)? {
            let Some(suffix) = oid::strip_prefix(&full_oid, &column) else {
                continue;
            };
            let Some(mac) = oid::mac_from_fdb_suffix(suffix) else {
                debug!(target = %self.target, oid = %full_oid, "skipping undecodable FDB index");
                continue;
            };
            let Some(port) = value.as_int().and_then(|i| u16::try_from(i).ok()) else {
                debug!(target = %self.target, %mac, "FDB entry without a usable port value");
                continue;
            };
            entries.push((mac, port));
        }
        Ok(entries)
    }

    /// Learned hardware addresses grouped by port.
    pub fn macs_by_port(&self) -> Result<BTreeMap<u16, Vec<String>>, AdapterError> {
        let mut grouped: BTreeMap<u16, Vec<String>> = BTreeMap::new();
        for (mac, port) in self.fdb_entries()? {
            grouped.entry(port).or_default().push(mac);
        }
        Ok(grouped)
    }

    /// The port a specific hardware address was learned on, via a targeted
    /// GET of dot1dTpFdbPort. `Ok(None)` when the agent has no such entry.
    pub fn port_for_mac(&self, mac: &str) -> Result<Option<u16>, AdapterError> {
        let suffix = oid::mac_to_instance(mac)?;
        let parts = oid::instance(oid::FDB_PORT, &suffix);
        let mut session = self.open_read()?;
        Ok(self
            .get_owned(&mut session, &parts)?
            .and_then(|v| v.as_int())
            .and_then(|i| u16::try_from(i).ok()))
    }

    /// The bridge's own hardware address (dot1dBaseBridgeAddress).
    /// Informational only — any failure yields `None`.
    pub fn bridge_address(&self) -> Option<String> {
        let mut session = match self.open_read() {
            Ok(s) => s,
            Err(e) => {
                debug!(target = %self.target, error = %e, "bridge address read skipped");
                return None;
            }
        };
        match self.get_owned(&mut session, oid::BRIDGE_ADDRESS) {
            Ok(Some(OwnedValue::Bytes(bytes))) => hex_mac(&bytes),
            Ok(_) => None,
            Err(e) => {
                debug!(target = %self.target, error = %e, "bridge address unavailable");
                None
            }
        }
    }

    /// ifPhysAddress per port — the switch's own interface hardware
    /// addresses, used by live port views.
    pub fn interface_addresses(&self) -> Result<BTreeMap<u16, String>, AdapterError> {
        let column = oid::dotted(oid::IF_PHYS_ADDRESS);
        let mut mapping = BTreeMap::new();
        for (full_oid, value) in self.walk_column(oid::IF_PHYS_ADDRESS)? {
            let Some(suffix) = oid::strip_prefix(&full_oid, &column) else {
                continue;
            };
            let Ok(port) = suffix.parse::<u16>() else {
                debug!(target = %self.target, oid = %full_oid, "non-numeric interface index");
                continue;
            };
            if let OwnedValue::Bytes(bytes) = value {
                if let Some(mac) = hex_mac(&bytes) {
                    mapping.insert(port, mac);
                }
            }
        }
        Ok(mapping)
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Write a port's administrative state. A transport failure yields
    /// `false`; it is never propagated past the adapter.
    pub fn set_port_admin(&self, port: u16, state: PortAdminState) -> bool {
        let parts = oid::instance(oid::IF_ADMIN_STATUS, &[u64::from(port)]);
        let Ok(target_oid) = Oid::from(&parts[..]) else {
            warn!(port, "could not encode ifAdminStatus instance OID");
            return false;
        };
        let mut session = match self.open_write() {
            Ok(s) => s,
            Err(e) => {
                warn!(target = %self.target, port, error = %e, "SNMP SET session unavailable");
                return false;
            }
        };
        match session.set(&[(&target_oid, Value::Integer(state.code()))]) {
            Ok(_) => {
                debug!(target = %self.target, port, state = %state, "port administrative state written");
                true
            }
            Err(e) => {
                warn!(target = %self.target, port, error = ?e, "SNMP SET failed");
                false
            }
        }
    }

    /// Apply a state to several ports in order, stopping at the first
    /// failure. Callers needing best-effort semantics pre-split the list.
    pub fn set_ports(&self, ports: &[u16], state: PortAdminState) -> bool {
        for &port in ports {
            if !self.set_port_admin(port, state) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn construction_requires_an_address() {
        let err = SnmpAdapter::new(AdapterConfig::new("  ")).unwrap_err();
        assert!(matches!(err, AdapterError::Config { .. }));
    }

    #[test]
    fn construction_rejects_unknown_versions() {
        let err = SnmpAdapter::new(AdapterConfig::new("10.0.0.1").version(3)).unwrap_err();
        assert!(matches!(err, AdapterError::Config { .. }));
    }

    #[test]
    fn default_snmp_port_is_appended() {
        let adapter = SnmpAdapter::new(AdapterConfig::new("10.90.90.90")).unwrap();
        assert_eq!(adapter.target(), "10.90.90.90:161");
        let explicit = SnmpAdapter::new(AdapterConfig::new("10.90.90.90:1161")).unwrap();
        assert_eq!(explicit.target(), "10.90.90.90:1161");
    }

    #[test]
    fn admin_state_codes() {
        assert_eq!(PortAdminState::Enabled.code(), 1);
        assert_eq!(PortAdminState::Disabled.code(), 2);
        assert_eq!(PortAdminState::ENABLED_CODE, 1);
        assert!(PortAdminState::Enabled.is_enabled());
        assert!(!PortAdminState::Disabled.is_enabled());
    }

    #[test]
    fn owned_value_conversion_covers_integers_and_exceptions() {
        assert_eq!(
            OwnedValue::from_value(&Value::Integer(2)).as_int(),
            Some(2)
        );
        assert_eq!(
            OwnedValue::from_value(&Value::Counter32(7)).as_int(),
            Some(7)
        );
        assert_eq!(OwnedValue::from_value(&Value::NoSuchInstance), OwnedValue::Absent);
    }

    #[test]
    fn hex_mac_formatting() {
        assert_eq!(
            hex_mac(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x01]).unwrap(),
            "AA:BB:CC:DD:EE:01"
        );
        assert!(hex_mac(&[]).is_none());
    }
}
