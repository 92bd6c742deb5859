//! Dotted-OID helpers and MAC address ↔ FDB index translation.
//!
//! The bridge forwarding table (dot1dTpFdbPort) indexes each learned MAC as
//! six decimal octets appended to the column OID. `mac_from_fdb_suffix`
//! decodes that suffix into the canonical `AA:BB:CC:DD:EE:FF` form;
//! `mac_to_fdb_suffix` performs the reverse translation for targeted GETs.

use crate::error::AdapterError;

/// ifOperStatus — interface operational state.
pub const IF_OPER_STATUS: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 8];
/// ifAdminStatus — interface administrative state (writable).
pub const IF_ADMIN_STATUS: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 7];
/// ifPhysAddress — interface hardware address.
pub const IF_PHYS_ADDRESS: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 6];
/// dot1dTpFdbPort — bridge port a learned MAC was last seen on.
pub const FDB_PORT: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 2];
/// dot1dBaseBridgeAddress — the bridge's own hardware address.
pub const BRIDGE_ADDRESS: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 1, 1];

/// Render OID components in dotted-decimal form.
pub fn dotted(parts: &[u64]) -> String {
    parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Parse a dotted-decimal OID string back into components.
pub fn parse_dotted(oid: &str) -> Option<Vec<u64>> {
    oid.split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u64>().ok())
        .collect()
}

/// Strip a column-OID prefix from a full instance OID, returning the
/// dotted suffix. `None` when the instance does not live under the column.
pub fn strip_prefix<'a>(instance: &'a str, column: &str) -> Option<&'a str> {
    let rest = instance
        .trim_start_matches('.')
        .strip_prefix(column.trim_start_matches('.'))?;
    rest.strip_prefix('.')
}

/// Concatenate a column OID with instance components.
pub fn instance(column: &[u64], suffix: &[u64]) -> Vec<u64> {
    let mut parts = Vec::with_capacity(column.len() + suffix.len());
    parts.extend_from_slice(column);
    parts.extend_from_slice(suffix);
    parts
}

/// Decode an FDB index suffix (decimal octets, e.g. `170.187.204.221.238.255`)
/// into a canonical MAC string (`AA:BB:CC:DD:EE:FF`).
///
/// Returns `None` when any component fails to decode as an octet — the
/// entry is unusable rather than fatal, and callers skip it.
pub fn mac_from_fdb_suffix(suffix: &str) -> Option<String> {
    let parts: Vec<&str> = suffix.split('.').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return None;
    }
    let mut bytes = Vec::with_capacity(parts.len());
    for part in parts {
        let octet = part.parse::<u8>().ok()?;
        bytes.push(format!("{octet:02X}"));
    }
    Some(bytes.join(":"))
}

/// Translate a MAC address (`:` or `-` separated hex) into the decimal
/// FDB index suffix (`170.187.204.221.238.255`).
pub fn mac_to_fdb_suffix(mac: &str) -> Result<String, AdapterError> {
    let parts: Vec<&str> = mac
        .split([':', '-'])
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Err(AdapterError::parse(format!("empty MAC address: {mac:?}")));
    }
    let mut octets = Vec::with_capacity(parts.len());
    for part in &parts {
        let octet = u8::from_str_radix(part, 16)
            .map_err(|_| AdapterError::parse(format!("invalid MAC segment {part:?} in {mac}")))?;
        octets.push(octet.to_string());
    }
    Ok(octets.join("."))
}

/// As [`mac_to_fdb_suffix`] but yielding numeric components, ready to append
/// to a column OID.
pub fn mac_to_instance(mac: &str) -> Result<Vec<u64>, AdapterError> {
    let suffix = mac_to_fdb_suffix(mac)?;
    parse_dotted(&suffix).ok_or_else(|| AdapterError::parse(format!("bad MAC suffix for {mac}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn suffix_decodes_to_canonical_mac() {
        assert_eq!(
            mac_from_fdb_suffix("170.187.204.221.238.255").unwrap(),
            "AA:BB:CC:DD:EE:FF"
        );
    }

    #[test]
    fn suffix_with_non_numeric_octet_is_unusable() {
        assert!(mac_from_fdb_suffix("170.187.xx.221.238.255").is_none());
        assert!(mac_from_fdb_suffix("300.1.2.3.4.5").is_none());
        assert!(mac_from_fdb_suffix("").is_none());
    }

    #[test]
    fn mac_round_trips_regardless_of_separator() {
        let suffix = "170.187.204.221.238.1";
        let mac = mac_from_fdb_suffix(suffix).unwrap();
        assert_eq!(mac, "AA:BB:CC:DD:EE:01");
        assert_eq!(mac_to_fdb_suffix(&mac).unwrap(), suffix);
        assert_eq!(mac_to_fdb_suffix("AA-BB-CC-DD-EE-01").unwrap(), suffix);
        assert_eq!(mac_to_fdb_suffix("aa:bb:cc:dd:ee:01").unwrap(), suffix);
    }

    #[test]
    fn mac_with_bad_segment_is_rejected() {
        assert!(mac_to_fdb_suffix("AA:BB:ZZ:DD:EE:FF").is_err());
        assert!(mac_to_fdb_suffix("").is_err());
    }

    #[test]
    fn prefix_stripping() {
        let column = dotted(FDB_PORT);
        let full = format!("{column}.170.187.204.221.238.255");
        assert_eq!(
            strip_prefix(&full, &column).unwrap(),
            "170.187.204.221.238.255"
        );
        assert!(strip_prefix("1.3.6.1.2.1.2.2.1.8.1", &column).is_none());
    }

    #[test]
    fn instance_concatenation() {
        let parts = instance(IF_ADMIN_STATUS, &[7]);
        assert_eq!(dotted(&parts), "1.3.6.1.2.1.2.2.1.7.7");
    }
}
