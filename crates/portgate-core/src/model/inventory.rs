// ── Inventory entities ──
//
// Switches, machines, and rooms are created by inventory management
// (external to the core); the Reconciliation Engine only ever creates
// machines, when a previously-unknown hardware address is learned.

use serde::{Deserialize, Serialize};

use super::mac::MacAddress;
use portgate_snmp::AdapterConfig;

/// A managed switch: identity plus everything needed to reach its
/// management endpoint. Immutable except via explicit inventory edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Switch {
    pub id: u32,
    pub port_count: u16,
    pub addr: String,
    #[serde(default)]
    pub mac: Option<MacAddress>,
    pub snmp_version: u32,
    #[serde(default)]
    pub uplink_port: Option<u16>,
    #[serde(default)]
    pub community: Option<String>,
    // SNMPv3 security parameters, modeled but not driven by the core.
    #[serde(default)]
    pub auth_protocol: Option<String>,
    #[serde(default)]
    pub privacy_protocol: Option<String>,
    #[serde(default)]
    pub auth_key: Option<String>,
    #[serde(default)]
    pub privacy_key: Option<String>,
    #[serde(default)]
    pub security_level: Option<u8>,
}

impl Switch {
    /// Adapter parameters for this switch. Community falls back to the
    /// adapter default when the inventory has none recorded.
    pub fn adapter_config(&self) -> AdapterConfig {
        let mut config = AdapterConfig::new(self.addr.clone()).version(self.snmp_version);
        if let Some(community) = &self.community {
            config = config.community(community.clone());
        }
        config
    }
}

/// A lab machine. `mac` stays `None` until learned; `access_allowed`
/// absent means "allowed by default".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub id: u32,
    pub name: String,
    pub addr: String,
    /// Staff (instructor) machines are excluded from access windows.
    #[serde(default)]
    pub staff: bool,
    #[serde(default)]
    pub room_id: Option<u32>,
    #[serde(default)]
    pub mac: Option<MacAddress>,
    #[serde(default)]
    pub access_allowed: Option<bool>,
}

impl Machine {
    /// Machines created by discovery: fresh identity, empty name/address,
    /// access explicitly allowed.
    pub fn discovered(id: u32, mac: MacAddress) -> Self {
        Self {
            id,
            name: String::new(),
            addr: String::new(),
            staff: false,
            room_id: None,
            mac: Some(mac),
            access_allowed: Some(true),
        }
    }

    pub fn is_access_allowed(&self) -> bool {
        self.access_allowed.unwrap_or(true)
    }
}

/// A lab room. Listed for context only; room management is external.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: u32,
    pub number: u32,
    pub block: String,
    #[serde(default)]
    pub machine_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_defaults_to_allowed() {
        let mut machine = Machine::discovered(1, MacAddress::new("AA:BB:CC:DD:EE:FF"));
        assert!(machine.is_access_allowed());
        machine.access_allowed = None;
        assert!(machine.is_access_allowed());
        machine.access_allowed = Some(false);
        assert!(!machine.is_access_allowed());
    }

    #[test]
    fn adapter_config_carries_inventory_parameters() {
        let switch = Switch {
            id: 1,
            port_count: 24,
            addr: "10.90.90.90".into(),
            mac: None,
            snmp_version: 1,
            uplink_port: Some(24),
            community: Some("private".into()),
            auth_protocol: None,
            privacy_protocol: None,
            auth_key: None,
            privacy_key: None,
            security_level: None,
        };
        let config = switch.adapter_config();
        assert_eq!(config.addr, "10.90.90.90");
        assert_eq!(config.version, 1);
    }
}
