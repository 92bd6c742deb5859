//! Seam between the core services and the protocol adapter.
//!
//! [`SwitchProbe`] is the per-switch query surface the snapshot builder,
//! reconciler, and actuator consume; [`ProbeFactory`] constructs one from
//! inventory data. Production code wires in [`SnmpProbeFactory`]; tests
//! inject scripted probes.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::model::Switch;
use portgate_snmp::{AdapterError, PortAdminState, PortStatus, SnmpAdapter};

/// Blocking query/actuation surface for one switch.
pub trait SwitchProbe: Send {
    /// See [`SnmpAdapter::port_states`]: `port == 0` means all ports.
    fn port_states(&self, port: u16) -> Result<Vec<PortStatus>, AdapterError>;

    /// Learned hardware addresses grouped by port.
    fn macs_by_port(&self) -> Result<BTreeMap<u16, Vec<String>>, AdapterError>;

    /// The bridge's own hardware address; `None` when unavailable.
    fn bridge_address(&self) -> Option<String>;

    /// The switch's own per-interface hardware addresses.
    fn interface_addresses(&self) -> Result<BTreeMap<u16, String>, AdapterError>;

    /// Targeted forwarding-table lookup. `Ok(None)` when not learned.
    fn port_for_mac(&self, mac: &str) -> Result<Option<u16>, AdapterError>;

    /// Write administrative state; `false` on any transport failure.
    fn set_port_admin(&self, port: u16, state: PortAdminState) -> bool;
}

impl SwitchProbe for SnmpAdapter {
    fn port_states(&self, port: u16) -> Result<Vec<PortStatus>, AdapterError> {
        SnmpAdapter::port_states(self, port)
    }

    fn macs_by_port(&self) -> Result<BTreeMap<u16, Vec<String>>, AdapterError> {
        SnmpAdapter::macs_by_port(self)
    }

    fn bridge_address(&self) -> Option<String> {
        SnmpAdapter::bridge_address(self)
    }

    fn interface_addresses(&self) -> Result<BTreeMap<u16, String>, AdapterError> {
        SnmpAdapter::interface_addresses(self)
    }

    fn port_for_mac(&self, mac: &str) -> Result<Option<u16>, AdapterError> {
        SnmpAdapter::port_for_mac(self, mac)
    }

    fn set_port_admin(&self, port: u16, state: PortAdminState) -> bool {
        SnmpAdapter::set_port_admin(self, port, state)
    }
}

/// Builds a probe for a switch taken from the inventory.
pub trait ProbeFactory: Send + Sync {
    fn connect(&self, switch: &Switch) -> Result<Box<dyn SwitchProbe>, AdapterError>;
}

/// Production factory: one [`SnmpAdapter`] per switch, with timeout and
/// retry tuning shared across the fleet.
#[derive(Debug, Clone)]
pub struct SnmpProbeFactory {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for SnmpProbeFactory {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            retries: 1,
        }
    }
}

impl SnmpProbeFactory {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self { timeout, retries }
    }
}

impl ProbeFactory for SnmpProbeFactory {
    fn connect(&self, switch: &Switch) -> Result<Box<dyn SwitchProbe>, AdapterError> {
        let config = switch
            .adapter_config()
            .timeout(self.timeout)
            .retries(self.retries);
        Ok(Box::new(SnmpAdapter::new(config)?))
    }
}
