// ── Scripted test doubles ──
//
// Shared by the service tests: a probe whose answers are scripted up
// front, and a factory that hands out clones of it per switch. Set calls
// are recorded through a shared handle so assertions survive cloning.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::model::Switch;
use crate::probe::{ProbeFactory, SwitchProbe};
use portgate_snmp::{AdapterError, PortAdminState, PortStatus};

pub(crate) fn switch_fixture(id: u32, addr: &str) -> Switch {
    Switch {
        id,
        port_count: 24,
        addr: addr.to_owned(),
        mac: None,
        snmp_version: 2,
        uplink_port: None,
        community: Some("private".into()),
        auth_protocol: None,
        privacy_protocol: None,
        auth_key: None,
        privacy_key: None,
        security_level: None,
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedProbe {
    states: Vec<PortStatus>,
    learned: BTreeMap<u16, Vec<String>>,
    bridge: Option<String>,
    interfaces: BTreeMap<u16, String>,
    fail_reads: bool,
    fail_set_ports: HashSet<u16>,
    set_calls: Arc<Mutex<Vec<(u16, PortAdminState)>>>,
}

impl ScriptedProbe {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_states(mut self, states: Vec<PortStatus>) -> Self {
        self.states = states;
        self
    }

    pub(crate) fn with_learned(mut self, port: u16, macs: Vec<&str>) -> Self {
        self.learned
            .insert(port, macs.into_iter().map(str::to_owned).collect());
        self
    }

    pub(crate) fn with_bridge(mut self, mac: &str) -> Self {
        self.bridge = Some(mac.to_owned());
        self
    }

    pub(crate) fn with_interface(mut self, port: u16, mac: &str) -> Self {
        self.interfaces.insert(port, mac.to_owned());
        self
    }

    pub(crate) fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub(crate) fn failing_set_on(mut self, port: u16) -> Self {
        self.fail_set_ports.insert(port);
        self
    }

    /// Shared handle to the recorded `set_port_admin` calls.
    pub(crate) fn set_calls(&self) -> Arc<Mutex<Vec<(u16, PortAdminState)>>> {
        Arc::clone(&self.set_calls)
    }

    fn read_error(&self) -> AdapterError {
        AdapterError::Transport {
            target: "scripted".into(),
            message: "scripted read failure".into(),
        }
    }
}

impl SwitchProbe for ScriptedProbe {
    fn port_states(&self, port: u16) -> Result<Vec<PortStatus>, AdapterError> {
        if self.fail_reads {
            return Err(self.read_error());
        }
        if port == 0 {
            return Ok(self.states.clone());
        }
        Ok(self
            .states
            .iter()
            .filter(|s| s.port == port)
            .copied()
            .collect())
    }

    fn macs_by_port(&self) -> Result<BTreeMap<u16, Vec<String>>, AdapterError> {
        if self.fail_reads {
            return Err(self.read_error());
        }
        Ok(self.learned.clone())
    }

    fn bridge_address(&self) -> Option<String> {
        self.bridge.clone()
    }

    fn interface_addresses(&self) -> Result<BTreeMap<u16, String>, AdapterError> {
        if self.fail_reads {
            return Err(self.read_error());
        }
        Ok(self.interfaces.clone())
    }

    fn port_for_mac(&self, mac: &str) -> Result<Option<u16>, AdapterError> {
        if self.fail_reads {
            return Err(self.read_error());
        }
        let wanted = mac.trim().to_uppercase().replace('-', ":");
        for (port, macs) in &self.learned {
            if macs.iter().any(|m| m.eq_ignore_ascii_case(&wanted)) {
                return Ok(Some(*port));
            }
        }
        Ok(None)
    }

    fn set_port_admin(&self, port: u16, state: PortAdminState) -> bool {
        self.set_calls.lock().unwrap().push((port, state));
        !self.fail_set_ports.contains(&port)
    }
}

/// Factory returning per-switch clones of scripted probes. Switches with
/// no script fail to connect, as does anything in `fail_connect`.
#[derive(Debug, Default)]
pub(crate) struct ScriptedFactory {
    probes: HashMap<u32, ScriptedProbe>,
    fail_connect: HashSet<u32>,
}

impl ScriptedFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_probe(mut self, switch_id: u32, probe: ScriptedProbe) -> Self {
        self.probes.insert(switch_id, probe);
        self
    }

    pub(crate) fn with_unreachable(mut self, switch_id: u32) -> Self {
        self.fail_connect.insert(switch_id);
        self
    }
}

impl ProbeFactory for ScriptedFactory {
    fn connect(&self, switch: &Switch) -> Result<Box<dyn SwitchProbe>, AdapterError> {
        if self.fail_connect.contains(&switch.id) {
            return Err(AdapterError::Transport {
                target: switch.addr.clone(),
                message: "scripted connect failure".into(),
            });
        }
        match self.probes.get(&switch.id) {
            Some(probe) => Ok(Box::new(probe.clone())),
            None => Err(AdapterError::Transport {
                target: switch.addr.clone(),
                message: "no scripted probe".into(),
            }),
        }
    }
}
