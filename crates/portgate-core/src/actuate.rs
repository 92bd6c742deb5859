//! Port actuation: applying administrative state to switch ports.
//!
//! Writes go through the same probe seam as reads. A successful write is
//! mirrored into the binding table so reconciliation and actuation agree
//! on observed state; a failed mirror write is logged and reported but
//! does not undo the (already applied) switch-side change.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::probe::ProbeFactory;
use crate::store::RecordStore;
use portgate_snmp::PortAdminState;

/// What happened when one port was actuated.
#[derive(Debug, Clone, Serialize)]
pub struct PortActionOutcome {
    pub port: u16,
    pub state: PortAdminState,
    /// The switch accepted the write.
    pub success: bool,
    /// The binding table was updated to match.
    pub binding_updated: bool,
}

/// Applies administrative state changes to inventory switches.
pub struct Actuator {
    store: Arc<dyn RecordStore>,
    probes: Arc<dyn ProbeFactory>,
}

impl Actuator {
    pub fn new(store: Arc<dyn RecordStore>, probes: Arc<dyn ProbeFactory>) -> Self {
        Self { store, probes }
    }

    /// Set one port's administrative state. `machine_id`, when known,
    /// selects the binding row to mirror the result into.
    pub fn set_port(
        &self,
        switch_id: u32,
        machine_id: Option<u32>,
        port: u16,
        state: PortAdminState,
    ) -> Result<PortActionOutcome, CoreError> {
        let switches = self.store.switches()?;
        let switch = switches
            .iter()
            .find(|s| s.id == switch_id)
            .ok_or_else(|| CoreError::SwitchNotFound {
                identifier: switch_id.to_string(),
            })?;

        let probe = self.probes.connect(switch)?;
        let success = probe.set_port_admin(port, state);
        info!(
            switch = switch_id,
            port,
            state = %state,
            success,
            "port actuation"
        );

        let mut binding_updated = false;
        if success {
            match self.mirror_binding(switch_id, machine_id, port, state) {
                Ok(updated) => binding_updated = updated,
                Err(e) => {
                    // The switch-side write stands; the table catches up on
                    // the next reconciliation run.
                    warn!(switch = switch_id, port, error = %e, "binding table not updated");
                }
            }
        }

        Ok(PortActionOutcome {
            port,
            state,
            success,
            binding_updated,
        })
    }

    /// Set several ports on one switch, stopping at the first failed
    /// write. Returns `Ok(true)` only when every port was accepted.
    pub fn set_ports(
        &self,
        switch_id: u32,
        ports: &[u16],
        state: PortAdminState,
    ) -> Result<bool, CoreError> {
        for &port in ports {
            let outcome = self.set_port(switch_id, None, port, state)?;
            if !outcome.success {
                warn!(switch = switch_id, port, "write refused, remaining ports skipped");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Overwrite the matching binding row's state. Matches on machine id
    /// when given, else on (switch, port). Returns whether a row changed.
    fn mirror_binding(
        &self,
        switch_id: u32,
        machine_id: Option<u32>,
        port: u16,
        state: PortAdminState,
    ) -> Result<bool, CoreError> {
        let mut bindings = self.store.bindings()?;
        let row = bindings.iter_mut().find(|b| {
            b.switch_id == switch_id
                && match machine_id {
                    Some(id) => b.machine_id == id,
                    None => b.port == port,
                }
        });
        let Some(row) = row else {
            return Ok(false);
        };

        let up = state.is_enabled();
        if row.port == port && row.up == up {
            return Ok(false);
        }
        row.port = port;
        row.up = up;
        self.store.replace_bindings(&bindings)?;
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PortBinding;
    use crate::store::MemoryStore;
    use crate::testing::{switch_fixture, ScriptedFactory, ScriptedProbe};
    use pretty_assertions::assert_eq;

    fn store_with_binding() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.seed_switches(vec![switch_fixture(1, "10.0.0.1")]);
        store
            .replace_bindings(&[PortBinding {
                machine_id: 3,
                switch_id: 1,
                port: 7,
                up: true,
            }])
            .unwrap();
        store
    }

    #[test]
    fn successful_write_mirrors_into_binding() {
        let store = store_with_binding();
        let probe = ScriptedProbe::new();
        let calls = probe.set_calls();
        let actuator = Actuator::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::new(ScriptedFactory::new().with_probe(1, probe)),
        );

        let outcome = actuator
            .set_port(1, Some(3), 7, PortAdminState::Disabled)
            .unwrap();

        assert!(outcome.success);
        assert!(outcome.binding_updated);
        assert_eq!(calls.lock().unwrap().as_slice(), &[(7, PortAdminState::Disabled)]);
        let bindings = store.bindings().unwrap();
        assert!(!bindings[0].up);
    }

    #[test]
    fn refused_write_leaves_binding_alone() {
        let store = store_with_binding();
        let probe = ScriptedProbe::new().failing_set_on(7);
        let actuator = Actuator::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::new(ScriptedFactory::new().with_probe(1, probe)),
        );

        let outcome = actuator
            .set_port(1, Some(3), 7, PortAdminState::Disabled)
            .unwrap();

        assert!(!outcome.success);
        assert!(!outcome.binding_updated);
        assert!(store.bindings().unwrap()[0].up);
    }

    #[test]
    fn unknown_switch_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let actuator = Actuator::new(store, Arc::new(ScriptedFactory::new()));
        let err = actuator
            .set_port(9, None, 1, PortAdminState::Enabled)
            .unwrap_err();
        assert!(matches!(err, CoreError::SwitchNotFound { .. }));
    }

    #[test]
    fn batch_stops_at_first_refused_port() {
        let store = store_with_binding();
        let probe = ScriptedProbe::new().failing_set_on(4);
        let calls = probe.set_calls();
        let actuator = Actuator::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::new(ScriptedFactory::new().with_probe(1, probe)),
        );

        let all_ok = actuator
            .set_ports(1, &[3, 4, 5], PortAdminState::Disabled)
            .unwrap();

        assert!(!all_ok);
        let recorded: Vec<u16> = calls.lock().unwrap().iter().map(|(p, _)| *p).collect();
        assert_eq!(recorded, vec![3, 4]); // port 5 never attempted
    }

    #[test]
    fn batch_success_reports_true() {
        let store = store_with_binding();
        let actuator = Actuator::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::new(ScriptedFactory::new().with_probe(1, ScriptedProbe::new())),
        );
        assert!(actuator
            .set_ports(1, &[3, 4, 5], PortAdminState::Enabled)
            .unwrap());
    }
}
