//! Port-state snapshot builder.
//!
//! Combines one switch's probe results into normalized [`PortSnapshot`]
//! rows. The selection policy is deliberately lossy: a port is persisted
//! only when one of its learned hardware addresses matches a known machine,
//! or when a machine was previously bound to that port — ports carrying
//! only unknown traffic are omitted, keeping the snapshot store limited to
//! ports of interest.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::model::{MacAddress, PortSnapshot, Switch};
use crate::probe::SwitchProbe;
use portgate_snmp::AdapterError;

/// Hardware addresses of machines previously bound per (switch id, port).
pub type BoundMacs = HashMap<(u32, u16), MacAddress>;

/// Build the snapshot rows for one switch.
///
/// `known_macs` holds the canonical addresses of every machine in the
/// inventory. Fails only when the port table itself cannot be read; a
/// failed forwarding-table walk degrades to "nothing learned" and the
/// bridge address is informational.
pub fn build_switch_snapshot(
    switch: &Switch,
    probe: &dyn SwitchProbe,
    known_macs: &HashSet<MacAddress>,
    bound_macs: &BoundMacs,
) -> Result<Vec<PortSnapshot>, AdapterError> {
    let statuses = probe.port_states(0)?;
    let learned = match probe.macs_by_port() {
        Ok(map) => map,
        Err(e) => {
            debug!(switch = switch.id, error = %e, "forwarding table unavailable, snapshot limited to prior bindings");
            Default::default()
        }
    };
    let bridge_mac = probe.bridge_address().map(MacAddress::new);

    let mut rows = Vec::new();
    for status in statuses {
        let matched = learned
            .get(&status.port)
            .into_iter()
            .flatten()
            .map(MacAddress::new)
            .find(|mac| known_macs.contains(mac));

        // No known address learned here: fall back to a machine previously
        // bound to this port, else omit the port entirely.
        let chosen = matched.or_else(|| bound_macs.get(&(switch.id, status.port)).cloned());
        let Some(mac) = chosen else {
            continue;
        };

        rows.push(PortSnapshot {
            switch_id: switch.id,
            switch_addr: switch.addr.clone(),
            port: status.port,
            operational: status.operational,
            administrative: status.administrative,
            mac: Some(mac),
            bridge_mac: bridge_mac.clone(),
        });
    }
    Ok(rows)
}

/// Replace one switch's rows inside the full snapshot table, leaving other
/// switches' rows untouched. Rows are matched by switch identity or by
/// switch address, covering inventories whose ids were renumbered.
pub fn merge_snapshot_rows(
    mut all_rows: Vec<PortSnapshot>,
    switch: &Switch,
    fresh: Vec<PortSnapshot>,
) -> Vec<PortSnapshot> {
    all_rows.retain(|row| row.switch_id != switch.id && row.switch_addr != switch.addr);
    all_rows.extend(fresh);
    all_rows
}
