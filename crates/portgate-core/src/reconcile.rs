//! Discovery-and-reconciliation engine.
//!
//! A run is two sequential passes over the switch fleet:
//!
//! 1. **Live correlation** — for every machine with a learned hardware
//!    address, query each switch's forwarding table and refresh the
//!    (machine, switch) binding with the port and administrative state
//!    actually observed. Switches are probed concurrently, bounded by a
//!    semaphore, each probe on a blocking worker thread.
//! 2. **Snapshot adoption** — walk the persisted port snapshots and make
//!    sure every learned address has a machine row (creating one when the
//!    address is new to the inventory) and a binding.
//!
//! Per-switch failures never abort a run; they surface as [`Diagnostic`]s
//! on the report. Store failures do abort: derived state must not be
//! written from a partially-read baseline.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{MacAddress, Machine, PortBinding, Switch};
use crate::probe::ProbeFactory;
use crate::snapshot::{self, BoundMacs};
use crate::store::RecordStore;
use portgate_snmp::PortAdminState;

/// Default bound on concurrent switch probes.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 4;

/// One non-fatal problem observed during a run.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub switch_id: Option<u32>,
    pub machine_id: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    fn for_switch(switch_id: u32, message: impl Into<String>) -> Self {
        Self {
            switch_id: Some(switch_id),
            machine_id: None,
            message: message.into(),
        }
    }

    fn for_machine(switch_id: u32, machine_id: u32, message: impl Into<String>) -> Self {
        Self {
            switch_id: Some(switch_id),
            machine_id: Some(machine_id),
            message: message.into(),
        }
    }

    fn general(message: impl Into<String>) -> Self {
        Self {
            switch_id: None,
            machine_id: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.switch_id, self.machine_id) {
            (Some(s), Some(m)) => write!(f, "[switch {s}, machine {m}] {}", self.message),
            (Some(s), None) => write!(f, "[switch {s}] {}", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Default, Serialize)]
pub struct ReconcileReport {
    /// Machines located through live forwarding-table probes.
    pub correlated: usize,
    /// Machines newly created from snapshot rows.
    pub discovered: usize,
    pub bindings_added: usize,
    pub bindings_updated: usize,
    /// Snapshot rows written, when the run had to seed the snapshot table.
    pub snapshots_written: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn changed(&self) -> usize {
        self.bindings_added + self.bindings_updated
    }
}

// ── Binding table upsert ─────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Upsert {
    Unchanged,
    Updated,
    Added,
}

/// Update the single (machine, switch) row in place, or append it. The
/// uniqueness of that key is maintained here and nowhere else.
fn upsert_binding(
    bindings: &mut Vec<PortBinding>,
    machine_id: u32,
    switch_id: u32,
    port: u16,
    up: bool,
) -> Upsert {
    if let Some(existing) = bindings
        .iter_mut()
        .find(|b| b.machine_id == machine_id && b.switch_id == switch_id)
    {
        if existing.port == port && existing.up == up {
            return Upsert::Unchanged;
        }
        existing.port = port;
        existing.up = up;
        return Upsert::Updated;
    }
    bindings.push(PortBinding {
        machine_id,
        switch_id,
        port,
        up,
    });
    Upsert::Added
}

// ── Live pass plumbing ───────────────────────────────────────────────

struct LiveObservation {
    machine_id: u32,
    switch_id: u32,
    port: u16,
    up: bool,
}

struct SwitchProbeOutcome {
    observations: Vec<LiveObservation>,
    diagnostics: Vec<Diagnostic>,
}

/// Blocking, per-switch body of the live pass. Connects, then asks the
/// forwarding table where each machine's address was learned.
fn probe_switch_live(
    probes: &dyn ProbeFactory,
    switch: &Switch,
    targets: &[(u32, MacAddress)],
) -> SwitchProbeOutcome {
    let mut outcome = SwitchProbeOutcome {
        observations: Vec::new(),
        diagnostics: Vec::new(),
    };
    let probe = match probes.connect(switch) {
        Ok(probe) => probe,
        Err(e) => {
            outcome.diagnostics.push(Diagnostic::for_switch(
                switch.id,
                format!("switch {} unreachable: {e}", switch.addr),
            ));
            return outcome;
        }
    };

    for (machine_id, mac) in targets {
        match probe.port_for_mac(mac.as_str()) {
            Ok(Some(port)) => {
                // Admin state read failure leaves the prior binding intact:
                // an inconclusive observation must not overwrite known state.
                match probe.port_states(port) {
                    Ok(states) => {
                        let up = states
                            .first()
                            .is_some_and(|s| s.administrative == PortAdminState::ENABLED_CODE);
                        outcome.observations.push(LiveObservation {
                            machine_id: *machine_id,
                            switch_id: switch.id,
                            port,
                            up,
                        });
                    }
                    Err(e) => outcome.diagnostics.push(Diagnostic::for_machine(
                        switch.id,
                        *machine_id,
                        format!("port {port} state unreadable: {e}"),
                    )),
                }
            }
            Ok(None) => {}
            Err(e) => outcome.diagnostics.push(Diagnostic::for_machine(
                switch.id,
                *machine_id,
                format!("lookup of {mac} failed: {e}"),
            )),
        }
    }
    outcome
}

// ── Engine ───────────────────────────────────────────────────────────

/// The reconciliation engine. One instance per process; runs are
/// run-to-completion and must not overlap (single-writer discipline on
/// the record store).
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    probes: Arc<dyn ProbeFactory>,
    concurrency: usize,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, probes: Arc<dyn ProbeFactory>) -> Self {
        Self {
            store,
            probes,
            concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }

    /// Bound on concurrent switch probes (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run both passes and report what changed.
    pub async fn run(&self) -> Result<ReconcileReport, CoreError> {
        let mut report = ReconcileReport::default();
        self.pass_live(&mut report).await?;
        self.pass_snapshots(&mut report).await?;
        info!(
            correlated = report.correlated,
            discovered = report.discovered,
            added = report.bindings_added,
            updated = report.bindings_updated,
            diagnostics = report.diagnostics.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Rebuild the snapshot table from live probes, switch by switch.
    /// Returns the number of rows written plus any per-switch diagnostics.
    pub async fn refresh_snapshots(&self) -> Result<(usize, Vec<Diagnostic>), CoreError> {
        let mut diagnostics = Vec::new();
        let written = self.refresh_snapshots_inner(&mut diagnostics).await?;
        Ok((written, diagnostics))
    }

    // ── Pass A: live correlation ─────────────────────────────────────

    async fn pass_live(&self, report: &mut ReconcileReport) -> Result<(), CoreError> {
        let switches = self.store.switches()?;
        let machines = self.store.machines()?;
        let targets: Vec<(u32, MacAddress)> = machines
            .iter()
            .filter_map(|m| m.mac.clone().map(|mac| (m.id, mac)))
            .collect();
        if switches.is_empty() || targets.is_empty() {
            debug!("live pass skipped: nothing to correlate");
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join = JoinSet::new();
        for switch in switches {
            let semaphore = Arc::clone(&semaphore);
            let probes = Arc::clone(&self.probes);
            let targets = targets.clone();
            join.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                tokio::task::spawn_blocking(move || {
                    probe_switch_live(probes.as_ref(), &switch, &targets)
                })
                .await
            });
        }

        let mut bindings = self.store.bindings()?;
        let mut changed = false;
        while let Some(joined) = join.join_next().await {
            match joined.and_then(|inner| inner) {
                Ok(outcome) => {
                    report.diagnostics.extend(outcome.diagnostics);
                    for obs in outcome.observations {
                        report.correlated += 1;
                        match upsert_binding(
                            &mut bindings,
                            obs.machine_id,
                            obs.switch_id,
                            obs.port,
                            obs.up,
                        ) {
                            Upsert::Added => {
                                report.bindings_added += 1;
                                changed = true;
                            }
                            Upsert::Updated => {
                                report.bindings_updated += 1;
                                changed = true;
                            }
                            Upsert::Unchanged => {}
                        }
                    }
                }
                Err(e) => report
                    .diagnostics
                    .push(Diagnostic::general(format!("probe task failed: {e}"))),
            }
        }

        if changed {
            self.store.replace_bindings(&bindings)?;
        }
        Ok(())
    }

    // ── Pass B: snapshot adoption ────────────────────────────────────

    async fn pass_snapshots(&self, report: &mut ReconcileReport) -> Result<(), CoreError> {
        let mut snapshots = self.store.snapshots()?;
        if snapshots.is_empty() {
            let mut diagnostics = Vec::new();
            report.snapshots_written = self.refresh_snapshots_inner(&mut diagnostics).await?;
            report.diagnostics.extend(diagnostics);
            snapshots = self.store.snapshots()?;
        }

        let mut machines = self.store.machines()?;
        let mut machines_changed = false;
        let mut next_id = self.store.next_machine_id()?;
        let mut mac_to_machine: HashMap<MacAddress, u32> = machines
            .iter()
            .filter_map(|m| m.mac.clone().map(|mac| (mac, m.id)))
            .collect();

        let mut bindings = self.store.bindings()?;
        let mut bindings_changed = false;

        for row in &snapshots {
            let Some(mac) = &row.mac else {
                continue;
            };
            let machine_id = if let Some(id) = mac_to_machine.get(mac) {
                *id
            } else {
                let id = next_id;
                next_id += 1;
                debug!(machine = id, mac = %mac, "adopting machine from snapshot");
                machines.push(Machine::discovered(id, mac.clone()));
                mac_to_machine.insert(mac.clone(), id);
                machines_changed = true;
                report.discovered += 1;
                id
            };

            let up = row.administrative == PortAdminState::ENABLED_CODE;
            match upsert_binding(&mut bindings, machine_id, row.switch_id, row.port, up) {
                Upsert::Added => {
                    report.bindings_added += 1;
                    bindings_changed = true;
                }
                Upsert::Updated => {
                    report.bindings_updated += 1;
                    bindings_changed = true;
                }
                Upsert::Unchanged => {}
            }
        }

        if machines_changed {
            self.store.replace_machines(&machines)?;
        }
        if bindings_changed {
            self.store.replace_bindings(&bindings)?;
        }
        Ok(())
    }

    // ── Snapshot refresh ─────────────────────────────────────────────

    async fn refresh_snapshots_inner(
        &self,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<usize, CoreError> {
        let switches = self.store.switches()?;
        if switches.is_empty() {
            return Ok(0);
        }
        let machines = self.store.machines()?;
        let bindings = self.store.bindings()?;

        let known_macs: HashSet<MacAddress> =
            machines.iter().filter_map(|m| m.mac.clone()).collect();
        let machine_macs: HashMap<u32, MacAddress> = machines
            .iter()
            .filter_map(|m| m.mac.clone().map(|mac| (m.id, mac)))
            .collect();
        let bound_macs: BoundMacs = bindings
            .iter()
            .filter_map(|b| {
                machine_macs
                    .get(&b.machine_id)
                    .map(|mac| ((b.switch_id, b.port), mac.clone()))
            })
            .collect();

        let known_macs = Arc::new(known_macs);
        let bound_macs = Arc::new(bound_macs);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join = JoinSet::new();
        for switch in switches {
            let semaphore = Arc::clone(&semaphore);
            let probes = Arc::clone(&self.probes);
            let known_macs = Arc::clone(&known_macs);
            let bound_macs = Arc::clone(&bound_macs);
            join.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                tokio::task::spawn_blocking(move || {
                    let rows = probes.connect(&switch).and_then(|probe| {
                        snapshot::build_switch_snapshot(
                            &switch,
                            probe.as_ref(),
                            &known_macs,
                            &bound_macs,
                        )
                    });
                    (switch, rows)
                })
                .await
            });
        }

        let mut merged = self.store.snapshots()?;
        let mut written = 0;
        while let Some(joined) = join.join_next().await {
            match joined.and_then(|inner| inner) {
                Ok((switch, Ok(rows))) => {
                    written += rows.len();
                    merged = snapshot::merge_snapshot_rows(merged, &switch, rows);
                }
                Ok((switch, Err(e))) => {
                    warn!(switch = switch.id, error = %e, "snapshot probe failed");
                    diagnostics.push(Diagnostic::for_switch(
                        switch.id,
                        format!("snapshot of {} failed: {e}", switch.addr),
                    ));
                }
                Err(e) => diagnostics.push(Diagnostic::general(format!(
                    "snapshot task failed: {e}"
                ))),
            }
        }

        self.store.replace_snapshots(&merged)?;
        Ok(written)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PortSnapshot;
    use crate::store::MemoryStore;
    use crate::testing::{switch_fixture, ScriptedFactory, ScriptedProbe};
    use portgate_snmp::PortStatus;
    use pretty_assertions::assert_eq;

    fn machine(id: u32, mac: &str) -> Machine {
        Machine {
            id,
            name: format!("lab-{id:02}"),
            addr: format!("10.1.0.{id}"),
            staff: false,
            room_id: Some(1),
            mac: Some(MacAddress::new(mac)),
            access_allowed: Some(true),
        }
    }

    fn status(port: u16, admin: i64) -> PortStatus {
        PortStatus {
            port,
            operational: 1,
            administrative: admin,
        }
    }

    fn engine(store: Arc<MemoryStore>, factory: ScriptedFactory) -> Reconciler {
        Reconciler::new(store, Arc::new(factory)).with_concurrency(2)
    }

    #[tokio::test]
    async fn live_pass_binds_machine_to_observed_port() {
        let store = Arc::new(MemoryStore::new());
        store.seed_switches(vec![switch_fixture(1, "10.0.0.1")]);
        store.seed_machines(vec![machine(3, "AA:BB:CC:DD:EE:01")]);

        let probe = ScriptedProbe::new()
            .with_states(vec![status(7, 1)])
            .with_learned(7, vec!["AA:BB:CC:DD:EE:01"]);
        let factory = ScriptedFactory::new().with_probe(1, probe);

        let report = engine(Arc::clone(&store), factory).run().await.unwrap();

        assert_eq!(report.correlated, 1);
        assert_eq!(report.bindings_added, 1);
        let bindings = store.bindings().unwrap();
        assert_eq!(
            bindings,
            vec![PortBinding {
                machine_id: 3,
                switch_id: 1,
                port: 7,
                up: true,
            }]
        );
    }

    #[tokio::test]
    async fn second_run_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.seed_switches(vec![switch_fixture(1, "10.0.0.1")]);
        store.seed_machines(vec![machine(3, "AA:BB:CC:DD:EE:01")]);

        let probe = ScriptedProbe::new()
            .with_states(vec![status(7, 1)])
            .with_learned(7, vec!["AA:BB:CC:DD:EE:01"]);

        let first = engine(
            Arc::clone(&store),
            ScriptedFactory::new().with_probe(1, probe.clone()),
        )
        .run()
        .await
        .unwrap();
        assert_eq!(first.changed(), 1);

        let second = engine(
            Arc::clone(&store),
            ScriptedFactory::new().with_probe(1, probe),
        )
        .run()
        .await
        .unwrap();
        assert_eq!(second.changed(), 0);
        assert_eq!(second.discovered, 0);
        assert_eq!(store.bindings().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn machine_moving_ports_updates_the_same_row() {
        let store = Arc::new(MemoryStore::new());
        store.seed_switches(vec![switch_fixture(1, "10.0.0.1")]);
        store.seed_machines(vec![machine(3, "AA:BB:CC:DD:EE:01")]);

        let on_port_7 = ScriptedProbe::new()
            .with_states(vec![status(7, 1)])
            .with_learned(7, vec!["AA:BB:CC:DD:EE:01"]);
        engine(
            Arc::clone(&store),
            ScriptedFactory::new().with_probe(1, on_port_7),
        )
        .run()
        .await
        .unwrap();

        let on_port_9 = ScriptedProbe::new()
            .with_states(vec![status(9, 2)])
            .with_learned(9, vec!["AA:BB:CC:DD:EE:01"]);
        let report = engine(
            Arc::clone(&store),
            ScriptedFactory::new().with_probe(1, on_port_9),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.bindings_updated, 1);
        assert_eq!(report.bindings_added, 0);
        let bindings = store.bindings().unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].port, 9);
        assert!(!bindings[0].up);
    }

    #[tokio::test]
    async fn unreachable_switch_degrades_to_diagnostic() {
        let store = Arc::new(MemoryStore::new());
        store.seed_switches(vec![switch_fixture(1, "10.0.0.1"), switch_fixture(2, "10.0.0.2")]);
        store.seed_machines(vec![machine(3, "AA:BB:CC:DD:EE:01")]);

        let probe = ScriptedProbe::new()
            .with_states(vec![status(4, 1)])
            .with_learned(4, vec!["AA:BB:CC:DD:EE:01"]);
        let factory = ScriptedFactory::new()
            .with_probe(2, probe)
            .with_unreachable(1);

        let report = engine(Arc::clone(&store), factory).run().await.unwrap();

        assert_eq!(report.correlated, 1);
        assert!(!report.is_clean());
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.switch_id == Some(1) && d.message.contains("unreachable")));
        // The healthy switch's result still landed.
        assert_eq!(store.bindings().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_pass_adopts_unknown_addresses() {
        let store = Arc::new(MemoryStore::new());
        store.seed_switches(vec![switch_fixture(1, "10.0.0.1")]);
        store.seed_machines(vec![machine(3, "AA:BB:CC:DD:EE:01")]);
        store.seed_snapshots(vec![
            PortSnapshot {
                switch_id: 1,
                switch_addr: "10.0.0.1".into(),
                port: 2,
                operational: 1,
                administrative: 1,
                mac: Some(MacAddress::new("AA:BB:CC:DD:EE:99")),
                bridge_mac: None,
            },
            // No address: never adopted, never bound.
            PortSnapshot {
                switch_id: 1,
                switch_addr: "10.0.0.1".into(),
                port: 3,
                operational: 2,
                administrative: 2,
                mac: None,
                bridge_mac: None,
            },
        ]);

        let factory = ScriptedFactory::new().with_probe(1, ScriptedProbe::new());
        let report = engine(Arc::clone(&store), factory).run().await.unwrap();

        assert_eq!(report.discovered, 1);
        let machines = store.machines().unwrap();
        assert_eq!(machines.len(), 2);
        let adopted = machines.iter().find(|m| m.id == 4).unwrap();
        assert_eq!(adopted.mac, Some(MacAddress::new("AA:BB:CC:DD:EE:99")));
        assert_eq!(adopted.access_allowed, Some(true));

        let bindings = store.bindings().unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].machine_id, 4);
        assert_eq!(bindings[0].port, 2);
        assert!(bindings[0].up);
    }

    #[tokio::test]
    async fn empty_snapshot_table_is_seeded_from_live_probes() {
        let store = Arc::new(MemoryStore::new());
        store.seed_switches(vec![switch_fixture(1, "10.0.0.1")]);
        store.seed_machines(vec![machine(3, "AA:BB:CC:DD:EE:01")]);

        let probe = ScriptedProbe::new()
            .with_states(vec![status(7, 1), status(8, 1)])
            .with_learned(7, vec!["AA:BB:CC:DD:EE:01"])
            .with_learned(8, vec!["11:22:33:44:55:66"]); // unknown, omitted
        let factory = ScriptedFactory::new().with_probe(1, probe);

        let report = engine(Arc::clone(&store), factory).run().await.unwrap();

        assert_eq!(report.snapshots_written, 1);
        let snapshots = store.snapshots().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].port, 7);
        assert_eq!(
            snapshots[0].mac,
            Some(MacAddress::new("AA:BB:CC:DD:EE:01"))
        );
    }

    #[tokio::test]
    async fn refresh_preserves_rows_of_unprobed_switches() {
        let store = Arc::new(MemoryStore::new());
        store.seed_switches(vec![switch_fixture(1, "10.0.0.1")]);
        store.seed_machines(vec![machine(3, "AA:BB:CC:DD:EE:01")]);
        store.seed_snapshots(vec![PortSnapshot {
            switch_id: 2,
            switch_addr: "10.0.0.2".into(),
            port: 5,
            operational: 1,
            administrative: 1,
            mac: Some(MacAddress::new("AA:BB:CC:DD:EE:02")),
            bridge_mac: None,
        }]);

        let probe = ScriptedProbe::new()
            .with_states(vec![status(7, 1)])
            .with_learned(7, vec!["AA:BB:CC:DD:EE:01"]);
        let factory = ScriptedFactory::new().with_probe(1, probe);
        let reconciler = engine(Arc::clone(&store), factory);

        let (written, diagnostics) = reconciler.refresh_snapshots().await.unwrap();
        assert_eq!(written, 1);
        assert!(diagnostics.is_empty());

        let snapshots = store.snapshots().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.iter().any(|r| r.switch_id == 2 && r.port == 5));
        assert!(snapshots.iter().any(|r| r.switch_id == 1 && r.port == 7));
    }

    #[test]
    fn upsert_keeps_one_row_per_machine_switch_pair() {
        let mut bindings = Vec::new();
        assert_eq!(upsert_binding(&mut bindings, 1, 1, 7, true), Upsert::Added);
        assert_eq!(
            upsert_binding(&mut bindings, 1, 1, 7, true),
            Upsert::Unchanged
        );
        assert_eq!(
            upsert_binding(&mut bindings, 1, 1, 8, true),
            Upsert::Updated
        );
        assert_eq!(upsert_binding(&mut bindings, 1, 2, 8, true), Upsert::Added);
        assert_eq!(bindings.len(), 2);
    }
}
