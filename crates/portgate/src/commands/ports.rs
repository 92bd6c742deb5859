//! Live port view of one switch.
//!
//! Reads everything in one sitting: operational/administrative state per
//! port, addresses learned behind each port, the switch's own interface
//! addresses, and the bridge address.

use serde::Serialize;
use tabled::Tabled;

use portgate_core::{CoreError, ProbeFactory, SwitchProbe};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Context;

#[derive(Debug, Serialize)]
struct PortView {
    port: u16,
    operational: i64,
    administrative: i64,
    learned: Vec<String>,
    own_mac: Option<String>,
}

#[derive(Tabled)]
struct PortRow {
    #[tabled(rename = "PORT")]
    port: u16,
    #[tabled(rename = "OPER")]
    operational: i64,
    #[tabled(rename = "ADMIN")]
    administrative: i64,
    #[tabled(rename = "LEARNED MACS")]
    learned: String,
    #[tabled(rename = "OWN MAC")]
    own_mac: String,
}

pub fn handle(ctx: &Context, switch_id: u32, global: &GlobalOpts) -> Result<(), CliError> {
    let switches = ctx.store.switches()?;
    let switch = switches
        .iter()
        .find(|s| s.id == switch_id)
        .ok_or_else(|| CoreError::SwitchNotFound {
            identifier: switch_id.to_string(),
        })?;

    let probe = ctx
        .factory
        .connect(switch)
        .map_err(|source| CliError::Construction {
            target: switch.addr.clone(),
            source,
        })?;

    let states = probe.port_states(0).map_err(CoreError::from)?;
    let learned = probe.macs_by_port().unwrap_or_default();
    let own = probe.interface_addresses().unwrap_or_default();
    let bridge = probe.bridge_address();

    let views: Vec<PortView> = states
        .iter()
        .map(|s| PortView {
            port: s.port,
            operational: s.operational,
            administrative: s.administrative,
            learned: learned.get(&s.port).cloned().unwrap_or_default(),
            own_mac: own.get(&s.port).cloned(),
        })
        .collect();

    let rendered = output::render_list(
        &global.output,
        &views,
        |v| PortRow {
            port: v.port,
            operational: v.operational,
            administrative: v.administrative,
            learned: v.learned.join(" "),
            own_mac: v.own_mac.clone().unwrap_or_default(),
        },
        |v| v.port.to_string(),
    );
    output::print_output(&rendered, global.quiet);
    if let Some(bridge) = bridge {
        output::print_output(&format!("bridge address: {bridge}"), global.quiet);
    }
    Ok(())
}
