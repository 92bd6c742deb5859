//! Inventory listing commands: machines, switches, rooms.
//!
//! Machines are cross-referenced with the binding table so the listing
//! shows where each machine was last seen.

use std::collections::HashMap;

use tabled::Tabled;

use portgate_core::{Machine, PortBinding};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Context;

#[derive(Tabled)]
struct MachineRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "ROOM")]
    room: String,
    #[tabled(rename = "STAFF")]
    staff: &'static str,
    #[tabled(rename = "ACCESS")]
    access: &'static str,
    #[tabled(rename = "LAST SEEN")]
    last_seen: String,
}

fn machine_row(machine: &Machine, bindings: &HashMap<u32, &PortBinding>) -> MachineRow {
    let last_seen = bindings
        .get(&machine.id)
        .map(|b| {
            format!(
                "switch {} port {} ({})",
                b.switch_id,
                b.port,
                if b.up { "up" } else { "down" }
            )
        })
        .unwrap_or_default();
    MachineRow {
        id: machine.id,
        name: machine.name.clone(),
        mac: machine
            .mac
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        room: machine.room_id.map(|r| r.to_string()).unwrap_or_default(),
        staff: if machine.staff { "yes" } else { "" },
        access: if machine.is_access_allowed() { "yes" } else { "NO" },
        last_seen,
    }
}

pub fn machines(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let machines = ctx.store.machines()?;
    let bindings = ctx.store.bindings()?;
    let by_machine: HashMap<u32, &PortBinding> =
        bindings.iter().map(|b| (b.machine_id, b)).collect();

    let rendered = output::render_list(
        &global.output,
        &machines,
        |m| machine_row(m, &by_machine),
        |m| m.id.to_string(),
    );
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub fn switches(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    #[derive(Tabled)]
    struct SwitchRow {
        #[tabled(rename = "ID")]
        id: u32,
        #[tabled(rename = "ADDRESS")]
        addr: String,
        #[tabled(rename = "PORTS")]
        ports: u16,
        #[tabled(rename = "SNMP")]
        version: u32,
        #[tabled(rename = "UPLINK")]
        uplink: String,
    }

    let switches = ctx.store.switches()?;
    let rendered = output::render_list(
        &global.output,
        &switches,
        |s| SwitchRow {
            id: s.id,
            addr: s.addr.clone(),
            ports: s.port_count,
            version: s.snmp_version,
            uplink: s.uplink_port.map(|p| p.to_string()).unwrap_or_default(),
        },
        |s| s.id.to_string(),
    );
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub fn rooms(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    #[derive(Tabled)]
    struct RoomRow {
        #[tabled(rename = "ID")]
        id: u32,
        #[tabled(rename = "ROOM")]
        number: u32,
        #[tabled(rename = "BLOCK")]
        block: String,
        #[tabled(rename = "MACHINES")]
        machines: String,
    }

    let rooms = ctx.store.rooms()?;
    let rendered = output::render_list(
        &global.output,
        &rooms,
        |r| RoomRow {
            id: r.id,
            number: r.number,
            block: r.block.clone(),
            machines: r.machine_count.map(|c| c.to_string()).unwrap_or_default(),
        },
        |r| r.id.to_string(),
    );
    output::print_output(&rendered, global.quiet);
    Ok(())
}
