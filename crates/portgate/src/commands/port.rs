//! Direct port actuation against one switch.
//!
//! This is the surface the deferred block/unblock commands re-invoke, so
//! it takes the switch address and community inline (no record store) and
//! keeps its exit codes stable: 2 bad ports, 3 session construction,
//! 4 refused write.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use portgate_snmp::{AdapterConfig, PortAdminState, SnmpAdapter};

use crate::cli::{GlobalOpts, PortAction, PortArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct ActionSummary {
    target: String,
    state: PortAdminState,
    ports: Vec<u16>,
}

pub fn handle(args: PortArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ports = parse_ports(&args.ports)?;
    let state = match args.action {
        PortAction::Enable => PortAdminState::Enabled,
        PortAction::Disable => PortAdminState::Disabled,
    };

    let config = AdapterConfig::new(args.address.clone())
        .community(args.community.clone())
        .write_community(args.community)
        .version(args.version)
        .timeout(Duration::from_secs(args.timeout))
        .retries(args.retries);
    let adapter = SnmpAdapter::new(config).map_err(|source| CliError::Construction {
        target: args.address.clone(),
        source,
    })?;

    info!(target = %args.address, ?ports, %state, "setting ports");
    if !adapter.set_ports(&ports, state) {
        return Err(CliError::ActuationFailed {
            target: args.address,
            ports: args.ports,
        });
    }

    let summary = ActionSummary {
        target: args.address,
        state,
        ports,
    };
    let rendered = output::render_single(
        &global.output,
        &summary,
        |s| {
            format!(
                "{} port(s) {} on {}",
                s.state,
                s.ports
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
                s.target
            )
        },
        |s| s.target.clone(),
    );
    output::print_output(&rendered, global.quiet);
    Ok(())
}

/// Parse a comma-separated port list. Zero is not a port (it is the
/// "all ports" sentinel elsewhere), so it is rejected here.
pub(crate) fn parse_ports(input: &str) -> Result<Vec<u16>, CliError> {
    let invalid = || CliError::InvalidPorts {
        input: input.to_owned(),
    };

    let mut ports = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let port: u16 = part.parse().map_err(|_| invalid())?;
        if port == 0 {
            return Err(invalid());
        }
        if !ports.contains(&port) {
            ports.push(port);
        }
    }
    if ports.is_empty() {
        return Err(invalid());
    }
    Ok(ports)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_and_dedupes_port_lists() {
        assert_eq!(parse_ports("3,4,12").unwrap(), vec![3, 4, 12]);
        assert_eq!(parse_ports(" 3 , 4 ,3 ").unwrap(), vec![3, 4]);
        assert_eq!(parse_ports("7").unwrap(), vec![7]);
    }

    #[test]
    fn rejects_garbage_port_lists() {
        for input in ["", ",", "abc", "3,x", "0", "3,0", "-1", "70000"] {
            assert!(
                matches!(parse_ports(input), Err(CliError::InvalidPorts { .. })),
                "input {input:?} should be rejected"
            );
        }
    }
}
