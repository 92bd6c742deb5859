//! Scheduled access window commands.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tabled::Tabled;

use portgate_core::{AccessSchedule, Scheduler, WindowRequest};

use crate::cli::{GlobalOpts, ScheduleArgs, ScheduleCommand};
use crate::crontab::CrontabExecutor;
use crate::error::CliError;
use crate::output;

use super::Context;
use super::port::parse_ports;

pub fn handle(ctx: &Context, args: ScheduleArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let executor = Arc::new(CrontabExecutor::new(ctx.config.crontab_bin.clone()));
    let scheduler = Scheduler::new(ctx.store.clone(), executor, invoke_argv())
        .with_tag_prefix(ctx.config.tag_prefix.clone());

    match args.command {
        ScheduleCommand::Add {
            switch,
            address,
            community,
            version,
            ports,
            start,
            end,
            machine,
            room,
        } => {
            let ports = parse_ports(&ports)?;
            let start = parse_datetime("start", &start)?;
            let end = parse_datetime("end", &end)?;

            let (switch_addr, community, version, switch_id) = match (switch, address) {
                (Some(id), _) => {
                    let switches = ctx.store.switches()?;
                    let switch = switches.iter().find(|s| s.id == id).ok_or_else(|| {
                        CliError::NotFound {
                            resource: "switch".into(),
                            identifier: id.to_string(),
                            list_command: "switches".into(),
                        }
                    })?;
                    (
                        switch.addr.clone(),
                        switch.community.clone().unwrap_or_else(|| "public".into()),
                        switch.snmp_version,
                        Some(id),
                    )
                }
                (None, Some(addr)) => {
                    let community = community.ok_or_else(|| CliError::Validation {
                        field: "community".into(),
                        reason: "--community is required with --address".into(),
                    })?;
                    (addr, community, version, None)
                }
                (None, None) => {
                    return Err(CliError::Validation {
                        field: "switch".into(),
                        reason: "pass either --switch or --address".into(),
                    });
                }
            };

            let request = WindowRequest {
                switch_addr,
                community,
                snmp_version: version,
                ports,
                start,
                end,
                room_id: room,
                switch_id,
                machine_id: machine,
                mac: None,
            };
            let registration = scheduler.register(&request)?;

            for warning in &registration.warnings {
                eprintln!("warning: {warning}");
            }
            let rendered = output::render_single(
                &global.output,
                &registration.schedule,
                |s| {
                    let status = if registration.registration_complete {
                        "registered"
                    } else {
                        "recorded, but NOT fully registered"
                    };
                    format!(
                        "window {} {status}: ports {} on {} blocked {} .. {}",
                        s.id,
                        join_ports(&s.ports),
                        s.switch_addr,
                        s.start,
                        s.end
                    )
                },
                |s| s.id.clone(),
            );
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ScheduleCommand::List => {
            let windows = scheduler.list()?;

            #[derive(Debug, Serialize)]
            struct WindowView {
                #[serde(flatten)]
                schedule: AccessSchedule,
                active: bool,
            }

            let views: Vec<WindowView> = windows
                .into_iter()
                .map(|(schedule, active)| WindowView { schedule, active })
                .collect();
            let rendered = output::render_list(
                &global.output,
                &views,
                |v| WindowRow {
                    id: v.schedule.id.clone(),
                    switch: v.schedule.switch_addr.clone(),
                    ports: join_ports(&v.schedule.ports),
                    start: v.schedule.start.to_string(),
                    end: v.schedule.end.to_string(),
                    active: if v.active { "yes" } else { "no" },
                },
                |v| v.schedule.id.clone(),
            );
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ScheduleCommand::Cancel { id, all } => {
            let removed = if all {
                scheduler.cancel_all()?
            } else {
                match id {
                    Some(id) => scheduler.cancel(&id)?,
                    None => 0,
                }
            };
            output::print_output(
                &format!("{removed} deferred entr{} removed", if removed == 1 { "y" } else { "ies" }),
                global.quiet,
            );
            Ok(())
        }
    }
}

#[derive(Tabled)]
struct WindowRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "SWITCH")]
    switch: String,
    #[tabled(rename = "PORTS")]
    ports: String,
    #[tabled(rename = "START")]
    start: String,
    #[tabled(rename = "END")]
    end: String,
    #[tabled(rename = "ACTIVE")]
    active: &'static str,
}

fn join_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Argv the deferred commands use to re-invoke this binary.
fn invoke_argv() -> Vec<String> {
    let binary = std::env::current_exe()
        .ok()
        .map_or_else(|| "portgate".to_owned(), |p| p.display().to_string());
    vec![binary]
}

fn parse_datetime(field: &str, raw: &str) -> Result<NaiveDateTime, CliError> {
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed);
        }
    }
    Err(CliError::Validation {
        field: field.to_owned(),
        reason: format!("'{raw}' is not a datetime (expected e.g. \"2026-08-23 14:00\")"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_common_datetime_shapes() {
        let expected = chrono::NaiveDate::from_ymd_opt(2026, 8, 23)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("start", "2026-08-23 14:00").unwrap(), expected);
        assert_eq!(parse_datetime("start", "2026-08-23T14:00").unwrap(), expected);
        assert_eq!(
            parse_datetime("start", "2026-08-23 14:00:00").unwrap(),
            expected
        );
        assert!(parse_datetime("start", "next tuesday").is_err());
    }
}
