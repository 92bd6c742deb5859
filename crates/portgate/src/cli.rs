//! Clap derive structures for the `portgate` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// portgate -- SNMP port access control for lab networks
#[derive(Debug, Parser)]
#[command(
    name = "portgate",
    version,
    about = "Control lab machine network access at the switch port",
    long_about = "Discovers which machine sits behind which switch port,\n\
        keeps that mapping reconciled, and enables/disables ports on demand\n\
        or on a schedule (e.g. blocking internet access during an exam).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the configuration file
    #[arg(long, env = "PORTGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the record tables (overrides config)
    #[arg(long, env = "PORTGATE_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PORTGATE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enable or disable switch ports directly (no inventory needed)
    ///
    /// This is also the surface the scheduled block/unblock commands
    /// re-invoke, so it takes the switch address and community inline.
    Port(PortArgs),

    /// Run discovery and reconciliation across the switch fleet
    #[command(alias = "sync")]
    Reconcile,

    /// Rebuild the port snapshot table from live probes
    Snapshot,

    /// Live port view of one switch (state, learned and own addresses)
    Ports {
        /// Switch id from the inventory
        switch: u32,
    },

    /// Manage scheduled access windows
    #[command(alias = "sched")]
    Schedule(ScheduleArgs),

    /// List known machines
    Machines,

    /// List inventory switches
    Switches,

    /// List lab rooms
    Rooms,
}

// ── Port actuation ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PortAction {
    /// Administratively enable the ports
    Enable,
    /// Administratively disable the ports
    Disable,
}

#[derive(Debug, Args)]
pub struct PortArgs {
    /// What to do with the ports
    #[arg(value_enum)]
    pub action: PortAction,

    /// Switch management address (host or host:port)
    pub address: String,

    /// SNMP write community
    pub community: String,

    /// Comma-separated port numbers (e.g. "3,4,12")
    pub ports: String,

    /// SNMP version (1 or 2)
    #[arg(long, default_value = "2")]
    pub version: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "2")]
    pub timeout: u64,

    /// Retries per request
    #[arg(long, default_value = "1")]
    pub retries: u32,
}

// ── Schedule ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    #[command(subcommand)]
    pub command: ScheduleCommand,
}

#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// Register an access window (ports blocked between start and end)
    Add {
        /// Switch id from the inventory (resolves address and community)
        #[arg(long, conflicts_with = "address")]
        switch: Option<u32>,

        /// Switch management address (when not using --switch)
        #[arg(long, requires = "community")]
        address: Option<String>,

        /// SNMP write community (when not using --switch)
        #[arg(long)]
        community: Option<String>,

        /// SNMP version (when not using --switch)
        #[arg(long, default_value = "2")]
        version: u32,

        /// Comma-separated port numbers
        #[arg(long, required = true)]
        ports: String,

        /// Window start, e.g. "2026-08-23 14:00"
        #[arg(long, required = true)]
        start: String,

        /// Window end, e.g. "2026-08-23 16:00"
        #[arg(long, required = true)]
        end: String,

        /// Machine id this window targets (recorded in the audit trail)
        #[arg(long)]
        machine: Option<u32>,

        /// Room id this window targets (recorded in the audit trail)
        #[arg(long)]
        room: Option<u32>,
    },

    /// List registered windows and whether they are still active
    #[command(alias = "ls")]
    List,

    /// Cancel a window's pending block/unblock commands
    Cancel {
        /// Window id (from `schedule list`)
        #[arg(required_unless_present = "all")]
        id: Option<String>,

        /// Cancel every managed window instead
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}
