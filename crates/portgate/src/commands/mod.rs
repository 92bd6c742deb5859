//! Command dispatch: bridges CLI args -> core services -> output formatting.

pub mod inventory;
pub mod port;
pub mod ports;
pub mod reconcile;
pub mod schedule;

use std::sync::Arc;

use portgate_core::{JsonStore, RecordStore, SnmpProbeFactory};

use crate::cli::{Command, GlobalOpts};
use crate::config::Config;
use crate::error::CliError;

/// Shared wiring for every store-backed command.
pub struct Context {
    pub store: Arc<dyn RecordStore>,
    pub factory: Arc<SnmpProbeFactory>,
    pub config: Config,
}

impl Context {
    pub fn new(config: Config, global: &GlobalOpts) -> Result<Self, CliError> {
        let data_dir = config.resolve_data_dir(global);
        tracing::debug!(data_dir = %data_dir.display(), "opening record store");
        let store = JsonStore::open(data_dir)?;
        let factory = SnmpProbeFactory::new(config.probe_timeout(), config.snmp.retries);
        Ok(Self {
            store: Arc::new(store),
            factory: Arc::new(factory),
            config,
        })
    }
}

/// Dispatch a store-backed command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Reconcile => reconcile::handle(ctx, global).await,
        Command::Snapshot => reconcile::handle_snapshot(ctx, global).await,
        Command::Ports { switch } => ports::handle(ctx, switch, global),
        Command::Schedule(args) => schedule::handle(ctx, args, global),
        Command::Machines => inventory::machines(ctx, global),
        Command::Switches => inventory::switches(ctx, global),
        Command::Rooms => inventory::rooms(ctx, global),
        // Port is handled before dispatch: it needs no store.
        Command::Port(_) => unreachable!(),
    }
}
