//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and adapter failures into user-facing errors with
//! actionable help text and stable exit codes (the scheduled block and
//! unblock commands are driven by these codes).

use miette::Diagnostic;
use thiserror::Error;

use portgate_core::CoreError;
use portgate_snmp::AdapterError;

/// Exit codes. The `port` subcommand's codes are contractual: the
/// deferred-execution entries and anything wrapping them key off 2/3/4.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    /// The port list could not be parsed.
    pub const BAD_PORTS: i32 = 2;
    /// The SNMP session could not be constructed.
    pub const CONSTRUCTION: i32 = 3;
    /// At least one port write was refused.
    pub const ACTUATION: i32 = 4;
    pub const NOT_FOUND: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Port actuation surface ───────────────────────────────────────
    #[error("Invalid port list: '{input}'")]
    #[diagnostic(
        code(portgate::bad_ports),
        help("Pass comma-separated port numbers between 1 and 65535, e.g. \"3,4,12\".")
    )]
    InvalidPorts { input: String },

    #[error("Could not set up an SNMP session against {target}")]
    #[diagnostic(
        code(portgate::construction),
        help("Check the address, community, and --version, then retry.")
    )]
    Construction {
        target: String,
        #[source]
        source: AdapterError,
    },

    #[error("Switch {target} refused to set port(s) {ports}")]
    #[diagnostic(
        code(portgate::actuation),
        help(
            "The agent rejected or never acknowledged the write.\n\
             Verify the community has write access and the port numbers exist."
        )
    )]
    ActuationFailed { target: String, ports: String },

    // ── Lookups ──────────────────────────────────────────────────────
    #[error("{resource} '{identifier}' not found")]
    #[diagnostic(
        code(portgate::not_found),
        help("Run: portgate {list_command} to see what exists")
    )]
    NotFound {
        resource: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(portgate::validation))]
    Validation { field: String, reason: String },

    // ── Collaborator failures ────────────────────────────────────────
    #[error("SNMP error: {0}")]
    #[diagnostic(code(portgate::snmp))]
    Adapter(AdapterError),

    #[error(transparent)]
    #[diagnostic(code(portgate::store))]
    Store(#[from] portgate_core::StoreError),

    #[error("Deferred execution failed: {message}")]
    #[diagnostic(
        code(portgate::deferred),
        help("Check that the crontab binary is available and writable for this user.")
    )]
    Deferred { message: String },

    #[error(transparent)]
    #[diagnostic(code(portgate::config))]
    Config(Box<figment::Error>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidPorts { .. } => exit_code::BAD_PORTS,
            Self::Construction { .. } => exit_code::CONSTRUCTION,
            Self::ActuationFailed { .. } => exit_code::ACTUATION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SwitchNotFound { identifier } => CliError::NotFound {
                resource: "switch".into(),
                identifier,
                list_command: "switches".into(),
            },

            CoreError::MachineNotFound { identifier } => CliError::NotFound {
                resource: "machine".into(),
                identifier,
                list_command: "machines".into(),
            },

            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Adapter(err) => CliError::Adapter(err),

            CoreError::Store(err) => CliError::Store(err),

            CoreError::Deferred { message } => CliError::Deferred { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_surface_exit_codes_are_stable() {
        assert_eq!(
            CliError::InvalidPorts { input: "x".into() }.exit_code(),
            2
        );
        assert_eq!(
            CliError::Construction {
                target: "10.0.0.1".into(),
                source: AdapterError::Config {
                    message: "empty address".into()
                },
            }
            .exit_code(),
            3
        );
        assert_eq!(
            CliError::ActuationFailed {
                target: "10.0.0.1".into(),
                ports: "3,4".into()
            }
            .exit_code(),
            4
        );
    }
}
