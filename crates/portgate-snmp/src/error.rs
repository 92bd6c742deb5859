use thiserror::Error;

/// Top-level error type for the `portgate-snmp` crate.
///
/// The taxonomy is deliberately small: configuration problems are fatal at
/// construction, transport problems are caught at the adapter boundary and
/// usually degraded to empty/false results, and parse problems mark a single
/// unusable entry. `portgate-core` maps these into diagnostics.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter cannot be built from the supplied parameters
    /// (e.g. no target address). Never degraded — surfaced to the caller.
    #[error("Adapter configuration error: {message}")]
    Config { message: String },

    /// Timeout, unreachable agent, or a malformed response on the wire.
    #[error("SNMP transport error against {target}: {message}")]
    Transport { target: String, message: String },

    /// A response carried data the adapter cannot interpret
    /// (non-numeric index, undecodable table suffix).
    #[error("Unparseable SNMP data: {message}")]
    Parse { message: String },
}

impl AdapterError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn transport(target: &str, err: &snmp2::Error) -> Self {
        Self::Transport {
            target: target.to_owned(),
            message: format!("{err:?}"),
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}
