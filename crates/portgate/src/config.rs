//! CLI-owned configuration: a TOML file layered under `PORTGATE_*`
//! environment variables and command-line overrides.
//!
//! Core never sees these types -- it receives a data directory, probe
//! tuning, and an executor built from them.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cli::GlobalOpts;
use crate::error::CliError;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Directory holding the record tables.
    pub data_dir: Option<PathBuf>,

    /// Tag prefix for managed crontab entries.
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    /// Bound on concurrent switch probes.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Crontab binary to shell out to.
    #[serde(default = "default_crontab_bin")]
    pub crontab_bin: String,

    #[serde(default)]
    pub snmp: SnmpDefaults,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SnmpDefaults {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Retries per request.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            tag_prefix: default_tag_prefix(),
            concurrency: default_concurrency(),
            crontab_bin: default_crontab_bin(),
            snmp: SnmpDefaults::default(),
        }
    }
}

impl Default for SnmpDefaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_tag_prefix() -> String {
    "portgate".into()
}
fn default_concurrency() -> usize {
    4
}
fn default_crontab_bin() -> String {
    "crontab".into()
}
fn default_timeout() -> u64 {
    2
}
fn default_retries() -> u32 {
    1
}

impl Config {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.snmp.timeout)
    }

    /// Record-table directory: CLI flag, then config file, then the
    /// platform data directory.
    pub fn resolve_data_dir(&self, global: &GlobalOpts) -> PathBuf {
        if let Some(dir) = &global.data_dir {
            return dir.clone();
        }
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        default_data_dir()
    }
}

/// Default config file location (`~/.config/portgate/portgate.toml` on
/// Linux).
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "portgate")
        .map(|dirs| dirs.config_dir().join("portgate.toml"))
        .unwrap_or_else(|| PathBuf::from("portgate.toml"))
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "portgate")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("portgate-data"))
}

/// Layered load: defaults < TOML file < `PORTGATE_*` environment.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);
    let config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PORTGATE_").split("__"))
        .extract()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_usable_without_a_file() {
        let config = Config::default();
        assert_eq!(config.tag_prefix, "portgate");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.snmp.timeout, 2);
        assert_eq!(config.probe_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "portgate.toml",
                r#"
                    data_dir = "/var/lib/portgate"
                    concurrency = 8

                    [snmp]
                    timeout = 5
                "#,
            )?;
            let config: Config = Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("portgate.toml"))
                .extract()?;
            assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/portgate")));
            assert_eq!(config.concurrency, 8);
            assert_eq!(config.snmp.timeout, 5);
            assert_eq!(config.snmp.retries, 1); // untouched default
            Ok(())
        });
    }
}
