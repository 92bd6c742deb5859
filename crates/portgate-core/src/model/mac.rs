use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use portgate_snmp::AdapterError;
use portgate_snmp::oid;

/// Hardware address, normalized to uppercase colon-separated form
/// (`AA:BB:CC:DD:EE:FF`). Once learned for a machine it becomes the
/// reconciliation key, so every code path must agree on the canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress(String);

impl MacAddress {
    /// Create a normalized MAC address from any common format.
    /// Accepts colon-separated or dash-separated hex in either case.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw.as_ref().trim().to_uppercase().replace('-', ":");
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The decimal FDB index suffix used to look this address up in
    /// dot1dTpFdbPort (e.g. `170.187.204.221.238.255`).
    pub fn fdb_suffix(&self) -> Result<String, AdapterError> {
        oid::mac_to_fdb_suffix(&self.0)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for MacAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_separators_and_case() {
        assert_eq!(MacAddress::new("aa-bb-cc-dd-ee-ff").as_str(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(MacAddress::new(" aa:bb:cc:dd:ee:01 ").as_str(), "AA:BB:CC:DD:EE:01");
    }

    #[test]
    fn equal_addresses_compare_equal_across_input_forms() {
        assert_eq!(
            MacAddress::new("AA-BB-CC-DD-EE-FF"),
            MacAddress::new("aa:bb:cc:dd:ee:ff")
        );
    }

    #[test]
    fn fdb_suffix_matches_decimal_octets() {
        let mac = MacAddress::new("AA:BB:CC:DD:EE:FF");
        assert_eq!(mac.fdb_suffix().unwrap(), "170.187.204.221.238.255");
    }
}
