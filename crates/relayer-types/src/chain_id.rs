//! CAIP-2-style chain identifiers: a `namespace:reference` identifier such as
//! `eip155:8453` or `solana:mainnet`. This relayer only ever addresses the handful of
//! chains named in its own config, not an arbitrary CAIP-2 universe, so there is no
//! wildcard/set matching or well-known-network catalog here.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

/// A `namespace:reference` blockchain identifier, e.g. `eip155:8453`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId {
    namespace: String,
    reference: String,
}

impl ChainId {
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn is_eip155(&self) -> bool {
        self.namespace == "eip155"
    }

    pub fn is_solana(&self) -> bool {
        self.namespace == "solana"
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

/// Error returned when parsing an invalid `namespace:reference` string.
#[derive(Debug, thiserror::Error)]
#[error("invalid chain id {0:?}, expected \"namespace:reference\"")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s.split_once(':').ok_or_else(|| ChainIdFormatError(s.into()))?;
        if namespace.is_empty() || reference.is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }
        Ok(ChainId {
            namespace: namespace.into(),
            reference: reference.into(),
        })
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChainId::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = ChainId::new("eip155", "8453");
        assert_eq!(id.to_string(), "eip155:8453");
        assert_eq!(id, "eip155:8453".parse().unwrap());
    }

    #[test]
    fn rejects_missing_colon() {
        assert!("eip155-8453".parse::<ChainId>().is_err());
    }

    #[test]
    fn rejects_empty_parts() {
        assert!(":8453".parse::<ChainId>().is_err());
        assert!("eip155:".parse::<ChainId>().is_err());
    }

    #[test]
    fn serializes_as_colon_separated_string() {
        let id = ChainId::new("solana", "mainnet");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"solana:mainnet\"");
        let back: ChainId = serde_json::from_str("\"solana:mainnet\"").unwrap();
        assert_eq!(back, id);
    }
}
