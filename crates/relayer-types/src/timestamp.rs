//! Unix timestamp wrapper used for `firstSeenAt`/`lastAttemptAt`/`terminalAt` fields.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

/// A Unix timestamp in whole seconds, used for `firstSeenAt`, `lastAttemptAt`, and
/// `terminalAt` fields across the data model.
///
/// Serializes as a stringified integer so it survives round-trips through JSON
/// without precision loss on platforms with 32-bit doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnixTimestamp(pub u64);

impl UnixTimestamp {
    pub fn now() -> Result<Self, SystemTimeError> {
        let secs = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        Ok(Self(secs))
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let ts = s
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom("timestamp must be a non-negative integer"))?;
        Ok(UnixTimestamp(ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_string() {
        let ts = UnixTimestamp(1_700_000_000);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"1700000000\"");
    }

    #[test]
    fn now_is_after_epoch() {
        let ts = UnixTimestamp::now().unwrap();
        assert!(ts.0 > 1_700_000_000);
    }
}
