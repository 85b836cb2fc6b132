//! Shared configuration primitives.
//!
//! [`LiteralOrEnv`] lets any config field be given either as a literal value or as a
//! `$VAR`/`${VAR}` reference resolved at load time, which is how `signerSecret`
//! (`spec.md` §6) stays out of committed config files.

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use url::Url;

/// A single RPC provider endpoint, with an optional requests-per-second cap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcConfig {
    pub http: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// A transparent wrapper that resolves environment variables during deserialization.
///
/// - Literal: `"0xabc..."`
/// - Simple env var: `"$SIGNER_SECRET"`
/// - Braced env var: `"${SIGNER_SECRET}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    fn parse_env_var_syntax(s: &str) -> Option<String> {
        if let Some(stripped) = s.strip_prefix("${") {
            stripped.strip_suffix('}').map(String::from)
        } else if let Some(var_name) = s.strip_prefix('$') {
            (!var_name.is_empty() && var_name.chars().all(|c| c.is_alphanumeric() || c == '_'))
                .then(|| var_name.to_string())
        } else {
            None
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for LiteralOrEnv<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = if let Some(var_name) = Self::parse_env_var_syntax(&s) {
            std::env::var(&var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "environment variable '{var_name}' not found (referenced as '{s}')"
                ))
            })?
        } else {
            s
        };
        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("failed to parse value: {e}")))?;
        Ok(LiteralOrEnv(parsed))
    }
}

impl<T> Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_braced_env_var() {
        unsafe {
            std::env::set_var("RELAYER_TEST_SECRET", "abc123");
        }
        let parsed: LiteralOrEnv<String> = serde_json::from_str("\"${RELAYER_TEST_SECRET}\"").unwrap();
        assert_eq!(parsed.inner(), "abc123");
    }

    #[test]
    fn passes_through_literal() {
        let parsed: LiteralOrEnv<String> = serde_json::from_str("\"literal-value\"").unwrap();
        assert_eq!(parsed.inner(), "literal-value");
    }

    #[test]
    fn missing_env_var_errors() {
        let result: Result<LiteralOrEnv<String>, _> =
            serde_json::from_str("\"$RELAYER_DEFINITELY_UNSET_VAR\"");
        assert!(result.is_err());
    }
}
