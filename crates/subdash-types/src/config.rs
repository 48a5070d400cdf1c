//! Configuration primitives shared by the ledger and the dashboard.
//!
//! Values in configuration files may be literals or references to
//! environment variables, so private keys and RPC credentials can stay out of
//! the file:
//!
//! ```json
//! {
//!   "signer": "$SIGNER_PRIVATE_KEY",
//!   "rpc": [{ "http": "${RPC_URL}", "rate_limit": 20 }]
//! }
//! ```

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::str::FromStr;
use url::Url;

/// A single RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcConfig {
    /// HTTP URL of the endpoint.
    pub http: LiteralOrEnv<Url>,
    /// Requests per second allowed against this endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// Addresses of the externally deployed contracts the dashboard talks to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractsConfig {
    /// `ManagerFactory` deploying billing managers.
    pub manager_factory: LiteralOrEnv<Address>,
    /// `AAFactory` deploying smart-wallet accounts.
    pub account_factory: LiteralOrEnv<Address>,
    /// Price feed handed to new managers and accounts.
    pub price_feed: LiteralOrEnv<Address>,
}

/// Wrapper that resolves `$VAR` and `${VAR}` references during deserialization.
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

    /// Returns the variable name if `s` is `$VAR` or `${VAR}`.
    fn env_var_name(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            return Some(braced);
        }
        let bare = s.strip_prefix('$')?;
        let valid = !bare.is_empty() && bare.chars().all(|c| c.is_alphanumeric() || c == '_');
        valid.then_some(bare)
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
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
        // Numbers and booleans are accepted as-is and reparsed from their text.
        let raw = serde_json::Value::deserialize(deserializer)?;
        let s = match raw {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected a string, number or boolean, got {other}"
                )));
            }
        };

        let value = match Self::env_var_name(&s) {
            Some(var_name) => std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{}' not found (referenced as '{}')",
                    var_name, s
                ))
            })?,
            None => s,
        };

        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {}", e)))?;
        Ok(LiteralOrEnv(parsed))
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// A validated 32-byte EVM private key.
///
/// `Debug` never prints the key material.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EvmPrivateKey(B256);

impl EvmPrivateKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0.0
    }
}

impl Debug for EvmPrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("EvmPrivateKey(..)")
    }
}

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid evm private key: {}", e))
    }
}

impl Serialize for EvmPrivateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("<redacted>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_address() {
        let json = r#""0x000000000000000000000000000000000000800a""#;
        let value: LiteralOrEnv<Address> = serde_json::from_str(json).unwrap();
        assert_eq!(
            *value.inner(),
            Address::from_str("0x000000000000000000000000000000000000800a").unwrap()
        );
    }

    #[test]
    fn test_env_reference() {
        // SAFETY: test-local variable name, not read by any other test.
        unsafe { std::env::set_var("SUBDASH_TEST_RATE", "25") };
        let value: LiteralOrEnv<u32> = serde_json::from_str(r#""$SUBDASH_TEST_RATE""#).unwrap();
        assert_eq!(*value, 25);
        let value: LiteralOrEnv<u32> =
            serde_json::from_str(r#""${SUBDASH_TEST_RATE}""#).unwrap();
        assert_eq!(*value, 25);
    }

    #[test]
    fn test_missing_env_reference() {
        let result: Result<LiteralOrEnv<u32>, _> =
            serde_json::from_str(r#""$SUBDASH_TEST_SURELY_UNSET""#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("SUBDASH_TEST_SURELY_UNSET"), "{err}");
    }

    #[test]
    fn test_number_literal() {
        let value: LiteralOrEnv<u64> = serde_json::from_str("300").unwrap();
        assert_eq!(*value, 300);
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let key: EvmPrivateKey =
            "0xcafe000000000000000000000000000000000000000000000000000000000001"
                .parse()
                .unwrap();
        assert_eq!(format!("{key:?}"), "EvmPrivateKey(..)");
    }
}
