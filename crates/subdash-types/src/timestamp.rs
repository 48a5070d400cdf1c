//! Unix timestamps reported by billing managers.
//!
//! Managers report `nextPaymentTimestamp` and event timestamps as seconds since
//! the epoch. [`UnixTimestamp`] keeps the raw value and renders it in the
//! local time zone for display, e.g. `March 4, 2025 3:07:09 PM`.

use alloy_primitives::U256;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

/// Display pattern of timestamps: `March 4, 2025 3:07:09 PM`.
pub const DISPLAY_FORMAT: &str = "%B %-d, %Y %-I:%M:%S %p";

/// Seconds since the Unix epoch.
///
/// Serialized as a stringified integer, like every other on-chain integer in
/// this crate.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash, Default)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Current system time.
    ///
    /// A clock set before the epoch reads as the epoch itself.
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(now)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The timestamp in the local time zone.
    pub fn to_local(&self) -> Option<DateTime<Local>> {
        let secs = i64::try_from(self.0).ok()?;
        Local.timestamp_opt(secs, 0).single()
    }

    /// Human-readable local time, or the raw seconds if out of range.
    pub fn display_local(&self) -> String {
        match self.to_local() {
            Some(datetime) => datetime.format(DISPLAY_FORMAT).to_string(),
            None => self.0.to_string(),
        }
    }
}

/// On-chain timestamps arrive as `uint256`; anything beyond `u64` saturates.
impl From<U256> for UnixTimestamp {
    fn from(value: U256) -> Self {
        Self(u64::try_from(value).unwrap_or(u64::MAX))
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

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u256_saturates() {
        let huge = U256::from(u128::MAX);
        assert_eq!(UnixTimestamp::from(huge).as_secs(), u64::MAX);
        assert_eq!(UnixTimestamp::from(U256::from(42u64)).as_secs(), 42);
    }

    #[test]
    fn test_display_local_contains_year() {
        let ts = UnixTimestamp::from_secs(1_700_000_000);
        let rendered = ts.display_local();
        assert!(rendered.contains("2023"), "{rendered}");
    }

    #[test]
    fn test_serde_as_string() {
        let ts = UnixTimestamp::from_secs(1_699_999_999);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"1699999999\"");
        let back: UnixTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
