//! Exchange identification.
//!
//! Each supported market-data venue has one canonical identifier. The
//! lowercase string form (`binance`, `okx`, `gate`) is what appears in
//! logs, status snapshots, and serialized events.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical exchange identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Okx,
    Gate,
}

impl ExchangeId {
    /// All supported exchanges, in a stable order.
    pub const ALL: [Self; 3] = [Self::Binance, Self::Okx, Self::Gate];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Okx => "okx",
            Self::Gate => "gate",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "okx" => Ok(Self::Okx),
            "gate" | "gateio" | "gate.io" => Ok(Self::Gate),
            other => Err(CoreError::UnknownExchange(other.to_string())),
        }
    }
}
