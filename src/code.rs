use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SyncError};

/// Exchanges whose listings are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
}

impl Exchange {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "SH" => Some(Exchange::Shanghai),
            "SZ" => Some(Exchange::Shenzhen),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Exchange::Shanghai => "SH",
            Exchange::Shenzhen => "SZ",
        }
    }
}

/// Security or index identifier held in canonical suffixed form (`600000.SH`).
///
/// Accepts the two external shapes seen on the wire, `NNNNNN.XX` and the session
/// provider's prefixed `xx.NNNNNN`, both nine characters long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecurityCode {
    symbol: String,
    exchange: Exchange,
}

impl SecurityCode {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != 9 || !trimmed.is_ascii() {
            return Err(SyncError::InvalidCode(raw.to_string()));
        }

        let (symbol, tag) = match trimmed.find('.') {
            Some(6) => (&trimmed[..6], &trimmed[7..]),
            Some(2) => (&trimmed[3..], &trimmed[..2]),
            _ => return Err(SyncError::InvalidCode(raw.to_string())),
        };

        let exchange =
            Exchange::from_tag(tag).ok_or_else(|| SyncError::InvalidCode(raw.to_string()))?;
        if !symbol.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SyncError::InvalidCode(raw.to_string()));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            exchange,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Canonical form, also what the bulk provider expects.
    pub fn canonical(&self) -> String {
        format!("{}.{}", self.symbol, self.exchange.tag())
    }

    /// Prefixed lowercase form used by the session provider.
    pub fn session_form(&self) -> String {
        format!("{}.{}", self.exchange.tag().to_ascii_lowercase(), self.symbol)
    }
}

impl fmt::Display for SecurityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.exchange.tag())
    }
}

impl FromStr for SecurityCode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        SecurityCode::parse(s)
    }
}

impl Serialize for SecurityCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for SecurityCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SecurityCode::parse(&raw).map_err(serde::de::Error::custom)
    }
}
