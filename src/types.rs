// =============================================================================
// Shared types used across the stock analyser
// =============================================================================

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A tradable instrument as listed in the broker's instrument dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_token: u64,
    pub tradingsymbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub instrument_type: String,
}

impl Instrument {
    pub fn new(tradingsymbol: impl Into<String>, instrument_token: u64) -> Self {
        Self {
            instrument_token,
            tradingsymbol: tradingsymbol.into(),
            name: String::new(),
            exchange: String::new(),
            instrument_type: String::new(),
        }
    }
}

/// One interval's OHLC summary as returned by the historical data endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub date: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

/// Candle interval accepted by the broker's historical data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "minute")]
    Minute,
    #[serde(rename = "3minute")]
    ThreeMinute,
    #[serde(rename = "5minute")]
    FiveMinute,
    #[serde(rename = "10minute")]
    TenMinute,
    #[serde(rename = "15minute")]
    FifteenMinute,
    #[serde(rename = "30minute")]
    ThirtyMinute,
    #[serde(rename = "60minute")]
    SixtyMinute,
    #[serde(rename = "day")]
    Day,
}

impl Interval {
    pub const ALL: [Interval; 8] = [
        Self::Minute,
        Self::ThreeMinute,
        Self::FiveMinute,
        Self::TenMinute,
        Self::FifteenMinute,
        Self::ThirtyMinute,
        Self::SixtyMinute,
        Self::Day,
    ];

    /// Path segment used by the broker API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::ThreeMinute => "3minute",
            Self::FiveMinute => "5minute",
            Self::TenMinute => "10minute",
            Self::FifteenMinute => "15minute",
            Self::ThirtyMinute => "30minute",
            Self::SixtyMinute => "60minute",
            Self::Day => "day",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == wanted)
            .ok_or_else(|| format!("unknown interval '{s}'"))
    }
}

/// Where the front door is in the broker login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::Anonymous
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::Authenticating => write!(f, "Authenticating"),
            Self::Authenticated => write!(f, "Authenticated"),
        }
    }
}
