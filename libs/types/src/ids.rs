//! Unique identifier types for venue entities
//!
//! Order and trade ids use UUID v7 for time-sortable ordering, so ids minted
//! later compare greater and diagnostic dumps read chronologically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an order, assigned by the engine at admission.
///
/// Unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Mint a fresh OrderId.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse an OrderId from its wire form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::from_str(s).ok().map(Self)
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a trade print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(Uuid);

impl TradeId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TradeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated session owner of an order.
///
/// Opaque token chosen by the client at AUTH time; the gateway guarantees at
/// most one live session per ClientId.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Instrument key (e.g. "TSLA", "BTC-USD").
///
/// Valid symbols are 1..=16 chars drawn from `A-Z 0-9 . - _`. Wire arguments
/// are case-preserving, so a lowercase token simply fails to match any
/// registered instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Try to create a Symbol, returning None if the token is invalid.
    pub fn try_new(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        let valid = !s.is_empty()
            && s.len() <= 16
            && s.bytes().all(|b| {
                b.is_ascii_uppercase() || b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'_')
            });
        valid.then_some(Self(s))
    }

    /// Create a Symbol.
    ///
    /// # Panics
    /// Panics if the token is not a valid symbol.
    pub fn new(s: impl Into<String>) -> Self {
        Self::try_new(s).expect("invalid symbol token")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
