//! Shared vocabulary types used across the store, gateway, and execution
//! pipeline. Kept deliberately small and `Copy`/`Serialize`-friendly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    A,
    B,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::A => "venue_a",
            Venue::B => "venue_b",
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        }
    }
}

/// Order status as tracked in the current-state `orders` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Placed,
    Open,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Open => "OPEN",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PLACED" => Some(OrderStatus::Placed),
            "OPEN" => Some(OrderStatus::Open),
            "FILLED" => Some(OrderStatus::Filled),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "REJECTED" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }
}

/// Lifecycle event kinds; the log built from them is append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Placed,
    Modified,
    Replaced,
    Cancelled,
    Filled,
    Rejected,
    MarketFallback,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Placed => "PLACED",
            EventType::Modified => "MODIFIED",
            EventType::Replaced => "REPLACED",
            EventType::Cancelled => "CANCELLED",
            EventType::Filled => "FILLED",
            EventType::Rejected => "REJECTED",
            EventType::MarketFallback => "MARKET_FALLBACK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PLACED" => Some(EventType::Placed),
            "MODIFIED" => Some(EventType::Modified),
            "REPLACED" => Some(EventType::Replaced),
            "CANCELLED" => Some(EventType::Cancelled),
            "FILLED" => Some(EventType::Filled),
            "REJECTED" => Some(EventType::Rejected),
            "MARKET_FALLBACK" => Some(EventType::MarketFallback),
            _ => None,
        }
    }
}

/// Primary key for an order row: `(chunk_group, sequence, venue)`.
///
/// The venue order id is deliberately *not* part of this key — cancel+replace
/// changes the order id but must resolve to the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub chunk_group: String,
    pub sequence: i64,
    pub venue: Venue,
}

impl ChunkKey {
    pub fn new(chunk_group: impl Into<String>, sequence: i64, venue: Venue) -> Self {
        Self {
            chunk_group: chunk_group.into(),
            sequence,
            venue,
        }
    }
}

/// Top-up status for a trade's fee reconciliation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopUpStatus {
    Completed,
    SkippedBelowMinimum,
    Failed,
}

impl TopUpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopUpStatus::Completed => "COMPLETED",
            TopUpStatus::SkippedBelowMinimum => "SKIPPED_BELOW_MINIMUM",
            TopUpStatus::Failed => "FAILED",
        }
    }
}
