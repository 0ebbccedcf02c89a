//! Venue Gateway abstraction — the transport seam between the execution
//! pipeline and a venue's actual trading API.
//!
//! Two implementations are expected to exist in a production deployment, one
//! per venue binding; this crate ships [`paper::PaperGateway`], the
//! simulated adapter used for tests and dry-run mode. A REST+stream adapter
//! for a live venue would implement the same trait and nothing upstream
//! would change.

pub mod paper;

use crate::error::HedgeError;
use crate::types::{OrderSide, OrderType, Venue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub client_tag: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
    pub post_only: bool,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub order_id: String,
    pub accepted: bool,
    pub reject_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AmendRequest {
    pub order_id: String,
    pub new_price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyFilled,
    NotFound,
}

/// Normalized stream/polling status, unified across venues: both venues
/// report order quantity in base-asset units, so a single enum with a
/// single `executed_qty` field covers either side without a venue-specific
/// unit tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueStreamEvent {
    pub order_id: String,
    pub status: StreamStatus,
    pub executed_qty: f64,
    pub executed_fee: f64,
    pub avg_price: Option<f64>,
    /// Populated when `status` is `Rejected`; carries the venue's reject
    /// reason text (e.g. "post_only_would_cross").
    pub reject_reason: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct LastTradedPrice {
    pub price: f64,
    pub as_of: chrono::DateTime<chrono::Utc>,
}

/// One row of a venue's own order history. Used only as a fallback verifier
/// when the event stream has gone silent for an order the store still needs
/// a fee figure for — `Store::chunk_total_fees` remains the authoritative
/// path in the normal case, since the venue event log already captures
/// every fee-bearing event as it arrives.
#[derive(Debug, Clone)]
pub struct OrderHistoryEntry {
    pub order_id: String,
    pub status: StreamStatus,
    pub executed_qty: f64,
    pub executed_fee: f64,
    pub avg_price: Option<f64>,
}

/// A single venue's trading surface: order placement, amendment,
/// cancellation, historical lookup, and an event stream. Implementors are
/// expected to retry transport-level failures internally and only surface
/// [`HedgeError`] once retries are exhausted.
#[async_trait]
pub trait VenueGateway: Send + Sync {
    fn venue(&self) -> Venue;

    /// Whether this venue supports in-place price amendment, or requires
    /// cancel+replace (Venue-B perpetuals typically do not).
    fn amend_supported(&self) -> bool;

    async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome, HedgeError>;

    async fn amend(&self, request: AmendRequest) -> Result<SubmitOutcome, HedgeError>;

    async fn cancel(&self, order_id: &str) -> Result<CancelOutcome, HedgeError>;

    async fn order_status(&self, order_id: &str) -> Result<VenueStreamEvent, HedgeError>;

    /// REST fallback verifier: the set of order ids this venue currently
    /// considers open for `symbol`. Used only when the stream has gone
    /// quiet, never on the hot confirmation path.
    async fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<String>, HedgeError>;

    /// REST fee-lookup fallback: the venue's own record for one order id,
    /// queried only when the event stream never reported a fee for an
    /// order the reconciler or store needs one for.
    async fn fetch_order_history(&self, order_id: &str) -> Result<Option<OrderHistoryEntry>, HedgeError>;

    async fn last_traded_price(&self, symbol: &str) -> Result<LastTradedPrice, HedgeError>;

    /// Pulls the next batch of stream events observed since the last call.
    /// The event ingestion task polls this on a short interval; a push-based
    /// adapter would buffer internally and drain here.
    async fn poll_events(&self) -> Result<Vec<VenueStreamEvent>, HedgeError>;
}
