//! Typed error taxonomy at the crate boundary.
//!
//! Internal glue (transport plumbing, config parsing) is free to use
//! `anyhow::Result` the way the rest of this codebase's ancestry does;
//! anything that crosses into orchestrator- or CLI-visible code collapses
//! into [`HedgeError`] so callers get one exhaustive type to match on.

use crate::types::Venue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HedgeError {
    #[error("spread violation: {spread:.4}% exceeds maximum {max_spread:.4}%")]
    Spread { spread: f64, max_spread: f64 },

    #[error("order {operation} failed on {venue:?}: {details} (order id: {order_id:?})")]
    Order {
        venue: Venue,
        operation: String,
        details: String,
        order_id: Option<String>,
    },

    #[error(
        "failed to close naked position: {quantity} {symbol} on {venue:?} within {elapsed_secs}s \
         — manual intervention may be required"
    )]
    NakedPosition {
        symbol: String,
        venue: Venue,
        quantity: f64,
        elapsed_secs: u64,
    },

    #[error("price data error from {venue:?}: {issue}")]
    PriceData { venue: Venue, issue: String },

    #[error("validation failed for {field}={value}: {reason}")]
    Validation {
        field: String,
        value: String,
        reason: String,
    },

    #[error("store {operation} failed: {details}")]
    Store { operation: String, details: String },

    #[error(
        "insufficient balance on {venue:?}: required {required:.2} {currency}, available {available:.2} {currency}"
    )]
    InsufficientBalance {
        venue: Venue,
        required: f64,
        available: f64,
        currency: String,
    },
}

impl HedgeError {
    /// Exit code this error should surface as from the CLI driver.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Converts an underlying rusqlite failure into a `Store` error at the
/// persistence boundary.
impl From<rusqlite::Error> for HedgeError {
    fn from(e: rusqlite::Error) -> Self {
        HedgeError::Store {
            operation: "query".to_string(),
            details: e.to_string(),
        }
    }
}
