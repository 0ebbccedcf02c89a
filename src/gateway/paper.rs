//! Simulated venue adapter: fills are synthesized rather than sent to a
//! real venue, with injectable latency and rejection behavior so the rest
//! of the pipeline can be exercised in tests and dry-run mode without
//! network access.

use super::{
    AmendRequest, CancelOutcome, LastTradedPrice, OrderHistoryEntry, StreamStatus, SubmitOutcome,
    SubmitRequest, VenueGateway, VenueStreamEvent,
};
use crate::error::HedgeError;
use crate::types::Venue;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct SimulatedOrder {
    status: StreamStatus,
    quantity: f64,
    filled_qty: f64,
    price: f64,
    fee_rate: f64,
    created_at: std::time::Instant,
}

/// Behavior knobs for a [`PaperGateway`], set once at construction.
#[derive(Debug, Clone)]
pub struct PaperBehavior {
    /// Simulated network/matching latency applied to every call.
    pub latency: Duration,
    /// Probability (0.0-1.0) that a post-only submit is rejected.
    pub post_only_reject_probability: f64,
    /// Probability that a resting order fills on the next `poll_events` call.
    pub fill_probability: f64,
    pub maker_fee_rate: f64,
    /// Fixed last-traded-price used for every symbol, for deterministic tests.
    pub last_price: f64,
    /// If nonzero, `order_status` reports "not found" for this long after an
    /// order is created — simulating a venue whose stream has gone quiet, so
    /// the placement engine's hybrid confirmation protocol falls through to
    /// the `fetch_open_orders` REST fallback.
    pub stream_silence: Duration,
}

impl Default for PaperBehavior {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(0),
            post_only_reject_probability: 0.0,
            fill_probability: 1.0,
            maker_fee_rate: 0.0005,
            last_price: 50_000.0,
            stream_silence: Duration::from_millis(0),
        }
    }
}

pub struct PaperGateway {
    venue: Venue,
    behavior: PaperBehavior,
    orders: Mutex<HashMap<String, SimulatedOrder>>,
    next_id: AtomicU64,
}

impl PaperGateway {
    pub fn new(venue: Venue, behavior: PaperBehavior) -> Self {
        Self {
            venue,
            behavior,
            orders: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_order_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("paper-{}-{n}", self.venue.as_str())
    }

    async fn simulate_latency(&self) {
        if !self.behavior.latency.is_zero() {
            tokio::time::sleep(self.behavior.latency).await;
        }
    }
}

#[async_trait]
impl VenueGateway for PaperGateway {
    fn venue(&self) -> Venue {
        self.venue
    }

    fn amend_supported(&self) -> bool {
        matches!(self.venue, Venue::A)
    }

    async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome, HedgeError> {
        self.simulate_latency().await;

        if request.post_only {
            let roll: f64 = rand::thread_rng().gen();
            if roll < self.behavior.post_only_reject_probability {
                let order_id = self.next_order_id();
                return Ok(SubmitOutcome {
                    order_id,
                    accepted: false,
                    reject_reason: Some("post_only_would_cross".to_string()),
                });
            }
        }

        let order_id = self.next_order_id();
        let price = request.price.unwrap_or(self.behavior.last_price);
        self.orders.lock().insert(
            order_id.clone(),
            SimulatedOrder {
                status: StreamStatus::Open,
                quantity: request.quantity,
                filled_qty: 0.0,
                price,
                fee_rate: self.behavior.maker_fee_rate,
                created_at: std::time::Instant::now(),
            },
        );

        Ok(SubmitOutcome {
            order_id,
            accepted: true,
            reject_reason: None,
        })
    }

    async fn amend(&self, request: AmendRequest) -> Result<SubmitOutcome, HedgeError> {
        self.simulate_latency().await;
        let mut orders = self.orders.lock();
        let order = orders
            .get_mut(&request.order_id)
            .ok_or_else(|| HedgeError::Order {
                venue: self.venue,
                operation: "amend".to_string(),
                details: "order not found".to_string(),
                order_id: Some(request.order_id.clone()),
            })?;
        order.price = request.new_price;
        Ok(SubmitOutcome {
            order_id: request.order_id,
            accepted: true,
            reject_reason: None,
        })
    }

    async fn cancel(&self, order_id: &str) -> Result<CancelOutcome, HedgeError> {
        self.simulate_latency().await;
        let mut orders = self.orders.lock();
        match orders.get(order_id).map(|o| o.status) {
            Some(StreamStatus::Filled) => Ok(CancelOutcome::AlreadyFilled),
            Some(_) => {
                orders.remove(order_id);
                Ok(CancelOutcome::Cancelled)
            }
            None => Ok(CancelOutcome::NotFound),
        }
    }

    async fn order_status(&self, order_id: &str) -> Result<VenueStreamEvent, HedgeError> {
        self.simulate_latency().await;
        let orders = self.orders.lock();
        let order = orders.get(order_id).ok_or_else(|| HedgeError::Order {
            venue: self.venue,
            operation: "order_status".to_string(),
            details: "order not found".to_string(),
            order_id: Some(order_id.to_string()),
        })?;
        if !self.behavior.stream_silence.is_zero()
            && order.created_at.elapsed() < self.behavior.stream_silence
        {
            return Err(HedgeError::Order {
                venue: self.venue,
                operation: "order_status".to_string(),
                details: "stream silent".to_string(),
                order_id: Some(order_id.to_string()),
            });
        }
        Ok(to_event(order_id, order))
    }

    async fn fetch_open_orders(&self, _symbol: &str) -> Result<Vec<String>, HedgeError> {
        self.simulate_latency().await;
        let orders = self.orders.lock();
        Ok(orders
            .iter()
            .filter(|(_, o)| matches!(o.status, StreamStatus::Open | StreamStatus::PartiallyFilled))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn fetch_order_history(
        &self,
        order_id: &str,
    ) -> Result<Option<OrderHistoryEntry>, HedgeError> {
        self.simulate_latency().await;
        let orders = self.orders.lock();
        Ok(orders.get(order_id).map(|order| OrderHistoryEntry {
            order_id: order_id.to_string(),
            status: order.status,
            executed_qty: order.filled_qty,
            executed_fee: order.filled_qty * order.fee_rate,
            avg_price: if order.filled_qty > 0.0 {
                Some(order.price)
            } else {
                None
            },
        }))
    }

    async fn last_traded_price(&self, _symbol: &str) -> Result<LastTradedPrice, HedgeError> {
        self.simulate_latency().await;
        Ok(LastTradedPrice {
            price: self.behavior.last_price,
            as_of: Utc::now(),
        })
    }

    async fn poll_events(&self) -> Result<Vec<VenueStreamEvent>, HedgeError> {
        self.simulate_latency().await;
        let mut events = Vec::new();
        let mut orders = self.orders.lock();
        for (order_id, order) in orders.iter_mut() {
            if order.status == StreamStatus::Open {
                let roll: f64 = rand::thread_rng().gen();
                if roll < self.behavior.fill_probability {
                    order.status = StreamStatus::Filled;
                    order.filled_qty = order.quantity;
                    events.push(to_event(order_id, order));
                }
            }
        }
        Ok(events)
    }
}

/// `reject_reason` is always `None` here: `PaperGateway`'s only rejection
/// path is the synchronous one in `submit()`, which returns a `SubmitOutcome`
/// directly and never inserts the order into `self.orders` — so no
/// `SimulatedOrder` this function reads from was ever in a `Rejected` state.
fn to_event(order_id: &str, order: &SimulatedOrder) -> VenueStreamEvent {
    VenueStreamEvent {
        order_id: order_id.to_string(),
        status: order.status,
        executed_qty: order.filled_qty,
        executed_fee: order.filled_qty * order.fee_rate,
        avg_price: if order.filled_qty > 0.0 {
            Some(order.price)
        } else {
            None
        },
        reject_reason: None,
        raw: serde_json::json!({ "simulated": true, "order_id": order_id }),
    }
}
