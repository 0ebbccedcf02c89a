//! Order Store + Event Log + Reconciliation table.
//!
//! A single `rusqlite` connection behind `Arc<Mutex<Connection>>`: one
//! struct, one connection, `CREATE TABLE IF NOT EXISTS` run once in `open`.
//! The three logical tables (current-state `orders`, append-only
//! `lifecycle_log`, per-venue `venue_events`) plus the `reconciliation`
//! table all live in the same file.

mod schema;

use crate::error::HedgeError;
use crate::types::{ChunkKey, EventType, OrderSide, OrderStatus, OrderType, TopUpStatus, Venue};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub chunk_group: String,
    pub sequence: i64,
    pub venue: Venue,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub order_id: String,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub cumulative_executed_qty: f64,
    pub cumulative_executed_fee: f64,
    pub net_received: Option<f64>,
    pub partial_order_id: Option<String>,
    pub partial_filled_qty: Option<f64>,
    pub partial_avg_price: Option<f64>,
    pub partial_fee_base: Option<f64>,
    pub partial_fee_quote: Option<f64>,
    pub is_partial_fill_completion: bool,
}

/// Upsert payload. On conflict with an existing `(chunk_group, sequence,
/// venue)` row, `order_id`, `price`, `quantity`, `status`, `order_type` are
/// always replaced; partial-completion fields are preserved unless this
/// payload explicitly sets them (`is_partial_fill_completion = true`).
#[derive(Debug, Clone)]
pub struct OrderUpsert {
    pub key: ChunkKey,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub order_id: String,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub cumulative_executed_qty: f64,
    pub cumulative_executed_fee: f64,
    pub partial: Option<PartialCompletion>,
}

#[derive(Debug, Clone)]
pub struct PartialCompletion {
    pub partial_order_id: String,
    pub partial_filled_qty: f64,
    pub partial_avg_price: f64,
    pub partial_fee_base: f64,
    pub partial_fee_quote: f64,
}

impl OrderUpsert {
    pub fn new(
        key: ChunkKey,
        side: OrderSide,
        quantity: f64,
        price: f64,
        order_id: impl Into<String>,
        status: OrderStatus,
        order_type: OrderType,
    ) -> Self {
        Self {
            key,
            side,
            quantity,
            price,
            order_id: order_id.into(),
            status,
            order_type,
            cumulative_executed_qty: 0.0,
            cumulative_executed_fee: 0.0,
            partial: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub key: ChunkKey,
    pub order_id: Option<String>,
    pub event_type: EventType,
    pub details: Option<serde_json::Value>,
}

/// A raw event off a venue's stream, recorded verbatim plus parsed fields.
/// The write path for this must stay cheap — it runs on the event ingestion
/// task and must never block behind business logic.
#[derive(Debug, Clone)]
pub struct VenueRawEvent {
    pub venue: Venue,
    pub order_id: Option<String>,
    pub chunk_group: Option<String>,
    pub sequence: Option<i64>,
    pub status: Option<String>,
    pub executed_qty: Option<f64>,
    pub executed_fee: Option<f64>,
    pub price: Option<f64>,
    pub raw_payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ReconciliationRecord {
    pub chunk_group: String,
    pub symbol: String,
    pub total_chunks: i64,
    pub completed_chunks: i64,
    pub cumulative_ordered_qty: f64,
    pub cumulative_fee_base: f64,
    pub cumulative_net_received: f64,
    pub topup_order_id: Option<String>,
    pub topup_status: Option<TopUpStatus>,
    pub notes: Option<String>,
}

pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

impl Store {
    /// Opens (creating if necessary) the backing database, runs schema
    /// migrations, and truncates the `orders` table — the orders table does
    /// not survive a process restart, the event log does.
    pub fn open(path: &str) -> Result<Self, HedgeError> {
        let conn = Connection::open(path).map_err(|e| HedgeError::Store {
            operation: "open".to_string(),
            details: e.to_string(),
        })?;
        schema::create_tables(&conn)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.reset_orders_table()?;
        Ok(store)
    }

    /// In-memory store, for tests.
    pub fn open_in_memory() -> Result<Self, HedgeError> {
        let conn = Connection::open_in_memory().map_err(|e| HedgeError::Store {
            operation: "open".to_string(),
            details: e.to_string(),
        })?;
        schema::create_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn reset_orders_table(&self) -> Result<(), HedgeError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM orders", [])?;
        Ok(())
    }

    pub fn upsert_order(&self, upsert: &OrderUpsert) -> Result<(), HedgeError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        let net_received = Some(upsert.cumulative_executed_qty - upsert.cumulative_executed_fee);

        let (partial_order_id, partial_filled_qty, partial_avg_price, partial_fee_base, partial_fee_quote, is_partial): (
            Option<String>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            bool,
        ) = match &upsert.partial {
            Some(p) => (
                Some(p.partial_order_id.clone()),
                Some(p.partial_filled_qty),
                Some(p.partial_avg_price),
                Some(p.partial_fee_base),
                Some(p.partial_fee_quote),
                true,
            ),
            None => (None, None, None, None, None, false),
        };

        conn.execute(
            "INSERT INTO orders (
                chunk_group, sequence, venue, side, quantity, price, order_id,
                status, order_type, cumulative_executed_qty, cumulative_executed_fee,
                net_received, partial_order_id, partial_filled_qty, partial_avg_price,
                partial_fee_base, partial_fee_quote, is_partial_fill_completion,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19)
            ON CONFLICT(chunk_group, sequence, venue) DO UPDATE SET
                order_id = excluded.order_id,
                price = excluded.price,
                quantity = excluded.quantity,
                status = excluded.status,
                order_type = excluded.order_type,
                cumulative_executed_qty = excluded.cumulative_executed_qty,
                cumulative_executed_fee = excluded.cumulative_executed_fee,
                net_received = excluded.net_received,
                partial_order_id = CASE WHEN excluded.is_partial_fill_completion = 1
                    THEN excluded.partial_order_id ELSE orders.partial_order_id END,
                partial_filled_qty = CASE WHEN excluded.is_partial_fill_completion = 1
                    THEN excluded.partial_filled_qty ELSE orders.partial_filled_qty END,
                partial_avg_price = CASE WHEN excluded.is_partial_fill_completion = 1
                    THEN excluded.partial_avg_price ELSE orders.partial_avg_price END,
                partial_fee_base = CASE WHEN excluded.is_partial_fill_completion = 1
                    THEN excluded.partial_fee_base ELSE orders.partial_fee_base END,
                partial_fee_quote = CASE WHEN excluded.is_partial_fill_completion = 1
                    THEN excluded.partial_fee_quote ELSE orders.partial_fee_quote END,
                is_partial_fill_completion = excluded.is_partial_fill_completion OR orders.is_partial_fill_completion,
                updated_at = excluded.updated_at",
            params![
                upsert.key.chunk_group,
                upsert.key.sequence,
                upsert.key.venue.as_str(),
                upsert.side.as_str(),
                upsert.quantity,
                upsert.price,
                upsert.order_id,
                upsert.status.as_str(),
                upsert.order_type.as_str(),
                upsert.cumulative_executed_qty,
                upsert.cumulative_executed_fee,
                net_received,
                partial_order_id,
                partial_filled_qty,
                partial_avg_price,
                partial_fee_base,
                partial_fee_quote,
                is_partial,
                now,
            ],
        )?;
        Ok(())
    }

    /// Resolves a venue order id back to its business key. Used by the event
    /// ingestion task, which only learns an order's id and status from the
    /// venue's stream, not its `(chunk_group, sequence)`.
    pub fn find_key_by_order_id(&self, order_id: &str) -> Result<Option<ChunkKey>, HedgeError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT chunk_group, sequence, venue FROM orders
                 WHERE order_id = ?1 OR partial_order_id = ?1
                 ORDER BY id DESC LIMIT 1",
                params![order_id],
                |r| {
                    let venue: String = r.get(2)?;
                    Ok(ChunkKey {
                        chunk_group: r.get(0)?,
                        sequence: r.get(1)?,
                        venue: if venue == "venue_a" { Venue::A } else { Venue::B },
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_order_row(&self, key: &ChunkKey) -> Result<Option<OrderRow>, HedgeError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT side, quantity, price, order_id, status, order_type,
                        cumulative_executed_qty, cumulative_executed_fee, net_received,
                        partial_order_id, partial_filled_qty, partial_avg_price,
                        partial_fee_base, partial_fee_quote, is_partial_fill_completion
                 FROM orders WHERE chunk_group = ?1 AND sequence = ?2 AND venue = ?3",
                params![key.chunk_group, key.sequence, key.venue.as_str()],
                |r| {
                    let side: String = r.get(0)?;
                    let status: String = r.get(4)?;
                    let order_type: String = r.get(5)?;
                    Ok(OrderRow {
                        chunk_group: key.chunk_group.clone(),
                        sequence: key.sequence,
                        venue: key.venue,
                        side: if side == "buy" {
                            OrderSide::Buy
                        } else {
                            OrderSide::Sell
                        },
                        quantity: r.get(1)?,
                        price: r.get(2)?,
                        order_id: r.get(3)?,
                        status: OrderStatus::parse(&status).unwrap_or(OrderStatus::Placed),
                        order_type: if order_type == "limit" {
                            OrderType::Limit
                        } else {
                            OrderType::Market
                        },
                        cumulative_executed_qty: r.get(6)?,
                        cumulative_executed_fee: r.get(7)?,
                        net_received: r.get(8)?,
                        partial_order_id: r.get(9)?,
                        partial_filled_qty: r.get(10)?,
                        partial_avg_price: r.get(11)?,
                        partial_fee_base: r.get(12)?,
                        partial_fee_quote: r.get(13)?,
                        is_partial_fill_completion: r.get::<_, i64>(14)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn log_lifecycle_event(&self, event: &LifecycleEvent) -> Result<(), HedgeError> {
        let conn = self.conn.lock();
        let details = event
            .details
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        conn.execute(
            "INSERT INTO lifecycle_log (chunk_group, sequence, venue, order_id, event_type, details, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.key.chunk_group,
                event.key.sequence,
                event.key.venue.as_str(),
                event.order_id,
                event.event_type.as_str(),
                details,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Best-effort lifecycle logging: a lifecycle-log write failure must
    /// never block a trade. Callers on the hot path should use this instead
    /// of `log_lifecycle_event` directly.
    pub fn log_lifecycle_event_best_effort(&self, event: &LifecycleEvent) {
        if let Err(e) = self.log_lifecycle_event(event) {
            warn!(error = %e, "failed to write lifecycle event, continuing");
        }
    }

    fn latest_event_type(&self, key: &ChunkKey) -> Result<Option<EventType>, HedgeError> {
        let conn = self.conn.lock();
        let event_type: Option<String> = conn
            .query_row(
                "SELECT event_type FROM lifecycle_log
                 WHERE chunk_group = ?1 AND sequence = ?2 AND venue = ?3
                 ORDER BY id DESC LIMIT 1",
                params![key.chunk_group, key.sequence, key.venue.as_str()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(event_type.and_then(|s| EventType::parse(&s)))
    }

    /// Dual-source order status verification.
    ///
    /// Reads the current-state row and cross-checks it against the
    /// lifecycle log, treating the log as authoritative for FILLED
    /// disambiguation. Retries cover the stream handler's
    /// UPDATE-after-INSERT race window; never falls back to a venue REST
    /// call — the store is the single source of truth for status.
    pub async fn status(
        &self,
        key: &ChunkKey,
        retry_attempts: u32,
        retry_delay: Duration,
    ) -> Result<OrderStatus, HedgeError> {
        for attempt in 0..=retry_attempts {
            let row = self.get_order_row(key)?;
            let log_event = self.latest_event_type(key)?;

            match (&row, log_event) {
                (Some(r), Some(EventType::Filled)) if r.status.is_terminal() => {
                    return Ok(r.status);
                }
                (Some(r), Some(EventType::Filled)) if !r.status.is_terminal() => {
                    if attempt == retry_attempts {
                        debug!(?key, "row lags lifecycle log, trusting log (FILLED)");
                        return Ok(OrderStatus::Filled);
                    }
                }
                (Some(r), _) if r.status.is_terminal() => return Ok(r.status),
                (Some(r), _) => {
                    if attempt == retry_attempts {
                        return Ok(r.status);
                    }
                }
                (None, Some(EventType::Filled)) => {
                    // Load-bearing: prevents a duplicate market order after a
                    // fill completes before the row is written.
                    return Ok(OrderStatus::Filled);
                }
                (None, Some(_)) => {
                    if attempt == retry_attempts {
                        return Err(HedgeError::Store {
                            operation: "status".to_string(),
                            details: format!("order_missing_from_orders_table: {key:?}"),
                        });
                    }
                }
                (None, None) => {
                    if attempt == retry_attempts {
                        return Err(HedgeError::Store {
                            operation: "status".to_string(),
                            details: format!("no row and no lifecycle event for {key:?}"),
                        });
                    }
                }
            }

            tokio::time::sleep(retry_delay).await;
        }

        unreachable!("loop always returns or errors on the final attempt")
    }

    /// Synchronous, business-logic-free write to the per-venue event table.
    /// This is the event ingestion task's hot path; it must succeed or
    /// surface an error immediately, independent of any status-update side
    /// effects the caller performs afterward.
    pub fn record_venue_event(&self, event: &VenueRawEvent) -> Result<(), HedgeError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO venue_events (venue, order_id, chunk_group, sequence, status,
                executed_qty, executed_fee, price, raw_payload, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.venue.as_str(),
                event.order_id,
                event.chunk_group,
                event.sequence,
                event.status,
                event.executed_qty,
                event.executed_fee,
                event.price,
                event.raw_payload.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Sums fee for a chunk across a possible partial-fill + completion
    /// pair. Returns `(fee_in_base, fee_in_quote, is_partial_completion)`.
    pub fn chunk_total_fees(&self, key: &ChunkKey) -> Result<(f64, f64, bool), HedgeError> {
        let row = self.get_order_row(key)?;
        let Some(row) = row else {
            return Ok((0.0, 0.0, false));
        };

        let partial_base = row.partial_fee_base.unwrap_or(0.0);
        let partial_quote = row.partial_fee_quote.unwrap_or(0.0);

        let (fee_base, fee_quote) = match key.venue {
            Venue::A => (row.cumulative_executed_fee + partial_base, 0.0),
            Venue::B => (0.0, row.cumulative_executed_fee + partial_quote),
        };

        Ok((fee_base, fee_quote, row.is_partial_fill_completion))
    }

    pub fn init_reconciliation(
        &self,
        chunk_group: &str,
        symbol: &str,
        total_chunks: i64,
    ) -> Result<(), HedgeError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO reconciliation (chunk_group, symbol, total_chunks)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(chunk_group) DO NOTHING",
            params![chunk_group, symbol, total_chunks],
        )?;
        Ok(())
    }

    pub fn accumulate_reconciliation(
        &self,
        chunk_group: &str,
        ordered_qty: f64,
        fee_base: f64,
        net_received: f64,
    ) -> Result<(), HedgeError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE reconciliation SET
                completed_chunks = completed_chunks + 1,
                cumulative_ordered_qty = cumulative_ordered_qty + ?2,
                cumulative_fee_base = cumulative_fee_base + ?3,
                cumulative_net_received = cumulative_net_received + ?4
             WHERE chunk_group = ?1",
            params![chunk_group, ordered_qty, fee_base, net_received],
        )?;
        Ok(())
    }

    pub fn get_reconciliation(
        &self,
        chunk_group: &str,
    ) -> Result<Option<ReconciliationRecord>, HedgeError> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT symbol, total_chunks, completed_chunks, cumulative_ordered_qty,
                        cumulative_fee_base, cumulative_net_received, topup_order_id,
                        topup_status, notes
                 FROM reconciliation WHERE chunk_group = ?1",
                params![chunk_group],
                |r| {
                    let topup_status: Option<String> = r.get(7)?;
                    Ok(ReconciliationRecord {
                        chunk_group: chunk_group.to_string(),
                        symbol: r.get(0)?,
                        total_chunks: r.get(1)?,
                        completed_chunks: r.get(2)?,
                        cumulative_ordered_qty: r.get(3)?,
                        cumulative_fee_base: r.get(4)?,
                        cumulative_net_received: r.get(5)?,
                        topup_order_id: r.get(6)?,
                        topup_status: topup_status.and_then(|s| match s.as_str() {
                            "COMPLETED" => Some(TopUpStatus::Completed),
                            "SKIPPED_BELOW_MINIMUM" => Some(TopUpStatus::SkippedBelowMinimum),
                            "FAILED" => Some(TopUpStatus::Failed),
                            _ => None,
                        }),
                        notes: r.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn finalize_reconciliation(
        &self,
        chunk_group: &str,
        topup_order_id: Option<&str>,
        status: TopUpStatus,
        notes: &str,
    ) -> Result<(), HedgeError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE reconciliation SET topup_order_id = ?2, topup_status = ?3, notes = ?4
             WHERE chunk_group = ?1",
            params![chunk_group, topup_order_id, status.as_str(), notes],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Venue;

    fn key() -> ChunkKey {
        ChunkKey::new("group-1", 1, Venue::A)
    }

    #[tokio::test]
    async fn upsert_then_read_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let upsert = OrderUpsert::new(
            key(),
            OrderSide::Buy,
            0.002,
            50000.0,
            "order-abc",
            OrderStatus::Placed,
            OrderType::Limit,
        );
        store.upsert_order(&upsert).unwrap();

        let row = store.get_order_row(&key()).unwrap().unwrap();
        assert_eq!(row.order_id, "order-abc");
        assert_eq!(row.status, OrderStatus::Placed);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_key() {
        let store = Store::open_in_memory().unwrap();
        let mut upsert = OrderUpsert::new(
            key(),
            OrderSide::Buy,
            0.002,
            50000.0,
            "order-abc",
            OrderStatus::Placed,
            OrderType::Limit,
        );
        store.upsert_order(&upsert).unwrap();
        upsert.order_id = "order-replacement".to_string();
        upsert.status = OrderStatus::Open;
        store.upsert_order(&upsert).unwrap();

        let row = store.get_order_row(&key()).unwrap().unwrap();
        assert_eq!(row.order_id, "order-replacement");
        assert_eq!(row.status, OrderStatus::Open);
    }

    #[tokio::test]
    async fn status_trusts_lifecycle_log_when_row_lags() {
        let store = Store::open_in_memory().unwrap();
        let upsert = OrderUpsert::new(
            key(),
            OrderSide::Buy,
            0.002,
            50000.0,
            "order-abc",
            OrderStatus::Open,
            OrderType::Limit,
        );
        store.upsert_order(&upsert).unwrap();
        store
            .log_lifecycle_event(&LifecycleEvent {
                key: key(),
                order_id: Some("order-abc".to_string()),
                event_type: EventType::Filled,
                details: None,
            })
            .unwrap();

        let status = store
            .status(&key(), 1, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn status_returns_filled_when_row_absent_but_log_says_filled() {
        let store = Store::open_in_memory().unwrap();
        store
            .log_lifecycle_event(&LifecycleEvent {
                key: key(),
                order_id: Some("market-order-1".to_string()),
                event_type: EventType::Filled,
                details: None,
            })
            .unwrap();

        let status = store
            .status(&key(), 2, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn status_errors_when_row_absent_and_log_only_placed() {
        let store = Store::open_in_memory().unwrap();
        store
            .log_lifecycle_event(&LifecycleEvent {
                key: key(),
                order_id: Some("order-abc".to_string()),
                event_type: EventType::Placed,
                details: None,
            })
            .unwrap();

        let result = store.status(&key(), 1, Duration::from_millis(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn chunk_total_fees_sums_partial_and_completion() {
        let store = Store::open_in_memory().unwrap();
        let mut upsert = OrderUpsert::new(
            key(),
            OrderSide::Buy,
            0.002,
            50000.0,
            "completion-order",
            OrderStatus::Filled,
            OrderType::Market,
        );
        upsert.cumulative_executed_fee = 0.0000003;
        upsert.partial = Some(PartialCompletion {
            partial_order_id: "partial-order".to_string(),
            partial_filled_qty: 0.0006,
            partial_avg_price: 50000.0,
            partial_fee_base: 0.0000004,
            partial_fee_quote: 0.0,
        });
        store.upsert_order(&upsert).unwrap();

        let (fee_base, fee_quote, is_partial) = store.chunk_total_fees(&key()).unwrap();
        assert!(is_partial);
        assert_eq!(fee_quote, 0.0);
        assert!((fee_base - 0.0000007).abs() < 1e-12);
    }

    #[tokio::test]
    async fn reconciliation_accumulates_across_chunks() {
        let store = Store::open_in_memory().unwrap();
        store.init_reconciliation("group-1", "BTC", 3).unwrap();
        for _ in 0..3 {
            store
                .accumulate_reconciliation("group-1", 0.002, 0.0000013, 0.0019987)
                .unwrap();
        }

        let record = store.get_reconciliation("group-1").unwrap().unwrap();
        assert_eq!(record.completed_chunks, 3);
        assert_eq!(record.total_chunks, 3);
        assert!((record.cumulative_fee_base - 0.0000039).abs() < 1e-9);
    }

    #[tokio::test]
    async fn find_key_by_order_id_resolves_back_to_chunk_key() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_order(&OrderUpsert::new(
                key(),
                OrderSide::Buy,
                0.002,
                50000.0,
                "order-abc",
                OrderStatus::Open,
                OrderType::Limit,
            ))
            .unwrap();

        let found = store.find_key_by_order_id("order-abc").unwrap().unwrap();
        assert_eq!(found, key());
        assert!(store.find_key_by_order_id("nonexistent").unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_orders_table_preserves_lifecycle_log() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_order(&OrderUpsert::new(
            key(),
            OrderSide::Buy,
            0.002,
            50000.0,
            "order-abc",
            OrderStatus::Placed,
            OrderType::Limit,
        )).unwrap();
        store
            .log_lifecycle_event(&LifecycleEvent {
                key: key(),
                order_id: Some("order-abc".to_string()),
                event_type: EventType::Placed,
                details: None,
            })
            .unwrap();

        store.reset_orders_table().unwrap();

        assert!(store.get_order_row(&key()).unwrap().is_none());
        assert_eq!(store.latest_event_type(&key()).unwrap(), Some(EventType::Placed));
    }
}
