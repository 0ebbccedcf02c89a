//! Schema DDL, split out from `mod.rs` as its own function separate from
//! the query helpers.

use crate::error::HedgeError;
use rusqlite::Connection;

pub fn create_tables(conn: &Connection) -> Result<(), HedgeError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chunk_group TEXT NOT NULL,
            sequence INTEGER NOT NULL,
            venue TEXT NOT NULL,
            side TEXT NOT NULL,
            quantity REAL NOT NULL,
            price REAL NOT NULL,
            order_id TEXT NOT NULL,
            status TEXT NOT NULL,
            order_type TEXT NOT NULL,
            cumulative_executed_qty REAL NOT NULL DEFAULT 0,
            cumulative_executed_fee REAL NOT NULL DEFAULT 0,
            net_received REAL,
            partial_order_id TEXT,
            partial_filled_qty REAL,
            partial_avg_price REAL,
            partial_fee_base REAL,
            partial_fee_quote REAL,
            is_partial_fill_completion INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            UNIQUE(chunk_group, sequence, venue)
        );

        CREATE TABLE IF NOT EXISTS lifecycle_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chunk_group TEXT NOT NULL,
            sequence INTEGER NOT NULL,
            venue TEXT NOT NULL,
            order_id TEXT,
            event_type TEXT NOT NULL,
            details TEXT,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_lifecycle_log_key
            ON lifecycle_log (chunk_group, sequence, venue);
        CREATE INDEX IF NOT EXISTS idx_lifecycle_log_order_id
            ON lifecycle_log (order_id);

        CREATE TABLE IF NOT EXISTS venue_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            venue TEXT NOT NULL,
            order_id TEXT,
            chunk_group TEXT,
            sequence INTEGER,
            status TEXT,
            executed_qty REAL,
            executed_fee REAL,
            price REAL,
            raw_payload TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_venue_events_order_id
            ON venue_events (order_id);

        CREATE TABLE IF NOT EXISTS reconciliation (
            chunk_group TEXT PRIMARY KEY,
            symbol TEXT NOT NULL,
            total_chunks INTEGER NOT NULL,
            completed_chunks INTEGER NOT NULL DEFAULT 0,
            cumulative_ordered_qty REAL NOT NULL DEFAULT 0,
            cumulative_fee_base REAL NOT NULL DEFAULT 0,
            cumulative_net_received REAL NOT NULL DEFAULT 0,
            topup_order_id TEXT,
            topup_status TEXT,
            notes TEXT
        );
        ",
    )
    .map_err(|e| HedgeError::Store {
        operation: "create_tables".to_string(),
        details: e.to_string(),
    })
}
