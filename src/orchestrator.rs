//! Trade Orchestrator: drives one trade from validated chunk plan through
//! Phase 1 (the joint modification cycle over both legs), Phase 2
//! (naked-position resolution for whichever leg lags), and fee
//! reconciliation. One orchestrator task runs a trade sequentially, chunk by
//! chunk — it never runs two chunks of the same trade concurrently.

use crate::active_management::{run_active_management, Phase1Outcome};
use crate::chunker::chunks_for_total;
use crate::config::{Config, SymbolSpec};
use crate::error::HedgeError;
use crate::fee_reconciler::{reconcile_fees, ReconciliationOutcome};
use crate::gateway::VenueGateway;
use crate::naked_position::resolve_naked_position;
use crate::placement::place_chunk;
use crate::price_oracle::{enforce_spread_limit, get_validated_quote};
use crate::store::Store;
use crate::types::{ChunkKey, OrderSide, OrderStatus, Venue};
use tracing::{info, warn};
use uuid::Uuid;

pub struct Orchestrator {
    config: Config,
    store: Store,
    venue_a: std::sync::Arc<dyn VenueGateway>,
    venue_b: std::sync::Arc<dyn VenueGateway>,
}

#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub sequence: i64,
    pub venue_a_status: OrderStatus,
    pub venue_b_status: OrderStatus,
}

#[derive(Debug, Clone)]
pub struct TradeSummary {
    pub chunk_group: String,
    pub chunks: Vec<ChunkResult>,
    pub reconciliation: ReconciliationOutcome,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        store: Store,
        venue_a: std::sync::Arc<dyn VenueGateway>,
        venue_b: std::sync::Arc<dyn VenueGateway>,
    ) -> Self {
        Self {
            config,
            store,
            venue_a,
            venue_b,
        }
    }

    /// `total_quantity` must already be resolved to an exact multiple of
    /// the symbol's `min_quantity` — the CLI (or any other driver) is
    /// responsible for running the remainder dialogue first. This is
    /// re-validated, not assumed: [`chunks_for_total`] errors out rather
    /// than silently dropping a remainder.
    pub async fn execute_trade(
        &self,
        symbol: &str,
        total_quantity: f64,
    ) -> Result<TradeSummary, HedgeError> {
        let spec = self
            .config
            .symbol(symbol)
            .ok_or_else(|| HedgeError::Validation {
                field: "symbol".to_string(),
                value: symbol.to_string(),
                reason: "not a configured trading symbol".to_string(),
            })?
            .clone();

        let quote = get_validated_quote(
            &self.config,
            self.venue_a.as_ref(),
            self.venue_b.as_ref(),
            symbol,
        )
        .await?;
        if let Some(warning) = &quote.spread_warning {
            warn!(symbol, warning, "spread sanity warning");
        }
        enforce_spread_limit(&quote, self.config.max_spread_percent)?;

        let chunk_quantities = chunks_for_total(&spec, total_quantity)?;

        let chunk_group = Uuid::new_v4().to_string();
        self.store
            .init_reconciliation(&chunk_group, symbol, chunk_quantities.len() as i64)?;

        info!(
            chunk_group,
            symbol,
            chunk_count = chunk_quantities.len(),
            "starting trade"
        );

        let mut results = Vec::with_capacity(chunk_quantities.len());
        for (idx, quantity) in chunk_quantities.iter().enumerate() {
            let sequence = idx as i64 + 1;
            let result = self
                .run_chunk(&chunk_group, sequence, &spec, *quantity)
                .await?;
            results.push(result);
        }

        let final_quote = get_validated_quote(
            &self.config,
            self.venue_a.as_ref(),
            self.venue_b.as_ref(),
            symbol,
        )
        .await?;
        let reconciliation = reconcile_fees(
            self.venue_a.as_ref(),
            &self.store,
            &spec,
            &chunk_group,
            final_quote.venue_a_price,
        )
        .await?;

        Ok(TradeSummary {
            chunk_group,
            chunks: results,
            reconciliation,
        })
    }

    async fn run_chunk(
        &self,
        chunk_group: &str,
        sequence: i64,
        spec: &crate::config::SymbolSpec,
        quantity: f64,
    ) -> Result<ChunkResult, HedgeError> {
        let key_a = ChunkKey::new(chunk_group, sequence, Venue::A);
        let key_b = ChunkKey::new(chunk_group, sequence, Venue::B);

        let placed = place_chunk(
            self.venue_a.as_ref(),
            self.venue_b.as_ref(),
            &self.store,
            &self.config,
            spec,
            chunk_group,
            sequence,
            quantity,
        )
        .await?;

        let phase1 = run_active_management(
            self.venue_a.as_ref(),
            self.venue_b.as_ref(),
            &self.store,
            &self.config,
            spec,
            key_a.clone(),
            key_b.clone(),
            quantity,
            placed.venue_a.order_id.clone(),
            placed.venue_b.order_id.clone(),
        )
        .await?;

        let (venue_a_status, venue_b_status) = match phase1 {
            Phase1Outcome::BothFilled => (OrderStatus::Filled, OrderStatus::Filled),
            Phase1Outcome::OneFilled {
                filled: Venue::A,
                lagging_order_id,
            } => {
                info!(?key_a, "venue A leg filled first, resolving venue B as naked");
                let b_status = resolve_naked_position(
                    self.venue_b.as_ref(),
                    &self.store,
                    &self.config,
                    spec,
                    &key_b,
                    OrderSide::Sell,
                    quantity,
                    Some(lagging_order_id),
                )
                .await?;
                (OrderStatus::Filled, b_status)
            }
            Phase1Outcome::OneFilled {
                filled: Venue::B,
                lagging_order_id,
            } => {
                info!(?key_b, "venue B leg filled first, resolving venue A as naked");
                let a_status = resolve_naked_position(
                    self.venue_a.as_ref(),
                    &self.store,
                    &self.config,
                    spec,
                    &key_a,
                    OrderSide::Buy,
                    quantity,
                    Some(lagging_order_id),
                )
                .await?;
                (a_status, OrderStatus::Filled)
            }
        };

        let (fee_base, _, _) = self.store.chunk_total_fees(&key_a)?;
        let (_, fee_quote, _) = self.store.chunk_total_fees(&key_b)?;
        let net_received = quantity - fee_base;
        self.store
            .accumulate_reconciliation(chunk_group, quantity, fee_base, net_received)?;
        let _ = fee_quote;

        Ok(ChunkResult {
            sequence,
            venue_a_status,
            venue_b_status,
        })
    }
}
