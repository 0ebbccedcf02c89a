//! Fee Reconciler: closes the base-asset shortfall left by Venue-A's maker
//! fees with a single top-up order at the end of a trade, rather than
//! pre-inflating every chunk's quantity.

use crate::config::SymbolSpec;
use crate::error::HedgeError;
use crate::gateway::{SubmitRequest, VenueGateway};
use crate::store::Store;
use crate::types::{OrderSide, OrderType, TopUpStatus};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    pub shortfall_quantity: f64,
    pub status: TopUpStatus,
    pub topup_order_id: Option<String>,
}

/// Residual notional below which a skipped top-up is truly negligible rather
/// than something an operator should be told about.
const NEGLIGIBLE_RESIDUAL_USD: f64 = 1.0;

/// Tops up the base-asset shortfall for `chunk_group` on Venue-A. Must be
/// called after every chunk in the trade has reached a terminal status.
/// `mid_price` is the latest Venue-A mid, used only to size the
/// operator-facing note when the shortfall is skipped
/// (`residual_usd = shortfall × mid_price`).
pub async fn reconcile_fees(
    venue_a_gw: &dyn VenueGateway,
    store: &Store,
    spec: &SymbolSpec,
    chunk_group: &str,
    mid_price: f64,
) -> Result<ReconciliationOutcome, HedgeError> {
    let record = store
        .get_reconciliation(chunk_group)?
        .ok_or_else(|| HedgeError::Store {
            operation: "reconcile_fees".to_string(),
            details: format!("no reconciliation record for chunk group {chunk_group}"),
        })?;

    let shortfall = spec.round_quantity(record.cumulative_fee_base);

    if shortfall < spec.min_quantity {
        let residual_usd = shortfall * mid_price;
        let note = if residual_usd < NEGLIGIBLE_RESIDUAL_USD {
            "negligible".to_string()
        } else {
            format!(
                "shortfall {shortfall} {} (≈ ${residual_usd:.2}) below minimum order size \
                 {} but not negligible — operator should review",
                spec.symbol, spec.min_quantity
            )
        };
        info!(
            chunk_group,
            shortfall,
            residual_usd,
            min_quantity = spec.min_quantity,
            "fee shortfall below minimum order size, skipping top-up"
        );
        store.finalize_reconciliation(
            chunk_group,
            None,
            TopUpStatus::SkippedBelowMinimum,
            &note,
        )?;
        return Ok(ReconciliationOutcome {
            shortfall_quantity: shortfall,
            status: TopUpStatus::SkippedBelowMinimum,
            topup_order_id: None,
        });
    }

    let submit = venue_a_gw
        .submit(SubmitRequest {
            client_tag: format!("{chunk_group}-fee-topup"),
            symbol: spec.symbol.clone(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: shortfall,
            price: None,
            post_only: false,
        })
        .await?;

    if !submit.accepted {
        warn!(chunk_group, reason = ?submit.reject_reason, "fee top-up order rejected");
        store.finalize_reconciliation(
            chunk_group,
            Some(&submit.order_id),
            TopUpStatus::Failed,
            &format!("rejected: {:?}", submit.reject_reason),
        )?;
        return Ok(ReconciliationOutcome {
            shortfall_quantity: shortfall,
            status: TopUpStatus::Failed,
            topup_order_id: Some(submit.order_id),
        });
    }

    info!(chunk_group, order_id = %submit.order_id, shortfall, "fee top-up order placed");
    store.finalize_reconciliation(
        chunk_group,
        Some(&submit.order_id),
        TopUpStatus::Completed,
        "",
    )?;

    Ok(ReconciliationOutcome {
        shortfall_quantity: shortfall,
        status: TopUpStatus::Completed,
        topup_order_id: Some(submit.order_id),
    })
}
