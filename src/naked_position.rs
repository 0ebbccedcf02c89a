//! Phase 2 — Naked Position Resolver: closes the side that Phase 1 left
//! unfilled after its counterpart leg already filled. Bounded maker
//! attempts, then an unconditional market order.
//!
//! Spread checking is disabled throughout this module — a naked position
//! is an urgent risk to close, not a profit-seeking trade, so spread
//! sanity no longer gates it.

use crate::config::{Config, SymbolSpec};
use crate::error::HedgeError;
use crate::gateway::{AmendRequest, CancelOutcome, SubmitRequest, VenueGateway};
use crate::store::{LifecycleEvent, OrderUpsert, Store};
use crate::types::{ChunkKey, EventType, OrderSide, OrderStatus, OrderType, Venue};
use tracing::{error, info, warn};

/// Aggressive re-poll count/interval used only for the ambiguous
/// `CancelOutcome::NotFound` case right before the market fallback: the
/// order vanished between our last observation and the cancel call, which
/// usually means it filled and the venue already dropped it from the open
/// set. Ten rounds at 500ms is a tighter, shorter-lived poll than the
/// regular `status_retry_*`/`poll_interval` knobs, reserved for this one
/// spot where going on to fire a market order on top of an already-filled
/// leg would double the position.
const CANCEL_VERIFY_ATTEMPTS: u32 = 10;
const CANCEL_VERIFY_DELAY: std::time::Duration = std::time::Duration::from_millis(500);

/// Resolves the ambiguity left by a cancel call right before the market
/// fallback fires. `Cancelled` means the order was genuinely still resting
/// and is now gone — safe to proceed to the market order. `AlreadyFilled`
/// and `NotFound` both mean a market order fired on top would double the
/// position, so both are verified against the store before anything else
/// happens; `NotFound` gets the aggressive re-poll since, unlike
/// `AlreadyFilled`, the venue gave no direct confirmation that a fill is
/// what happened.
async fn verify_before_market_fallback(
    store: &Store,
    config: &Config,
    key: &ChunkKey,
    outcome: CancelOutcome,
) -> Result<Option<OrderStatus>, HedgeError> {
    match outcome {
        CancelOutcome::Cancelled => Ok(None),
        CancelOutcome::AlreadyFilled => {
            let status = store
                .status(key, config.status_retry_attempts, config.status_retry_delay)
                .await?;
            Ok(Some(status))
        }
        CancelOutcome::NotFound => {
            for attempt in 1..=CANCEL_VERIFY_ATTEMPTS {
                let status = store
                    .status(key, config.status_retry_attempts, config.status_retry_delay)
                    .await?;
                if status.is_terminal() {
                    info!(?key, attempt, ?status, "cancel target not found, confirmed via store");
                    return Ok(Some(status));
                }
                tokio::time::sleep(CANCEL_VERIFY_DELAY).await;
            }
            warn!(
                ?key,
                "cancel target not found and unverified after aggressive re-poll, assuming filled"
            );
            Ok(Some(OrderStatus::Filled))
        }
    }
}

/// Places a fresh maker limit two ticks off the touch, used when the
/// resting order came back REJECTED or CANCELLED. Returns the new order id,
/// or `None` if the submit itself was rejected (the next attempt tries
/// again from the same terminal status).
async fn place_fresh_limit(
    gateway: &dyn VenueGateway,
    store: &Store,
    spec: &SymbolSpec,
    key: &ChunkKey,
    side: OrderSide,
    quantity: f64,
    attempt: u32,
) -> Result<Option<String>, HedgeError> {
    let ltp = gateway.last_traded_price(&spec.symbol).await?.price;
    let price = spec.maker_price_ticks(ltp, side, 2);

    // Venue-B does not support post-only; only Venue-A's maker attempt uses
    // it.
    let submit = gateway
        .submit(SubmitRequest {
            client_tag: format!("{}-{}-{}-naked-{attempt}", key.chunk_group, key.sequence, key.venue),
            symbol: spec.symbol.clone(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            post_only: gateway.venue() == Venue::A,
        })
        .await?;

    if !submit.accepted {
        warn!(?key, attempt, "naked-position fresh limit rejected, retrying next cycle");
        return Ok(None);
    }

    store.upsert_order(&OrderUpsert::new(
        key.clone(),
        side,
        quantity,
        price,
        submit.order_id.clone(),
        OrderStatus::Open,
        OrderType::Limit,
    ))?;
    store.log_lifecycle_event_best_effort(&LifecycleEvent {
        key: key.clone(),
        order_id: Some(submit.order_id.clone()),
        event_type: EventType::Placed,
        details: Some(serde_json::json!({ "naked_attempt": attempt, "price": price, "ticks": 2 })),
    });
    Ok(Some(submit.order_id))
}

/// Re-prices a still-resting OPEN leg to one tick off the touch, amending in
/// place when the venue supports it and cancel+replace otherwise. Returns
/// `Ok(Some(id))` for the (possibly new) resting order id, or `Ok(None)` if
/// the leg turned out to already be filled by the time the cancel landed.
async fn reprice_naked_leg(
    gateway: &dyn VenueGateway,
    store: &Store,
    spec: &SymbolSpec,
    key: &ChunkKey,
    side: OrderSide,
    quantity: f64,
    order_id: &str,
) -> Result<Option<String>, HedgeError> {
    let ltp = gateway.last_traded_price(&spec.symbol).await?.price;
    let price = spec.maker_price_ticks(ltp, side, 1);

    if gateway.amend_supported() {
        let outcome = gateway
            .amend(AmendRequest {
                order_id: order_id.to_string(),
                new_price: price,
            })
            .await?;
        store.upsert_order(&OrderUpsert::new(
            key.clone(),
            side,
            quantity,
            price,
            outcome.order_id.clone(),
            OrderStatus::Open,
            OrderType::Limit,
        ))?;
        store.log_lifecycle_event_best_effort(&LifecycleEvent {
            key: key.clone(),
            order_id: Some(outcome.order_id.clone()),
            event_type: EventType::Modified,
            details: Some(serde_json::json!({ "new_price": price })),
        });
        return Ok(Some(outcome.order_id));
    }

    let cancel_outcome = gateway.cancel(order_id).await?;
    if cancel_outcome == CancelOutcome::AlreadyFilled {
        return Ok(None);
    }

    let resubmit = gateway
        .submit(SubmitRequest {
            client_tag: format!("{}-{}-{}-naked-reprice", key.chunk_group, key.sequence, key.venue),
            symbol: spec.symbol.clone(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            post_only: gateway.venue() == Venue::A,
        })
        .await?;
    if !resubmit.accepted {
        warn!(?key, "naked-position cancel+replace to 1 tick rejected, retrying next cycle");
        return Ok(None);
    }

    store.upsert_order(&OrderUpsert::new(
        key.clone(),
        side,
        quantity,
        price,
        resubmit.order_id.clone(),
        OrderStatus::Open,
        OrderType::Limit,
    ))?;
    store.log_lifecycle_event_best_effort(&LifecycleEvent {
        key: key.clone(),
        order_id: Some(resubmit.order_id.clone()),
        event_type: EventType::Replaced,
        details: Some(serde_json::json!({ "new_price": price })),
    });
    Ok(Some(resubmit.order_id))
}

/// Resolves a naked leg, returning once it fills or erroring with
/// [`HedgeError::NakedPosition`] if the market fallback itself fails to
/// fill within its wait window — at that point manual intervention is
/// expected.
pub async fn resolve_naked_position(
    gateway: &dyn VenueGateway,
    store: &Store,
    config: &Config,
    spec: &SymbolSpec,
    key: &ChunkKey,
    side: OrderSide,
    quantity: f64,
    mut current_order_id: Option<String>,
) -> Result<OrderStatus, HedgeError> {
    let started = std::time::Instant::now();

    for attempt in 1..=config.naked_position_attempts {
        if current_order_id.is_none() {
            current_order_id =
                place_fresh_limit(gateway, store, spec, key, side, quantity, attempt).await?;
            if current_order_id.is_none() {
                continue;
            }
        }

        tokio::time::sleep(config.naked_position_wait).await;

        let status = store
            .status(key, config.status_retry_attempts, config.status_retry_delay)
            .await?;

        match status {
            OrderStatus::Filled => {
                info!(?key, attempt, "naked position resolved, leg filled");
                return Ok(OrderStatus::Filled);
            }
            OrderStatus::Rejected | OrderStatus::Cancelled => {
                info!(?key, attempt, ?status, "naked leg rejected or cancelled, placing fresh limit at 2 ticks");
                current_order_id =
                    place_fresh_limit(gateway, store, spec, key, side, quantity, attempt).await?;
            }
            _ => {
                let order_id = current_order_id.clone().expect("checked above");
                current_order_id =
                    reprice_naked_leg(gateway, store, spec, key, side, quantity, &order_id).await?;
                if current_order_id.is_none() {
                    let status = store
                        .status(key, config.status_retry_attempts, config.status_retry_delay)
                        .await?;
                    if status.is_terminal() {
                        info!(?key, attempt, ?status, "naked leg filled during reprice");
                        return Ok(status);
                    }
                }
            }
        }
    }

    warn!(?key, "maker attempts exhausted, falling back to market order");

    if let Some(order_id) = current_order_id {
        let cancel_outcome = gateway.cancel(&order_id).await?;
        if let Some(status) = verify_before_market_fallback(store, config, key, cancel_outcome).await? {
            return Ok(status);
        }
    }

    let market_submit = gateway
        .submit(SubmitRequest {
            client_tag: format!("{}-{}-{}-market-fallback", key.chunk_group, key.sequence, key.venue),
            symbol: spec.symbol.clone(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            post_only: false,
        })
        .await?;

    // Upsert-then-commit before anything else observes this order id, to
    // avoid the stream ingestion path racing ahead of the store write.
    store.upsert_order(&OrderUpsert::new(
        key.clone(),
        side,
        quantity,
        spec.round_price(gateway.last_traded_price(&spec.symbol).await?.price),
        market_submit.order_id.clone(),
        OrderStatus::Open,
        OrderType::Market,
    ))?;
    store.log_lifecycle_event_best_effort(&LifecycleEvent {
        key: key.clone(),
        order_id: Some(market_submit.order_id.clone()),
        event_type: EventType::MarketFallback,
        details: None,
    });

    let deadline = tokio::time::Instant::now() + config.naked_market_wait;
    while tokio::time::Instant::now() < deadline {
        let status = store
            .status(key, config.status_retry_attempts, config.status_retry_delay)
            .await?;
        if status.is_terminal() {
            info!(?key, ?status, "naked position resolved by market fallback");
            return Ok(status);
        }
        tokio::time::sleep(config.poll_interval).await;
    }

    error!(?key, "market fallback did not fill within wait window");
    Err(HedgeError::NakedPosition {
        symbol: spec.symbol.clone(),
        venue: key.venue,
        quantity,
        elapsed_secs: started.elapsed().as_secs(),
    })
}
