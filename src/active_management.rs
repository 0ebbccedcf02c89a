//! Phase 1 — Active Management Loop: every `poll_interval` (1s) both legs
//! are checked for completion so a mid-cycle fill exits promptly; every
//! `modify_interval` (5s) without a fill, a full modification cycle runs:
//! REJECTED legs are replaced, a CANCELLED leg with a surviving OPEN
//! counterpart aborts the trade, and otherwise both legs are re-priced to
//! the latest maker quote after a fresh spread check.
//!
//! Both legs are read and modified together within one cycle — the spread
//! check and re-price apply to the pair, not a single order.

use crate::config::{Config, SymbolSpec};
use crate::error::HedgeError;
use crate::gateway::{AmendRequest, CancelOutcome, SubmitRequest, VenueGateway};
use crate::price_oracle::get_validated_quote;
use crate::store::{LifecycleEvent, OrderUpsert, Store};
use crate::types::{ChunkKey, EventType, OrderSide, OrderStatus, OrderType, Venue};
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of Phase 1 for one chunk's pair.
#[derive(Debug, Clone)]
pub enum Phase1Outcome {
    /// Both legs filled before either needed Phase 2 — a perfect hedge.
    BothFilled,
    /// One leg filled; the other (identified by its current order id) is
    /// handed to the Naked-Position Resolver.
    OneFilled {
        filled: Venue,
        lagging_order_id: String,
    },
}

struct Leg<'a> {
    gateway: &'a dyn VenueGateway,
    key: ChunkKey,
    side: OrderSide,
    order_id: String,
}

/// Re-prices one leg to `new_price`, using amend when the venue supports it
/// and cancel+replace otherwise. Updates the order store and logs the
/// appropriate lifecycle event under the new order id.
async fn reprice_leg(
    leg: &mut Leg<'_>,
    store: &Store,
    spec: &SymbolSpec,
    quantity: f64,
    new_price: f64,
) -> Result<(), HedgeError> {
    if leg.gateway.amend_supported() {
        let outcome = leg
            .gateway
            .amend(AmendRequest {
                order_id: leg.order_id.clone(),
                new_price,
            })
            .await?;
        store.log_lifecycle_event_best_effort(&LifecycleEvent {
            key: leg.key.clone(),
            order_id: Some(outcome.order_id.clone()),
            event_type: EventType::Modified,
            details: Some(serde_json::json!({ "new_price": new_price })),
        });
        leg.order_id = outcome.order_id;
    } else {
        let cancel_outcome = leg.gateway.cancel(&leg.order_id).await?;
        if cancel_outcome == CancelOutcome::AlreadyFilled {
            return Ok(());
        }
        let resubmit = leg
            .gateway
            .submit(SubmitRequest {
                client_tag: format!("{}-{}-{}", leg.key.chunk_group, leg.key.sequence, leg.key.venue),
                symbol: spec.symbol.clone(),
                side: leg.side,
                order_type: OrderType::Limit,
                quantity,
                price: Some(new_price),
                post_only: leg.gateway.venue() == Venue::A,
            })
            .await?;
        store.log_lifecycle_event_best_effort(&LifecycleEvent {
            key: leg.key.clone(),
            order_id: Some(resubmit.order_id.clone()),
            event_type: EventType::Replaced,
            details: Some(serde_json::json!({ "new_price": new_price })),
        });
        leg.order_id = resubmit.order_id;
    }

    store.upsert_order(&OrderUpsert::new(
        leg.key.clone(),
        leg.side,
        quantity,
        new_price,
        leg.order_id.clone(),
        OrderStatus::Open,
        OrderType::Limit,
    ))?;
    Ok(())
}

/// Replaces a REJECTED leg with a fresh limit at the current maker price.
/// Rejected orders are already terminal at the venue, so this is a plain
/// submit, not a cancel+replace.
async fn replace_rejected_leg(
    leg: &mut Leg<'_>,
    store: &Store,
    spec: &SymbolSpec,
    quantity: f64,
) -> Result<(), HedgeError> {
    let ltp = leg.gateway.last_traded_price(&spec.symbol).await?.price;
    let price = spec.maker_price(ltp, leg.side);

    let outcome = leg
        .gateway
        .submit(SubmitRequest {
            client_tag: format!("{}-{}-{}-repl", leg.key.chunk_group, leg.key.sequence, leg.key.venue),
            symbol: spec.symbol.clone(),
            side: leg.side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            post_only: leg.gateway.venue() == Venue::A,
        })
        .await?;

    leg.order_id = outcome.order_id;
    store.upsert_order(&OrderUpsert::new(
        leg.key.clone(),
        leg.side,
        quantity,
        price,
        leg.order_id.clone(),
        OrderStatus::Open,
        OrderType::Limit,
    ))?;
    store.log_lifecycle_event_best_effort(&LifecycleEvent {
        key: leg.key.clone(),
        order_id: Some(leg.order_id.clone()),
        event_type: EventType::Placed,
        details: Some(serde_json::json!({ "replaced_after_rejection": true, "price": price })),
    });
    Ok(())
}

/// Drives the pair through Phase 1 until one of: both fill, one fills (the
/// other hands off to Phase 2), or the pair is aborted (spread violation or
/// an orphaned cancellation) — in which case both legs are left with no
/// resting order before the error propagates.
#[allow(clippy::too_many_arguments)]
pub async fn run_active_management(
    venue_a_gw: &dyn VenueGateway,
    venue_b_gw: &dyn VenueGateway,
    store: &Store,
    config: &Config,
    spec: &SymbolSpec,
    key_a: ChunkKey,
    key_b: ChunkKey,
    quantity: f64,
    order_id_a: String,
    order_id_b: String,
) -> Result<Phase1Outcome, HedgeError> {
    let mut leg_a = Leg {
        gateway: venue_a_gw,
        key: key_a,
        side: OrderSide::Buy,
        order_id: order_id_a,
    };
    let mut leg_b = Leg {
        gateway: venue_b_gw,
        key: key_b,
        side: OrderSide::Sell,
        order_id: order_id_b,
    };

    let mut last_modify = Instant::now();

    loop {
        tokio::time::sleep(config.poll_interval).await;

        let status_a = store
            .status(&leg_a.key, config.status_retry_attempts, config.status_retry_delay)
            .await?;
        let status_b = store
            .status(&leg_b.key, config.status_retry_attempts, config.status_retry_delay)
            .await?;

        // Steps 2-3: completion checks run every poll tick so a mid-cycle
        // fill exits promptly, independent of the modify_interval cadence.
        match (status_a, status_b) {
            (OrderStatus::Filled, OrderStatus::Filled) => {
                info!(?leg_a.key, ?leg_b.key, "both legs filled, perfect hedge");
                return Ok(Phase1Outcome::BothFilled);
            }
            (OrderStatus::Filled, _) => {
                info!(?leg_a.key, "venue A filled first, venue B goes to Phase 2");
                return Ok(Phase1Outcome::OneFilled {
                    filled: Venue::A,
                    lagging_order_id: leg_b.order_id,
                });
            }
            (_, OrderStatus::Filled) => {
                info!(?leg_b.key, "venue B filled first, venue A goes to Phase 2");
                return Ok(Phase1Outcome::OneFilled {
                    filled: Venue::B,
                    lagging_order_id: leg_a.order_id,
                });
            }
            _ => {}
        }

        if last_modify.elapsed() < config.modify_interval {
            continue;
        }
        last_modify = Instant::now();

        // Step 4: replace any REJECTED leg and re-check next cycle rather
        // than also amending this same cycle (the just-replaced leg is not
        // yet priced against a fresh quote).
        let mut replaced_rejection = false;
        if status_a == OrderStatus::Rejected {
            replace_rejected_leg(&mut leg_a, store, spec, quantity).await?;
            replaced_rejection = true;
        }
        if status_b == OrderStatus::Rejected {
            replace_rejected_leg(&mut leg_b, store, spec, quantity).await?;
            replaced_rejection = true;
        }
        if replaced_rejection {
            continue;
        }

        // Step 5: a CANCELLED leg with its counterpart still OPEN/PLACED is
        // naked exposure the engine did not choose — cancel the survivor and
        // abort the whole trade.
        if status_a == OrderStatus::Cancelled && status_b != OrderStatus::Cancelled {
            warn!(?leg_b.key, "venue A leg cancelled unexpectedly, cancelling venue B survivor");
            let _ = leg_b.gateway.cancel(&leg_b.order_id).await;
            return Err(HedgeError::Order {
                venue: Venue::A,
                operation: "modification_cycle".to_string(),
                details: "leg cancelled outside the engine's control; survivor cancelled"
                    .to_string(),
                order_id: Some(leg_a.order_id.clone()),
            });
        }
        if status_b == OrderStatus::Cancelled && status_a != OrderStatus::Cancelled {
            warn!(?leg_a.key, "venue B leg cancelled unexpectedly, cancelling venue A survivor");
            let _ = leg_a.gateway.cancel(&leg_a.order_id).await;
            return Err(HedgeError::Order {
                venue: Venue::B,
                operation: "modification_cycle".to_string(),
                details: "leg cancelled outside the engine's control; survivor cancelled"
                    .to_string(),
                order_id: Some(leg_b.order_id.clone()),
            });
        }
        if status_a == OrderStatus::Cancelled && status_b == OrderStatus::Cancelled {
            return Err(HedgeError::Order {
                venue: Venue::A,
                operation: "modification_cycle".to_string(),
                details: "both legs cancelled".to_string(),
                order_id: Some(leg_a.order_id.clone()),
            });
        }

        // Step 6: refresh quotes, re-check spread, re-price both legs.
        let quote = get_validated_quote(config, venue_a_gw, venue_b_gw, &spec.symbol).await?;
        if quote.spread_percent > config.max_spread_percent {
            warn!(spread = quote.spread_percent, "spread exceeded during modification cycle, cancelling both legs");
            let _ = leg_a.gateway.cancel(&leg_a.order_id).await;
            let _ = leg_b.gateway.cancel(&leg_b.order_id).await;
            return Err(HedgeError::Spread {
                spread: quote.spread_percent,
                max_spread: config.max_spread_percent,
            });
        }

        let (price_a, price_b) = quote.maker_prices(spec);
        reprice_leg(&mut leg_a, store, spec, quantity, price_a).await?;
        reprice_leg(&mut leg_b, store, spec, quantity, price_b).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::paper::{PaperBehavior, PaperGateway};
    use crate::store::{LifecycleEvent, OrderUpsert};
    use crate::types::{OrderType, Venue};

    fn btc() -> SymbolSpec {
        SymbolSpec {
            symbol: "BTC".to_string(),
            venue_a_identifier: "BTCUSDT".to_string(),
            venue_b_identifier: "B-BTC_USDT".to_string(),
            quantity_precision: 6,
            price_precision: 1,
            tick_size: 0.1,
            min_quantity: 0.002,
            venue_a_maker_fee: 0.00065,
            venue_b_maker_fee: 0.0005,
        }
    }

    async fn place_and_seed(gw: &PaperGateway, store: &Store, key: &ChunkKey, side: OrderSide) -> String {
        let outcome = gw
            .submit(crate::gateway::SubmitRequest {
                client_tag: "t".to_string(),
                symbol: "BTC".to_string(),
                side,
                order_type: OrderType::Limit,
                quantity: 0.002,
                price: Some(49999.9),
                post_only: true,
            })
            .await
            .unwrap();
        store
            .upsert_order(&OrderUpsert::new(
                key.clone(),
                side,
                0.002,
                49999.9,
                outcome.order_id.clone(),
                OrderStatus::Open,
                OrderType::Limit,
            ))
            .unwrap();
        outcome.order_id
    }

    #[tokio::test]
    async fn both_fill_before_first_modify_cycle_returns_both_filled() {
        let store = Store::open_in_memory().unwrap();
        let mut config = Config::from_env();
        config.poll_interval = std::time::Duration::from_millis(1);
        config.modify_interval = std::time::Duration::from_secs(60);
        let spec = btc();
        let key_a = ChunkKey::new("group-1", 1, Venue::A);
        let key_b = ChunkKey::new("group-1", 1, Venue::B);

        let gw_a = PaperGateway::new(Venue::A, PaperBehavior { fill_probability: 0.0, ..PaperBehavior::default() });
        let gw_b = PaperGateway::new(Venue::B, PaperBehavior { fill_probability: 0.0, ..PaperBehavior::default() });
        let id_a = place_and_seed(&gw_a, &store, &key_a, OrderSide::Buy).await;
        let id_b = place_and_seed(&gw_b, &store, &key_b, OrderSide::Sell).await;

        for (key, order_id, side) in [(&key_a, &id_a, OrderSide::Buy), (&key_b, &id_b, OrderSide::Sell)] {
            store
                .log_lifecycle_event(&LifecycleEvent {
                    key: key.clone(),
                    order_id: Some(order_id.clone()),
                    event_type: EventType::Filled,
                    details: None,
                })
                .unwrap();
            store
                .upsert_order(&OrderUpsert::new(
                    key.clone(),
                    side,
                    0.002,
                    49999.9,
                    order_id.clone(),
                    OrderStatus::Filled,
                    OrderType::Limit,
                ))
                .unwrap();
        }

        let outcome = run_active_management(
            &gw_a, &gw_b, &store, &config, &spec, key_a, key_b, 0.002, id_a, id_b,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, Phase1Outcome::BothFilled));
    }

    #[tokio::test]
    async fn one_fill_hands_off_lagging_leg_to_phase_two() {
        let store = Store::open_in_memory().unwrap();
        let mut config = Config::from_env();
        config.poll_interval = std::time::Duration::from_millis(1);
        config.modify_interval = std::time::Duration::from_secs(60);
        let spec = btc();
        let key_a = ChunkKey::new("group-1", 1, Venue::A);
        let key_b = ChunkKey::new("group-1", 1, Venue::B);

        let gw_a = PaperGateway::new(Venue::A, PaperBehavior { fill_probability: 0.0, ..PaperBehavior::default() });
        let gw_b = PaperGateway::new(Venue::B, PaperBehavior { fill_probability: 0.0, ..PaperBehavior::default() });
        let id_a = place_and_seed(&gw_a, &store, &key_a, OrderSide::Buy).await;
        let id_b = place_and_seed(&gw_b, &store, &key_b, OrderSide::Sell).await;

        store
            .log_lifecycle_event(&LifecycleEvent {
                key: key_a.clone(),
                order_id: Some(id_a.clone()),
                event_type: EventType::Filled,
                details: None,
            })
            .unwrap();
        store
            .upsert_order(&OrderUpsert::new(
                key_a.clone(),
                OrderSide::Buy,
                0.002,
                49999.9,
                id_a.clone(),
                OrderStatus::Filled,
                OrderType::Limit,
            ))
            .unwrap();

        let outcome = run_active_management(
            &gw_a, &gw_b, &store, &config, &spec, key_a, key_b, 0.002, id_a, id_b.clone(),
        )
        .await
        .unwrap();
        match outcome {
            Phase1Outcome::OneFilled { filled, lagging_order_id } => {
                assert_eq!(filled, Venue::A);
                assert_eq!(lagging_order_id, id_b);
            }
            other => panic!("expected OneFilled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_leg_with_open_survivor_aborts_and_cancels_survivor() {
        let store = Store::open_in_memory().unwrap();
        let mut config = Config::from_env();
        config.poll_interval = std::time::Duration::from_millis(1);
        config.modify_interval = std::time::Duration::from_secs(60);
        let spec = btc();
        let key_a = ChunkKey::new("group-1", 1, Venue::A);
        let key_b = ChunkKey::new("group-1", 1, Venue::B);

        let gw_a = PaperGateway::new(Venue::A, PaperBehavior { fill_probability: 0.0, ..PaperBehavior::default() });
        let gw_b = PaperGateway::new(Venue::B, PaperBehavior { fill_probability: 0.0, ..PaperBehavior::default() });
        let id_a = place_and_seed(&gw_a, &store, &key_a, OrderSide::Buy).await;
        let id_b = place_and_seed(&gw_b, &store, &key_b, OrderSide::Sell).await;

        store
            .log_lifecycle_event(&LifecycleEvent {
                key: key_a.clone(),
                order_id: Some(id_a.clone()),
                event_type: EventType::Cancelled,
                details: None,
            })
            .unwrap();
        store
            .upsert_order(&OrderUpsert::new(
                key_a.clone(),
                OrderSide::Buy,
                0.002,
                49999.9,
                id_a.clone(),
                OrderStatus::Cancelled,
                OrderType::Limit,
            ))
            .unwrap();

        let result = run_active_management(
            &gw_a, &gw_b, &store, &config, &spec, key_a, key_b, 0.002, id_a, id_b.clone(),
        )
        .await;
        assert!(matches!(result, Err(HedgeError::Order { .. })));
        assert_eq!(gw_b.cancel(&id_b).await.unwrap(), crate::gateway::CancelOutcome::NotFound);
    }

    #[tokio::test]
    async fn rejected_leg_is_replaced_with_a_fresh_order_not_treated_as_terminal() {
        let store = Store::open_in_memory().unwrap();
        let spec = btc();
        let key_a = ChunkKey::new("group-1", 1, Venue::A);

        let gw_a = PaperGateway::new(Venue::A, PaperBehavior { fill_probability: 0.0, ..PaperBehavior::default() });
        let id_a = place_and_seed(&gw_a, &store, &key_a, OrderSide::Buy).await;

        let mut leg = Leg {
            gateway: &gw_a,
            key: key_a.clone(),
            side: OrderSide::Buy,
            order_id: id_a.clone(),
        };
        replace_rejected_leg(&mut leg, &store, &spec, 0.002).await.unwrap();

        assert_ne!(leg.order_id, id_a, "rejection must produce a new order id, not reuse the dead one");
        let row = store.get_order_row(&key_a).unwrap().unwrap();
        assert_eq!(row.status, OrderStatus::Open);
        assert_eq!(row.order_id, leg.order_id);
    }
}
