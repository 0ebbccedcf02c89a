//! hedge-engine: delta-neutral hedge execution between a spot venue and a
//! perpetual-futures venue.

mod active_management;
mod chunker;
mod cli;
mod config;
mod error;
mod fee_reconciler;
mod gateway;
mod naked_position;
mod orchestrator;
mod placement;
mod price_oracle;
mod store;
mod types;

use clap::Parser;
use config::Config;
use gateway::paper::{PaperBehavior, PaperGateway};
use gateway::{StreamStatus, VenueGateway, VenueStreamEvent};
use orchestrator::Orchestrator;
use std::sync::Arc;
use store::{LifecycleEvent, OrderUpsert, Store, VenueRawEvent};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use types::{EventType, OrderStatus, Venue};

#[derive(Parser, Debug)]
#[command(name = "hedge-engine", about = "Delta-neutral hedge execution engine")]
struct Cli {
    /// Run against the in-process simulated venues instead of a live venue
    /// integration. Live venue adapters are not shipped in this crate; until
    /// one is wired in, dry-run is the only supported mode.
    #[arg(long, env = "HEDGE_DRY_RUN", default_value_t = true)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "hedge_engine=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Cli::parse();
    let config = Config::from_env();

    let store = match Store::open(&config.db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to open store at {}: {e}", config.db_path);
            std::process::exit(error::HedgeError::Store {
                operation: "open".to_string(),
                details: e.to_string(),
            }
            .exit_code());
        }
    };

    if !args.dry_run {
        eprintln!("live venue adapters are not configured in this build; refusing to trade with real funds");
        std::process::exit(1);
    }

    let venue_a: Arc<dyn VenueGateway> = Arc::new(PaperGateway::new(Venue::A, PaperBehavior::default()));
    let venue_b: Arc<dyn VenueGateway> = Arc::new(PaperGateway::new(Venue::B, PaperBehavior::default()));

    let ingestion_a = spawn_event_ingestion(Arc::clone(&venue_a), store.clone(), config.poll_interval);
    let ingestion_b = spawn_event_ingestion(Arc::clone(&venue_b), store.clone(), config.poll_interval);

    let orchestrator = Orchestrator::new(config.clone(), store.clone(), Arc::clone(&venue_a), Arc::clone(&venue_b));

    let exit_code = cli::run(&orchestrator, &config, venue_a.as_ref(), venue_b.as_ref()).await;

    ingestion_a.abort();
    ingestion_b.abort();

    std::process::exit(exit_code);
}

/// Long-lived task that drains a venue's stream/poll events and writes them
/// into the store: the append-only `venue_events` record first, then the
/// current-state `orders` row and a lifecycle event. Runs independently of
/// any in-flight trade.
fn spawn_event_ingestion(
    gateway: Arc<dyn VenueGateway>,
    store: Store,
    poll_interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(poll_interval).await;
            match gateway.poll_events().await {
                Ok(events) => {
                    for event in events {
                        if let Err(e) = apply_event(&store, gateway.venue(), &event) {
                            warn!(error = %e, venue = %gateway.venue(), "failed to apply venue event");
                        }
                    }
                }
                Err(e) => warn!(error = %e, venue = %gateway.venue(), "event poll failed"),
            }
        }
    })
}

fn apply_event(
    store: &Store,
    venue: Venue,
    event: &VenueStreamEvent,
) -> Result<(), error::HedgeError> {
    let Some(key) = store.find_key_by_order_id(&event.order_id)? else {
        // An event for an order the store hasn't recorded yet (e.g. racing
        // the upsert that follows a submit). Record the raw event anyway so
        // it's not lost; the order row catches up next poll.
        store.record_venue_event(&VenueRawEvent {
            venue,
            order_id: Some(event.order_id.clone()),
            chunk_group: None,
            sequence: None,
            status: Some(format!("{:?}", event.status)),
            executed_qty: Some(event.executed_qty),
            executed_fee: Some(event.executed_fee),
            price: event.avg_price,
            raw_payload: event.raw.clone(),
        })?;
        return Ok(());
    };

    store.record_venue_event(&VenueRawEvent {
        venue,
        order_id: Some(event.order_id.clone()),
        chunk_group: Some(key.chunk_group.clone()),
        sequence: Some(key.sequence),
        status: Some(format!("{:?}", event.status)),
        executed_qty: Some(event.executed_qty),
        executed_fee: Some(event.executed_fee),
        price: event.avg_price,
        raw_payload: event.raw.clone(),
    })?;

    let status = match event.status {
        StreamStatus::Open => OrderStatus::Open,
        StreamStatus::PartiallyFilled => OrderStatus::Open,
        StreamStatus::Filled => OrderStatus::Filled,
        StreamStatus::Cancelled => OrderStatus::Cancelled,
        StreamStatus::Rejected => OrderStatus::Rejected,
    };

    if let Some(mut row) = store.get_order_row(&key)? {
        row.cumulative_executed_qty = event.executed_qty;
        row.cumulative_executed_fee = event.executed_fee;
        store.upsert_order(&OrderUpsert {
            key: key.clone(),
            side: row.side,
            quantity: row.quantity,
            price: event.avg_price.unwrap_or(row.price),
            order_id: event.order_id.clone(),
            status,
            order_type: row.order_type,
            cumulative_executed_qty: event.executed_qty,
            cumulative_executed_fee: event.executed_fee,
            partial: None,
        })?;
    }

    let event_type = match event.status {
        StreamStatus::Filled => EventType::Filled,
        StreamStatus::Cancelled => EventType::Cancelled,
        StreamStatus::Rejected => EventType::Rejected,
        StreamStatus::Open | StreamStatus::PartiallyFilled => EventType::Modified,
    };
    store.log_lifecycle_event_best_effort(&LifecycleEvent {
        key,
        order_id: Some(event.order_id.clone()),
        event_type,
        details: None,
    });

    info!(order_id = %event.order_id, ?status, "applied venue event");
    Ok(())
}
