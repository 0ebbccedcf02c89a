//! Interactive front door: symbol selection, the quantity + remainder
//! dialogue, a spread override confirmation, and the trade summary. Uses
//! `dialoguer` for prompts.

use crate::chunker::{preview_chunks, resolve_remainder, RemainderChoice};
use crate::config::Config;
use crate::error::HedgeError;
use crate::gateway::VenueGateway;
use crate::orchestrator::Orchestrator;
use crate::price_oracle::get_validated_quote;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use tracing::{error, info};

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Runs one interactive trade end to end, returning the process exit code.
/// `venue_a`/`venue_b` must be the same gateway handles `orchestrator` was
/// built with — they're only used here for the pre-trade quote preview.
pub async fn run(
    orchestrator: &Orchestrator,
    config: &Config,
    venue_a: &dyn VenueGateway,
    venue_b: &dyn VenueGateway,
) -> i32 {
    match run_inner(orchestrator, config, venue_a, venue_b).await {
        Ok(()) => EXIT_OK,
        Err(CliError::Interrupted) => {
            info!("interrupted by user");
            EXIT_INTERRUPTED
        }
        Err(CliError::Hedge(e)) => {
            error!(error = %e, "trade failed");
            e.exit_code()
        }
    }
}

enum CliError {
    Interrupted,
    Hedge(crate::error::HedgeError),
}

impl From<crate::error::HedgeError> for CliError {
    fn from(e: crate::error::HedgeError) -> Self {
        CliError::Hedge(e)
    }
}

fn map_dialog_err(e: dialoguer::Error) -> CliError {
    match e {
        dialoguer::Error::IO(io_err) if io_err.kind() == std::io::ErrorKind::Interrupted => {
            CliError::Interrupted
        }
        dialoguer::Error::IO(io_err) => CliError::Hedge(crate::error::HedgeError::Validation {
            field: "stdin".to_string(),
            value: String::new(),
            reason: io_err.to_string(),
        }),
    }
}

async fn run_inner(
    orchestrator: &Orchestrator,
    config: &Config,
    venue_a: &dyn VenueGateway,
    venue_b: &dyn VenueGateway,
) -> Result<(), CliError> {
    let theme = ColorfulTheme::default();

    let symbols = config.supported_symbols();
    let symbol_idx = Select::with_theme(&theme)
        .with_prompt("Select a symbol")
        .items(&symbols)
        .default(0)
        .interact()
        .map_err(map_dialog_err)?;
    let symbol = symbols[symbol_idx].to_string();
    let spec = config
        .symbol(&symbol)
        .expect("selected symbol came from config.supported_symbols()")
        .clone();

    // Quantity + remainder dialogue: re-prompt on a below-minimum quantity
    // or an explicit "re-enter" choice; an explicit "cancel" choice is a
    // user-cancel, not a fatal error (exit 130, matching Ctrl-C).
    let total_quantity = loop {
        let quantity: f64 = Input::with_theme(&theme)
            .with_prompt(format!("Total {symbol} quantity to hedge"))
            .interact_text()
            .map_err(map_dialog_err)?;

        let preview = match preview_chunks(&spec, quantity) {
            Ok(preview) => preview,
            Err(HedgeError::Validation { reason, .. }) => {
                println!("Invalid quantity: {reason}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if !preview.has_remainder {
            break quantity;
        }

        println!(
            "{quantity} {symbol} does not divide evenly into {}-sized chunks \
             ({} would remain).",
            spec.min_quantity, preview.remainder
        );
        let remainder_options = [
            format!("Accept lower: trade {} {symbol} ({} chunks)", preview.lower_total, preview.floor_count),
            format!(
                "Accept upper: trade {} {symbol} ({} chunks)",
                preview.upper_total,
                preview.floor_count + 1
            ),
            "Re-enter the quantity".to_string(),
            "Cancel".to_string(),
        ];
        let remainder_idx = Select::with_theme(&theme)
            .with_prompt("How should the remainder be handled?")
            .items(&remainder_options)
            .default(0)
            .interact()
            .map_err(map_dialog_err)?;
        let choice = RemainderChoice::from_menu_choice(remainder_idx as u8 + 1)
            .expect("Select is bounded to the four listed options");

        match choice {
            RemainderChoice::Cancel => return Err(CliError::Interrupted),
            RemainderChoice::ReEnter => continue,
            RemainderChoice::AcceptLower | RemainderChoice::AcceptUpper => {
                break resolve_remainder(&preview, choice)
                    .expect("AcceptLower/AcceptUpper always resolve to a quantity");
            }
        }
    };

    let quote = get_validated_quote(config, venue_a, venue_b, &symbol).await?;

    println!(
        "Current spread: {:.4}% (max allowed {:.4}%)",
        quote.spread_percent, config.max_spread_percent
    );
    if let Some(warning) = &quote.spread_warning {
        println!("Warning: {warning}");
    }
    if !quote.spread_ok {
        let proceed = Confirm::with_theme(&theme)
            .with_prompt("Spread exceeds the configured maximum — proceed anyway?")
            .default(false)
            .interact()
            .map_err(map_dialog_err)?;
        if !proceed {
            return Ok(());
        }
    }

    let summary = orchestrator.execute_trade(&symbol, total_quantity).await?;

    println!(
        "Trade {} complete: {} chunks, fee top-up: {:?}",
        summary.chunk_group,
        summary.chunks.len(),
        summary.reconciliation.status
    );

    Ok(())
}
