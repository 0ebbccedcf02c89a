//! Splits a total order quantity into fixed `min_quantity`-sized chunks.
//!
//! Deliberately does **not** pre-inflate the requested quantity to
//! compensate for maker fees up front: every chunk is exactly
//! `spec.min_quantity`, unmodified by fee rate, and the shortfall is
//! reconciled after the fact by a single top-up order (see
//! `fee_reconciler`) rather than baked into the chunk sizes.

use crate::config::SymbolSpec;
use crate::error::HedgeError;

/// The four remainder-dialogue options presented in the CLI surface.
/// `ReEnter` and `Cancel` don't resolve to a quantity on their own — the
/// CLI drives those by re-prompting or aborting; only
/// `AcceptLower`/`AcceptUpper` resolve through [`resolve_remainder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemainderChoice {
    AcceptLower,
    AcceptUpper,
    ReEnter,
    Cancel,
}

impl RemainderChoice {
    pub fn from_menu_choice(choice: u8) -> Option<Self> {
        match choice {
            1 => Some(RemainderChoice::AcceptLower),
            2 => Some(RemainderChoice::AcceptUpper),
            3 => Some(RemainderChoice::ReEnter),
            4 => Some(RemainderChoice::Cancel),
            _ => None,
        }
    }
}

/// Preview of how `total_quantity` divides into `spec.min_quantity`-sized
/// chunks. `lower_total`/`upper_total` are the adjacent multiples of
/// `min_quantity` the remainder dialogue offers; when `has_remainder` is
/// false, `total_quantity` already divides evenly and no dialogue is shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkPreview {
    pub floor_count: i64,
    pub lower_total: f64,
    pub upper_total: f64,
    pub remainder: f64,
    pub has_remainder: bool,
}

/// Computes the chunk preview for `total_quantity` against `spec`.
///
/// A quantity below `min_quantity` is rejected outright as a
/// [`HedgeError::Validation`] before any venue call is made, not as a
/// zero-chunk plan.
pub fn preview_chunks(spec: &SymbolSpec, total_quantity: f64) -> Result<ChunkPreview, HedgeError> {
    if !(total_quantity.is_finite() && total_quantity > 0.0) {
        return Err(HedgeError::Validation {
            field: "total_quantity".to_string(),
            value: total_quantity.to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if total_quantity < spec.min_quantity {
        return Err(HedgeError::Validation {
            field: "total_quantity".to_string(),
            value: total_quantity.to_string(),
            reason: format!(
                "below the minimum order size of {} {}",
                spec.min_quantity, spec.symbol
            ),
        });
    }

    let floor_count = (total_quantity / spec.min_quantity).floor() as i64;
    let lower_total = spec.round_quantity(floor_count as f64 * spec.min_quantity);
    let upper_total = spec.round_quantity((floor_count + 1) as f64 * spec.min_quantity);
    let remainder = spec.round_quantity(total_quantity - lower_total);
    let has_remainder = remainder > f64::EPSILON;

    Ok(ChunkPreview {
        floor_count,
        lower_total,
        upper_total,
        remainder,
        has_remainder,
    })
}

/// Resolves `AcceptLower`/`AcceptUpper` to the quantity they name. Returns
/// `None` for `ReEnter`/`Cancel`, which carry no quantity of their own — the
/// CLI handles those as control flow, not as a resolved total.
pub fn resolve_remainder(preview: &ChunkPreview, choice: RemainderChoice) -> Option<f64> {
    match choice {
        RemainderChoice::AcceptLower => Some(preview.lower_total),
        RemainderChoice::AcceptUpper => Some(preview.upper_total),
        RemainderChoice::ReEnter | RemainderChoice::Cancel => None,
    }
}

/// Splits `total_quantity` into `spec.min_quantity`-sized chunks. The caller
/// (the orchestrator) is expected to have already resolved any remainder via
/// the CLI dialogue, so `total_quantity` here should divide evenly; this is
/// re-validated rather than assumed, since `execute_trade` can in principle
/// be driven by something other than the interactive CLI.
pub fn chunks_for_total(spec: &SymbolSpec, total_quantity: f64) -> Result<Vec<f64>, HedgeError> {
    let preview = preview_chunks(spec, total_quantity)?;
    if preview.has_remainder {
        return Err(HedgeError::Validation {
            field: "total_quantity".to_string(),
            value: total_quantity.to_string(),
            reason: format!(
                "does not divide evenly into {}-sized chunks; {} would remain \
                 (resolve via the remainder dialogue first)",
                spec.min_quantity, preview.remainder
            ),
        });
    }

    Ok(vec![spec.round_quantity(spec.min_quantity); preview.floor_count as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn even_division_produces_no_remainder_and_k_chunks() {
        let spec = btc();
        let preview = preview_chunks(&spec, 0.006).unwrap();
        assert!(!preview.has_remainder);
        assert_eq!(preview.floor_count, 3);

        let chunks = chunks_for_total(&spec, 0.006).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|q| (*q - 0.002).abs() < 1e-12));
    }

    #[test]
    fn quantity_below_minimum_is_a_validation_error() {
        let spec = btc();
        let err = preview_chunks(&spec, 0.001).unwrap_err();
        assert!(matches!(err, HedgeError::Validation { .. }));
    }

    #[test]
    fn remainder_reports_adjacent_multiples() {
        let spec = btc();
        // 0.0035 / 0.002 = 1.75 -> floor 1, lower 0.002, upper 0.004.
        let preview = preview_chunks(&spec, 0.0035).unwrap();
        assert!(preview.has_remainder);
        assert_eq!(preview.floor_count, 1);
        assert!((preview.lower_total - 0.002).abs() < 1e-12);
        assert!((preview.upper_total - 0.004).abs() < 1e-12);
        assert!((preview.remainder - 0.0015).abs() < 1e-12);
    }

    #[test]
    fn accept_lower_and_upper_resolve_to_the_adjacent_multiples() {
        let spec = btc();
        let preview = preview_chunks(&spec, 0.0035).unwrap();
        assert_eq!(
            resolve_remainder(&preview, RemainderChoice::AcceptLower),
            Some(preview.lower_total)
        );
        assert_eq!(
            resolve_remainder(&preview, RemainderChoice::AcceptUpper),
            Some(preview.upper_total)
        );
        assert_eq!(resolve_remainder(&preview, RemainderChoice::ReEnter), None);
        assert_eq!(resolve_remainder(&preview, RemainderChoice::Cancel), None);
    }

    #[test]
    fn chunks_for_total_rejects_an_unresolved_remainder() {
        let spec = btc();
        let result = chunks_for_total(&spec, 0.0035);
        assert!(result.is_err());
    }
}
