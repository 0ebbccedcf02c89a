//! Price validation and maker-price derivation.

use crate::config::{Config, SymbolSpec};
use crate::error::HedgeError;
use crate::gateway::VenueGateway;
use crate::types::{OrderSide, Venue};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct ValidatedQuote {
    pub symbol: String,
    pub venue_a_price: f64,
    pub venue_b_price: f64,
    pub spread_percent: f64,
    pub spread_ok: bool,
    pub spread_warning: Option<String>,
}

impl ValidatedQuote {
    pub fn maker_prices(&self, spec: &SymbolSpec) -> (f64, f64) {
        (
            spec.maker_price(self.venue_a_price, OrderSide::Buy),
            spec.maker_price(self.venue_b_price, OrderSide::Sell),
        )
    }
}

/// Computed as `|venue_b - venue_a| / venue_a * 100`.
pub fn calculate_spread_percent(venue_a_price: f64, venue_b_price: f64) -> f64 {
    ((venue_b_price - venue_a_price) / venue_a_price).abs() * 100.0
}

fn validate_freshness(
    venue: Venue,
    as_of: DateTime<Utc>,
    max_age: std::time::Duration,
) -> Result<(), HedgeError> {
    let age = Utc::now().signed_duration_since(as_of);
    if age.num_seconds() < 0 {
        return Ok(());
    }
    if age.to_std().unwrap_or_default() > max_age {
        return Err(HedgeError::PriceData {
            venue,
            issue: format!(
                "price is {}s old, exceeds freshness limit of {}s",
                age.num_seconds(),
                max_age.as_secs()
            ),
        });
    }
    Ok(())
}

fn validate_positive(venue: Venue, price: f64) -> Result<(), HedgeError> {
    if !(price.is_finite() && price > 0.0) {
        return Err(HedgeError::PriceData {
            venue,
            issue: format!("non-positive or non-finite price: {price}"),
        });
    }
    Ok(())
}

/// Fetches and validates both venues' last-traded price for `symbol`.
///
/// Both sides' price data is validated for presence/positivity/freshness,
/// the spread is computed, and the spread is checked but *not* raised on
/// here — callers decide whether a spread violation blocks the trade.
pub async fn get_validated_quote(
    config: &Config,
    venue_a: &dyn VenueGateway,
    venue_b: &dyn VenueGateway,
    symbol: &str,
) -> Result<ValidatedQuote, HedgeError> {
    let a = venue_a.last_traded_price(symbol).await?;
    let b = venue_b.last_traded_price(symbol).await?;

    validate_positive(Venue::A, a.price)?;
    validate_positive(Venue::B, b.price)?;
    validate_freshness(Venue::A, a.as_of, config.price_freshness)?;
    validate_freshness(Venue::B, b.as_of, config.price_freshness)?;

    let spread_percent = calculate_spread_percent(a.price, b.price);

    let spread_warning = if spread_percent > config.spread_sanity_percent {
        Some(format!(
            "spread {spread_percent:.4}% exceeds sanity threshold {:.4}%, check venue connectivity",
            config.spread_sanity_percent
        ))
    } else {
        None
    };

    Ok(ValidatedQuote {
        symbol: symbol.to_string(),
        venue_a_price: a.price,
        venue_b_price: b.price,
        spread_percent,
        spread_ok: spread_percent <= config.max_spread_percent,
        spread_warning,
    })
}

/// Hard spread-limit check. Unlike [`get_validated_quote`], this raises —
/// the Placement Engine calls this where spread enforcement is not disabled
/// (Phase 2's naked-position resolution disables it, since closing an
/// urgent naked leg takes priority over spread sanity).
pub fn enforce_spread_limit(quote: &ValidatedQuote, max_spread: f64) -> Result<(), HedgeError> {
    if quote.spread_percent > max_spread {
        return Err(HedgeError::Spread {
            spread: quote.spread_percent,
            max_spread,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spread_percent_matches_reference_formula() {
        let spread = calculate_spread_percent(50000.0, 50010.0);
        assert!((spread - 0.02).abs() < 1e-9);
    }

    #[test]
    fn enforce_spread_limit_rejects_when_over() {
        let quote = ValidatedQuote {
            symbol: "BTC".to_string(),
            venue_a_price: 50000.0,
            venue_b_price: 50200.0,
            spread_percent: 0.4,
            spread_ok: false,
            spread_warning: None,
        };
        let result = enforce_spread_limit(&quote, 0.2);
        assert!(matches!(result, Err(HedgeError::Spread { .. })));
    }

    #[test]
    fn enforce_spread_limit_passes_when_within_bounds() {
        let quote = ValidatedQuote {
            symbol: "BTC".to_string(),
            venue_a_price: 50000.0,
            venue_b_price: 50005.0,
            spread_percent: 0.01,
            spread_ok: true,
            spread_warning: None,
        };
        assert!(enforce_spread_limit(&quote, 0.2).is_ok());
    }
}
