//! Layered configuration loading: `dotenv::dotenv().ok()` once, then each
//! field read from `std::env::var` with a typed fallback to a documented
//! default.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Static per-asset trading parameters. Quantity precision may be
/// overridden at startup by a live precision fetch — see
/// [`SymbolSpec::quantity_precision`] callers in `chunker.rs`, which always
/// read through this struct rather than caching the value themselves.
#[derive(Debug, Clone)]
pub struct SymbolSpec {
    pub symbol: String,
    pub venue_a_identifier: String,
    pub venue_b_identifier: String,
    pub quantity_precision: u32,
    pub price_precision: u32,
    pub tick_size: f64,
    pub min_quantity: f64,
    pub venue_a_maker_fee: f64,
    pub venue_b_maker_fee: f64,
}

impl SymbolSpec {
    pub fn round_quantity(&self, qty: f64) -> f64 {
        round_to(qty, self.quantity_precision)
    }

    pub fn round_price(&self, price: f64) -> f64 {
        round_to(price, self.price_precision)
    }

    /// Maker price: one tick inside the spread on the appropriate side.
    pub fn maker_price(&self, current_price: f64, side: crate::types::OrderSide) -> f64 {
        self.maker_price_ticks(current_price, side, 1)
    }

    /// Maker price at an arbitrary tick offset (used by the post-only retry
    /// ladder and Phase 2's safer 2-tick pricing).
    pub fn maker_price_ticks(
        &self,
        current_price: f64,
        side: crate::types::OrderSide,
        ticks: u32,
    ) -> f64 {
        let offset = self.tick_size * ticks as f64;
        let price = match side {
            crate::types::OrderSide::Buy => current_price - offset,
            crate::types::OrderSide::Sell => current_price + offset,
        };
        self.round_price(price)
    }
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Secrets required to authenticate against each venue. `Debug` is
/// hand-implemented to redact every field so credentials never land in a
/// log line via a stray `{:?}`.
#[derive(Clone)]
pub struct VenueCredentials {
    pub venue_a_api_key: String,
    pub venue_a_api_secret: String,
    pub venue_b_api_key: String,
    pub venue_b_api_secret: String,
    pub venue_a_testnet: bool,
}

impl std::fmt::Debug for VenueCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueCredentials")
            .field("venue_a_api_key", &"<redacted>")
            .field("venue_a_api_secret", &"<redacted>")
            .field("venue_b_api_key", &"<redacted>")
            .field("venue_b_api_secret", &"<redacted>")
            .field("venue_a_testnet", &self.venue_a_testnet)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub max_spread_percent: f64,
    pub spread_sanity_percent: f64,
    pub price_freshness: Duration,
    pub poll_interval: Duration,
    pub modify_interval: Duration,
    pub naked_position_wait: Duration,
    pub naked_market_wait: Duration,
    pub naked_position_attempts: u32,
    pub post_only_retry_ticks: u32,
    pub status_retry_attempts: u32,
    pub status_retry_delay: Duration,
    pub confirm_poll_interval: Duration,
    pub confirm_shortcut_wait: Duration,
    pub confirm_budget: Duration,
    pub db_path: String,
    pub symbols: HashMap<String, SymbolSpec>,
    pub credentials: VenueCredentials,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            max_spread_percent: env_parse("MAX_SPREAD_PERCENT", 0.2),
            spread_sanity_percent: env_parse("SPREAD_SANITY_PERCENT", 5.0),
            price_freshness: Duration::from_secs(env_parse("PRICE_FRESHNESS_SECONDS", 10)),
            poll_interval: Duration::from_secs(env_parse("ORDER_POLL_INTERVAL_SECONDS", 1)),
            modify_interval: Duration::from_secs(env_parse("ORDER_MODIFY_INTERVAL_SECONDS", 5)),
            naked_position_wait: Duration::from_secs(env_parse(
                "NAKED_POSITION_WAIT_SECONDS",
                5,
            )),
            naked_market_wait: Duration::from_secs(env_parse("NAKED_MARKET_WAIT_SECONDS", 30)),
            naked_position_attempts: env_parse("NAKED_POSITION_ATTEMPTS", 2),
            post_only_retry_ticks: env_parse("POST_ONLY_RETRY_TICKS", 4),
            status_retry_attempts: env_parse("STATUS_RETRY_ATTEMPTS", 3),
            status_retry_delay: Duration::from_millis(env_parse(
                "STATUS_RETRY_DELAY_MS",
                300,
            )),
            confirm_poll_interval: Duration::from_millis(env_parse(
                "CONFIRM_POLL_INTERVAL_MS",
                100,
            )),
            confirm_shortcut_wait: Duration::from_millis(env_parse(
                "CONFIRM_SHORTCUT_WAIT_MS",
                500,
            )),
            confirm_budget: Duration::from_millis(env_parse("CONFIRM_BUDGET_MS", 2_000)),
            db_path: env::var("HEDGE_DB_PATH").unwrap_or_else(|_| "hedge_engine.db".to_string()),
            symbols: default_symbols(),
            credentials: VenueCredentials {
                venue_a_api_key: env::var("VENUE_A_API_KEY").unwrap_or_default(),
                venue_a_api_secret: env::var("VENUE_A_API_SECRET").unwrap_or_default(),
                venue_b_api_key: env::var("VENUE_B_API_KEY").unwrap_or_default(),
                venue_b_api_secret: env::var("VENUE_B_API_SECRET").unwrap_or_default(),
                venue_a_testnet: env::var("VENUE_A_TESTNET")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(true),
            },
        }
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolSpec> {
        self.symbols.get(&symbol.to_uppercase())
    }

    pub fn supported_symbols(&self) -> Vec<&str> {
        self.symbols.keys().map(|s| s.as_str()).collect()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Static symbol table for the two supported trading pairs.
fn default_symbols() -> HashMap<String, SymbolSpec> {
    let mut m = HashMap::new();
    m.insert(
        "BTC".to_string(),
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
        },
    );
    m.insert(
        "ETH".to_string(),
        SymbolSpec {
            symbol: "ETH".to_string(),
            venue_a_identifier: "ETHUSDT".to_string(),
            venue_b_identifier: "B-ETH_USDT".to_string(),
            quantity_precision: 6,
            price_precision: 2,
            tick_size: 0.01,
            min_quantity: 0.008,
            venue_a_maker_fee: 0.00065,
            venue_b_maker_fee: 0.0005,
        },
    );
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderSide;

    fn btc() -> SymbolSpec {
        default_symbols().remove("BTC").unwrap()
    }

    #[test]
    fn maker_price_buy_is_below_current() {
        let spec = btc();
        let price = spec.maker_price(50000.0, OrderSide::Buy);
        assert_eq!(price, 49999.9);
    }

    #[test]
    fn maker_price_sell_is_above_current() {
        let spec = btc();
        let price = spec.maker_price(50000.0, OrderSide::Sell);
        assert_eq!(price, 50000.1);
    }

    #[test]
    fn maker_price_ticks_scales_offset() {
        let spec = btc();
        let price = spec.maker_price_ticks(50000.0, OrderSide::Buy, 4);
        assert_eq!(price, 49999.6);
    }

    #[test]
    fn round_quantity_respects_precision() {
        let spec = btc();
        assert_eq!(spec.round_quantity(0.0020001), 0.002);
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let creds = VenueCredentials {
            venue_a_api_key: "secret-key".to_string(),
            venue_a_api_secret: "secret-sig".to_string(),
            venue_b_api_key: "secret-key-2".to_string(),
            venue_b_api_secret: "secret-sig-2".to_string(),
            venue_a_testnet: true,
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("redacted"));
    }
}
