//! # Node Configuration
//!
//! Runtime parameters for an Atomix node, overridable from `AX_*`
//! environment variables. Real deployments layer wallet credentials on
//! top of this; those never pass through the swap engine itself.

use shared_types::Currency;
use std::path::PathBuf;
use std::time::Duration;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Serve as a hub (service node) instead of a trader.
    pub exchange_enabled: bool,
    /// Currencies this node bridges.
    pub currencies: Vec<Currency>,
    /// Currency of the service-fee chain.
    pub fee_currency: Currency,
    /// Swap engine timing and retry limits.
    pub session: SessionTuning,
    /// Directory for the raw-transaction journal.
    pub txlog_dir: PathBuf,
}

/// Session timing and retry limits.
#[derive(Debug, Clone)]
pub struct SessionTuning {
    /// Watchdog tick interval.
    pub watchdog_interval: Duration,
    /// Active order stall timeout.
    pub order_stall_timeout: Duration,
    /// Pending advert lifetime.
    pub pending_order_ttl: Duration,
    /// Deposit-probe retries before giving up on a counterparty deposit.
    pub max_deposit_check_retries: u32,
    /// Redeem-hint attempts before scanning the chain directly.
    pub max_other_pay_tx_tries: u32,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            watchdog_interval: Duration::from_secs(15),
            order_stall_timeout: Duration::from_secs(30 * 60),
            pending_order_ttl: Duration::from_secs(60 * 60),
            max_deposit_check_retries: 30,
            max_other_pay_tx_tries: 5,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            exchange_enabled: false,
            currencies: Vec::new(),
            fee_currency: default_fee_currency(),
            session: SessionTuning::default(),
            txlog_dir: PathBuf::from("./txlog"),
        }
    }
}

fn default_fee_currency() -> Currency {
    // A valid 1..=8 character ASCII ticker always constructs.
    Currency::new("BLOCK").unwrap_or_else(|_| unreachable!())
}

impl NodeConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AX_EXCHANGE_ENABLED`: serve as hub (default: false)
    /// - `AX_CURRENCIES`: comma-separated tickers (e.g. `BLOCK,LTC`)
    /// - `AX_FEE_CURRENCY`: service-fee chain ticker (default: BLOCK)
    /// - `AX_TXLOG_DIR`: journal directory (default: ./txlog)
    /// - `AX_WATCHDOG_SECS`: watchdog interval (default: 15)
    /// - `AX_ORDER_TIMEOUT_SECS`: stall timeout (default: 1800)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.exchange_enabled = std::env::var("AX_EXCHANGE_ENABLED")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        if let Ok(list) = std::env::var("AX_CURRENCIES") {
            config.currencies = list
                .split(',')
                .filter_map(|ticker| Currency::new(ticker.trim()).ok())
                .collect();
        }

        if let Ok(ticker) = std::env::var("AX_FEE_CURRENCY") {
            if let Ok(currency) = Currency::new(ticker.trim()) {
                config.fee_currency = currency;
            }
        }

        if let Ok(dir) = std::env::var("AX_TXLOG_DIR") {
            config.txlog_dir = PathBuf::from(dir);
        }

        if let Some(secs) = env_u64("AX_WATCHDOG_SECS") {
            config.session.watchdog_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("AX_ORDER_TIMEOUT_SECS") {
            config.session.order_stall_timeout = Duration::from_secs(secs);
        }

        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert!(!config.exchange_enabled);
        assert_eq!(config.fee_currency.as_str(), "BLOCK");
        assert_eq!(config.session.max_deposit_check_retries, 30);
    }
}
