//! Unified error types for the signal engines.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that stop a run of the signal engines.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Market data subscription or decode error.
    #[error("market data error: {0}")]
    MarketData(#[from] MarketDataError),

    /// Prometheus exporter could not be installed.
    #[error("metrics error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// An engine task panicked or was aborted.
    #[error("engine task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment could not be deserialized.
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    /// A field holds a value the engines cannot run with.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Environment field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Market data subscription and decode errors.
///
/// Every variant except [`MarketDataError::FeedClosed`] is non-fatal: the
/// offending subscription or event is logged and skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// Subscribe or unsubscribe request failed.
    #[error("subscription to {pair} failed: {reason}")]
    SubscriptionFailed {
        /// Pair symbol the request was for.
        pair: String,
        /// Reason for failure.
        reason: String,
    },

    /// Pair symbol is not of the form `INSTRUMENT/BASE`.
    #[error("invalid pair symbol: {0:?}")]
    InvalidPair(String),

    /// Currency is not part of the configured basket.
    #[error("currency {0} is not in the basket")]
    UnknownCurrency(String),

    /// Tick quote cannot produce conversion rates.
    #[error("invalid quote for {symbol}: {reason}")]
    InvalidQuote {
        /// Pair symbol of the tick.
        symbol: String,
        /// What was wrong with the quote.
        reason: String,
    },

    /// Book level has a non-positive price or negative volume.
    #[error("invalid book level for {symbol}: price={price} volume={volume}")]
    InvalidLevel {
        /// Instrument symbol of the book message.
        symbol: String,
        /// Offending price.
        price: Decimal,
        /// Offending volume.
        volume: Decimal,
    },

    /// The feed's background task has stopped.
    #[error("market data feed closed")]
    FeedClosed,
}

/// Rate matrix errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArbitrageError {
    /// Matrix index outside the basket dimension.
    #[error("rate matrix index ({from}, {to}) out of bounds for dimension {dim}")]
    IndexOutOfBounds {
        /// Row index.
        from: usize,
        /// Column index.
        to: usize,
        /// Matrix dimension.
        dim: usize,
    },
}

/// Order execution errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Request failed validation or was refused by the backend.
    #[error("execution rejected: {0}")]
    Rejected(String),

    /// Account does not hold enough of a currency.
    #[error("insufficient {currency}: need {required}, have {available}")]
    InsufficientFunds {
        /// Currency that ran short.
        currency: String,
        /// Required amount.
        required: Decimal,
        /// Available amount.
        available: Decimal,
    },

    /// Conversion between two currencies has no quoted pair.
    #[error("no route between {from} and {to}")]
    NoRoute {
        /// Source currency.
        from: String,
        /// Target currency.
        to: String,
    },
}

/// WebSocket connection and message errors.
#[derive(Error, Debug)]
pub enum WsError {
    /// Message parsing failed.
    #[error("failed to parse websocket message: {0}")]
    ParseError(String),

    /// Send failed.
    #[error("failed to send websocket message: {0}")]
    SendFailed(String),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_error_wraps_domain_errors() {
        let err: BotError = MarketDataError::InvalidPair("BTCUSD".to_string()).into();
        assert!(matches!(err, BotError::MarketData(_)));
        assert_eq!(
            err.to_string(),
            "market data error: invalid pair symbol: \"BTCUSD\""
        );

        let err: BotError = ConfigError::InvalidValue {
            field: "TRADE_SIZE",
            reason: "must be positive".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "configuration error: invalid value for TRADE_SIZE: must be positive"
        );
    }
}
