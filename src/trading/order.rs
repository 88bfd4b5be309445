//! Execution request types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ExecutionError;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Acquire the pair's instrument, paying base.
    #[strum(to_string = "buy", serialize = "BUY")]
    Buy,
    /// Dispose of the pair's instrument, receiving base.
    #[strum(to_string = "sell", serialize = "SELL")]
    Sell,
}

/// One conversion handed to an [`ExecutionProvider`](super::ExecutionProvider).
///
/// `rate` is the price of one unit of `symbol` in `base`; `quantity` is in
/// units of `symbol`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Instrument currency.
    pub symbol: String,
    /// Quote currency.
    pub base: String,
    /// Buy or sell the instrument.
    pub side: Side,
    /// Limit price in base per instrument.
    pub rate: Decimal,
    /// Instrument quantity.
    pub quantity: Decimal,
}

impl ExecutionRequest {
    /// Create a buy request.
    pub fn buy(
        symbol: impl Into<String>,
        base: impl Into<String>,
        rate: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            base: base.into(),
            side: Side::Buy,
            rate,
            quantity,
        }
    }

    /// Create a sell request.
    pub fn sell(
        symbol: impl Into<String>,
        base: impl Into<String>,
        rate: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            base: base.into(),
            side: Side::Sell,
            rate,
            quantity,
        }
    }

    /// Pair symbol, `SYMBOL/BASE`.
    pub fn pair(&self) -> String {
        format!("{}/{}", self.symbol, self.base)
    }

    /// Base-currency value of the request.
    pub fn notional(&self) -> Decimal {
        self.rate * self.quantity
    }

    /// Validate request parameters.
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.symbol.is_empty() || self.base.is_empty() {
            return Err(ExecutionError::Rejected("symbol and base are required".to_string()));
        }
        if self.symbol == self.base {
            return Err(ExecutionError::Rejected(format!(
                "cannot convert {} into itself",
                self.symbol
            )));
        }
        if self.rate <= Decimal::ZERO {
            return Err(ExecutionError::Rejected("rate must be positive".to_string()));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(ExecutionError::Rejected("quantity must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn request_creation() {
        let buy = ExecutionRequest::buy("BTC", "USD", dec!(50000), dec!(0.02));
        assert_eq!(buy.side, Side::Buy);
        assert_eq!(buy.pair(), "BTC/USD");
        assert_eq!(buy.notional(), dec!(1000));

        let sell = ExecutionRequest::sell("ETH", "BTC", dec!(0.05), dec!(2));
        assert_eq!(sell.side, Side::Sell);
        assert_eq!(sell.notional(), dec!(0.1));
    }

    #[test]
    fn request_validation() {
        assert!(ExecutionRequest::buy("BTC", "USD", dec!(1), dec!(1)).validate().is_ok());
        assert!(ExecutionRequest::buy("", "USD", dec!(1), dec!(1)).validate().is_err());
        assert!(ExecutionRequest::buy("USD", "USD", dec!(1), dec!(1)).validate().is_err());
        assert!(ExecutionRequest::buy("BTC", "USD", dec!(0), dec!(1)).validate().is_err());
        assert!(ExecutionRequest::sell("BTC", "USD", dec!(1), dec!(-1)).validate().is_err());
    }

    #[test]
    fn side_parsing() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("SELL".parse::<Side>().unwrap(), Side::Sell);
        assert_eq!(Side::Buy.to_string(), "buy");
    }
}
