//! Position tracking.

use rust_decimal::Decimal;
use serde::Serialize;
use strum::{Display, EnumString};

/// Direction of the open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum PositionState {
    /// No position.
    Flat,
    /// Positive size.
    Long,
    /// Negative size.
    Short,
}

/// Signed position in one instrument plus its realized PnL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    /// Signed size: positive long, negative short, zero flat.
    pub size: Decimal,
    /// Price the position was opened at; zero when flat.
    pub entry_price: Decimal,
    /// Running realized PnL, fees included.
    pub realized_pnl: Decimal,
}

impl Position {
    /// Direction derived from the sign of `size`.
    pub fn state(&self) -> PositionState {
        if self.size.is_sign_positive() && !self.size.is_zero() {
            PositionState::Long
        } else if self.size.is_sign_negative() && !self.size.is_zero() {
            PositionState::Short
        } else {
            PositionState::Flat
        }
    }

    /// Whether no position is open.
    pub fn is_flat(&self) -> bool {
        self.state() == PositionState::Flat
    }

    /// Open a position and charge the entry fee.
    pub fn open(&mut self, size: Decimal, entry_price: Decimal, fee_cost: Decimal) {
        self.size = size;
        self.entry_price = entry_price;
        self.realized_pnl -= fee_cost;
    }

    /// Realize `gain`, charge the exit fee and go flat.
    pub fn close(&mut self, gain: Decimal, fee_cost: Decimal) {
        self.realized_pnl += gain - fee_cost;
        self.size = Decimal::ZERO;
        self.entry_price = Decimal::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn state_follows_size_sign() {
        let mut pos = Position::default();
        assert_eq!(pos.state(), PositionState::Flat);

        pos.open(dec!(10), dec!(100), dec!(2.5));
        assert_eq!(pos.state(), PositionState::Long);
        assert_eq!(pos.realized_pnl, dec!(-2.5));

        pos.close(dec!(8.1), dec!(2.5));
        assert!(pos.is_flat());
        assert_eq!(pos.entry_price, Decimal::ZERO);
        assert_eq!(pos.realized_pnl, dec!(3.1));

        pos.open(dec!(-10), dec!(100), dec!(2.5));
        assert_eq!(pos.state(), PositionState::Short);
    }

    #[test]
    fn state_display() {
        assert_eq!(PositionState::Long.to_string(), "LONG");
        assert_eq!("FLAT".parse::<PositionState>().unwrap(), PositionState::Flat);
    }
}
