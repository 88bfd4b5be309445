//! Pairwise conversion rates over the currency basket.

use rust_decimal::Decimal;

use crate::error::ArbitrageError;

/// N×N conversion rates, row = from currency, column = to currency.
///
/// The diagonal is always 1. Off-diagonal cells start at 0, which means
/// "no rate known yet". `(i, j)` and `(j, i)` are independent: one comes
/// from the ask and the other from the bid of the same pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateMatrix {
    dim: usize,
    cells: Vec<Decimal>,
}

impl RateMatrix {
    /// Identity-initialised matrix of the given dimension.
    pub fn new(dim: usize) -> Self {
        let mut cells = vec![Decimal::ZERO; dim * dim];
        for i in 0..dim {
            cells[i * dim + i] = Decimal::ONE;
        }
        Self { dim, cells }
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Store a rate, last write wins. Writes to the diagonal are ignored.
    pub fn set(&mut self, from: usize, to: usize, rate: Decimal) -> Result<(), ArbitrageError> {
        let idx = self.offset(from, to)?;
        if from != to {
            self.cells[idx] = rate;
        }
        Ok(())
    }

    /// Stored rate; 1 on the diagonal, 0 for a cell never written.
    pub fn get(&self, from: usize, to: usize) -> Result<Decimal, ArbitrageError> {
        self.offset(from, to).map(|idx| self.cells[idx])
    }

    /// Rate if one is known. Unknown and out-of-range cells are `None`.
    pub fn rate(&self, from: usize, to: usize) -> Option<Decimal> {
        self.get(from, to).ok().filter(|rate| !rate.is_zero())
    }

    fn offset(&self, from: usize, to: usize) -> Result<usize, ArbitrageError> {
        if from >= self.dim || to >= self.dim {
            return Err(ArbitrageError::IndexOutOfBounds {
                from,
                to,
                dim: self.dim,
            });
        }
        Ok(from * self.dim + to)
    }
}
