//! Triangular cycle evaluation.

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use super::matrix::RateMatrix;

/// Conversion path `leg1 → leg2 → leg3 → leg1` over basket indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cycle {
    /// Starting (and final) currency.
    pub leg1: usize,
    /// First intermediate currency.
    pub leg2: usize,
    /// Second intermediate currency.
    pub leg3: usize,
}

impl Cycle {
    /// Create a cycle. Returns `None` unless all three legs are distinct.
    pub fn new(leg1: usize, leg2: usize, leg3: usize) -> Option<Self> {
        if leg1 == leg2 || leg2 == leg3 || leg1 == leg3 {
            return None;
        }
        Some(Self { leg1, leg2, leg3 })
    }

    /// Whether the cycle passes through `idx`.
    pub fn touches(&self, idx: usize) -> bool {
        self.leg1 == idx || self.leg2 == idx || self.leg3 == idx
    }

    /// The three conversion edges in execution order.
    pub fn edges(&self) -> [(usize, usize); 3] {
        [
            (self.leg1, self.leg2),
            (self.leg2, self.leg3),
            (self.leg3, self.leg1),
        ]
    }
}

/// Rates and compounded return of one cycle at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleValue {
    /// Rate of each edge, in [`Cycle::edges`] order.
    pub rates: [Decimal; 3],
    /// Product of the three rates.
    pub compounded_return: Decimal,
}

impl CycleValue {
    /// Return as a percentage of the starting amount (`return × 100`).
    pub fn return_pct(&self) -> Decimal {
        self.compounded_return * Decimal::ONE_HUNDRED
    }

    /// Percentage edge over break-even (`return × 100 − 100`).
    pub fn edge_pct(&self) -> Decimal {
        self.return_pct() - Decimal::ONE_HUNDRED
    }

    /// Strictly above the tradeable threshold (a percentage, e.g. 100.2).
    pub fn is_tradeable(&self, threshold_pct: Decimal) -> bool {
        self.return_pct() > threshold_pct
    }
}

/// Compound the three edge rates of a cycle.
///
/// Returns `None` if any edge has no known rate or the product overflows.
pub fn evaluate_cycle(matrix: &RateMatrix, cycle: &Cycle) -> Option<CycleValue> {
    let [a, b, c] = cycle.edges();
    let rates = [
        matrix.rate(a.0, a.1)?,
        matrix.rate(b.0, b.1)?,
        matrix.rate(c.0, c.1)?,
    ];

    let compounded_return = rates[0].checked_mul(rates[1])?.checked_mul(rates[2])?;

    Some(CycleValue {
        rates,
        compounded_return,
    })
}

/// Tradeable triangular mispricing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageSignal {
    /// Starting currency (the account's settlement currency).
    pub leg1: String,
    /// First intermediate currency.
    pub leg2: String,
    /// Second intermediate currency.
    pub leg3: String,
    /// Percentage edge, `return × 100 − 100`.
    pub edge_pct: Decimal,
    /// Product of the three rates.
    pub compounded_return: Decimal,
    /// Rates that produced the signal, leg1→leg2, leg2→leg3, leg3→leg1.
    pub rates: [Decimal; 3],
    /// Cycle the signal was produced for.
    #[serde(skip)]
    pub cycle: Cycle,
    /// When the signal was produced.
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn matrix_with(rates: &[(usize, usize, Decimal)]) -> RateMatrix {
        let mut m = RateMatrix::new(3);
        for &(from, to, rate) in rates {
            m.set(from, to, rate).unwrap();
        }
        m
    }

    #[test]
    fn cycle_requires_distinct_legs() {
        assert!(Cycle::new(0, 1, 2).is_some());
        assert!(Cycle::new(0, 0, 2).is_none());
        assert!(Cycle::new(0, 1, 1).is_none());
        assert!(Cycle::new(2, 1, 2).is_none());
    }

    #[test]
    fn unknown_leg_yields_no_value() {
        let m = matrix_with(&[(0, 1, dec!(2)), (1, 2, dec!(3))]);
        let cycle = Cycle::new(0, 1, 2).unwrap();

        assert!(evaluate_cycle(&m, &cycle).is_none());
    }

    #[test]
    fn compounded_return_multiplies_edges() {
        let m = matrix_with(&[(0, 1, dec!(0.5)), (1, 2, dec!(4)), (2, 0, dec!(0.51))]);
        let value = evaluate_cycle(&m, &Cycle::new(0, 1, 2).unwrap()).unwrap();

        assert_eq!(value.rates, [dec!(0.5), dec!(4), dec!(0.51)]);
        assert_eq!(value.compounded_return, dec!(1.02));
        assert_eq!(value.edge_pct(), dec!(2));
        assert!(value.is_tradeable(dec!(100.2)));
    }

    #[test]
    fn threshold_is_strict() {
        let m = matrix_with(&[(0, 1, dec!(1)), (1, 2, dec!(1)), (2, 0, dec!(1.002))]);
        let value = evaluate_cycle(&m, &Cycle::new(0, 1, 2).unwrap()).unwrap();

        assert_eq!(value.return_pct(), dec!(100.2));
        assert!(!value.is_tradeable(dec!(100.2)));
        assert!(value.is_tradeable(dec!(100.1)));
    }

    #[test]
    fn overflowing_product_yields_no_value() {
        let m = matrix_with(&[
            (0, 1, Decimal::MAX),
            (1, 2, Decimal::MAX),
            (2, 0, dec!(1)),
        ]);

        assert!(evaluate_cycle(&m, &Cycle::new(0, 1, 2).unwrap()).is_none());
    }
}
