//! Triangular arbitrage detection over a live tick stream.

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use super::calculator::{evaluate_cycle, ArbitrageSignal, Cycle};
use super::matrix::RateMatrix;
use crate::context::StrategyContext;
use crate::error::MarketDataError;
use crate::market::{Basket, Pair, Tick};

/// Maintains the rate matrix and re-scans cycles touched by each tick.
#[derive(Debug, Clone)]
pub struct ArbitrageDetector {
    basket: Basket,
    matrix: RateMatrix,
    cycles: Vec<Cycle>,
    threshold_pct: Decimal,
}

impl ArbitrageDetector {
    /// Build a detector for the context's basket, starting every cycle at
    /// the base currency.
    pub fn new(ctx: &StrategyContext) -> Self {
        let basket = ctx.basket.clone();
        let leg1 = ctx.base_index();
        let dim = basket.len();

        let mut cycles = Vec::new();
        for leg2 in 0..dim {
            for leg3 in 0..dim {
                if let Some(cycle) = Cycle::new(leg1, leg2, leg3) {
                    cycles.push(cycle);
                }
            }
        }

        Self {
            matrix: RateMatrix::new(dim),
            basket,
            cycles,
            threshold_pct: ctx.tradeable_threshold,
        }
    }

    /// Current rate matrix.
    pub fn matrix(&self) -> &RateMatrix {
        &self.matrix
    }

    /// Every cycle the detector evaluates.
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Absorb a tick and return the tradeable cycles it affects.
    ///
    /// A tick that cannot be turned into two rates is rejected before the
    /// matrix is touched.
    #[instrument(skip(self), fields(symbol = %tick.symbol))]
    pub fn on_tick(&mut self, tick: &Tick) -> Result<Vec<ArbitrageSignal>, MarketDataError> {
        let (instrument, base, buy_rate) = self.decode(tick)?;

        debug!(
            instrument = %self.basket.symbol(instrument).unwrap_or_default(),
            base = %self.basket.symbol(base).unwrap_or_default(),
            bid = %tick.bid,
            ask = %tick.ask,
            "received tick"
        );

        // Indices come from the basket, so both writes are in bounds.
        let _ = self.matrix.set(base, instrument, buy_rate);
        let _ = self.matrix.set(instrument, base, tick.bid);

        Ok(self.scan(instrument))
    }

    /// Evaluate every cycle passing through `instrument`.
    fn scan(&self, instrument: usize) -> Vec<ArbitrageSignal> {
        let mut signals = Vec::new();

        for cycle in self.cycles.iter().filter(|c| c.touches(instrument)) {
            let Some(value) = evaluate_cycle(&self.matrix, cycle) else {
                continue;
            };

            if !value.is_tradeable(self.threshold_pct) {
                continue;
            }

            let signal = ArbitrageSignal {
                leg1: self.name(cycle.leg1),
                leg2: self.name(cycle.leg2),
                leg3: self.name(cycle.leg3),
                edge_pct: value.edge_pct(),
                compounded_return: value.compounded_return,
                rates: value.rates,
                cycle: *cycle,
                detected_at: OffsetDateTime::now_utc(),
            };

            info!(
                leg1 = %signal.leg1,
                leg2 = %signal.leg2,
                leg3 = %signal.leg3,
                edge_pct = %signal.edge_pct.round_dp(4),
                "Arbitrage opportunity detected"
            );

            signals.push(signal);
        }

        signals
    }

    fn decode(&self, tick: &Tick) -> Result<(usize, usize, Decimal), MarketDataError> {
        let pair: Pair = tick.symbol.parse()?;

        let instrument = self
            .basket
            .index(&pair.instrument)
            .ok_or_else(|| MarketDataError::UnknownCurrency(pair.instrument.clone()))?;
        let base = self
            .basket
            .index(&pair.base)
            .ok_or_else(|| MarketDataError::UnknownCurrency(pair.base.clone()))?;

        if instrument == base {
            return Err(MarketDataError::InvalidPair(tick.symbol.clone()));
        }

        if tick.bid <= Decimal::ZERO || tick.ask <= Decimal::ZERO {
            return Err(MarketDataError::InvalidQuote {
                symbol: tick.symbol.clone(),
                reason: format!("non-positive price bid={} ask={}", tick.bid, tick.ask),
            });
        }

        let buy_rate = Decimal::ONE
            .checked_div(tick.ask)
            .filter(|rate| !rate.is_zero())
            .ok_or_else(|| MarketDataError::InvalidQuote {
                symbol: tick.symbol.clone(),
                reason: format!("ask {} has no representable inverse", tick.ask),
            })?;

        Ok((instrument, base, buy_rate))
    }

    fn name(&self, idx: usize) -> String {
        self.basket.symbol(idx).unwrap_or_default().to_string()
    }
}
