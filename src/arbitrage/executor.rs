//! Arbitrage cycle execution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use super::calculator::ArbitrageSignal;
use crate::context::StrategyContext;
use crate::error::ExecutionError;
use crate::market::Basket;
use crate::trading::{round_lot, ExecutionProvider, ExecutionRequest, Side};

/// Result of attempting to execute a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// All three legs filled.
    Completed {
        /// Amount of the starting currency put in.
        start_amount: Decimal,
        /// Amount of the starting currency expected back, net of fees.
        end_amount: Decimal,
    },
    /// A leg failed; later legs were not attempted.
    Failed {
        /// Zero-based index of the failing leg.
        leg: usize,
        /// Failure reported by the backend.
        error: ExecutionError,
    },
    /// Skipped due to cooldown.
    CooldownActive {
        /// Time until the next cycle may execute.
        remaining: Duration,
    },
    /// Skipped because the account holds no settlement currency.
    NoCapital,
}

/// Executor state for tracking cooldowns and stats.
pub struct TriangleExecutor {
    provider: Arc<dyn ExecutionProvider>,
    basket: Basket,
    trade_size: Decimal,
    fee: Decimal,
    cooldown: Duration,
    last_execution: Option<Instant>,
    /// Signals handed to the executor.
    pub signals_seen: u64,
    /// Cycles where every leg filled.
    pub cycles_executed: u64,
    /// Cycles abandoned after a failing leg.
    pub failures: u64,
}

impl std::fmt::Debug for TriangleExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriangleExecutor")
            .field("provider", &self.provider.name())
            .field("signals_seen", &self.signals_seen)
            .field("cycles_executed", &self.cycles_executed)
            .field("failures", &self.failures)
            .finish()
    }
}

impl TriangleExecutor {
    /// Create an executor over `provider`.
    pub fn new(ctx: &StrategyContext, provider: Arc<dyn ExecutionProvider>) -> Self {
        Self {
            provider,
            basket: ctx.basket.clone(),
            trade_size: ctx.trade_size,
            fee: ctx.fee,
            cooldown: ctx.cooldown,
            last_execution: None,
            signals_seen: 0,
            cycles_executed: 0,
            failures: 0,
        }
    }

    /// Time left before another cycle may run, zero if none.
    pub fn cooldown_remaining(&self) -> Duration {
        self.last_execution
            .map(|last| self.cooldown.saturating_sub(last.elapsed()))
            .unwrap_or_default()
    }

    /// Check if cooldown is active.
    pub fn is_cooldown_active(&self) -> bool {
        !self.cooldown_remaining().is_zero()
    }

    /// Execute the three legs of `signal` in order.
    ///
    /// Failures are reported in the result, never rolled back.
    #[instrument(
        skip(self, signal),
        fields(cycle = %format!("{}/{}/{}", signal.leg1, signal.leg2, signal.leg3))
    )]
    pub async fn execute(&mut self, signal: &ArbitrageSignal) -> ExecutionResult {
        self.signals_seen += 1;

        if self.is_cooldown_active() {
            let remaining = self.cooldown_remaining();
            info!(remaining_ms = remaining.as_millis() as u64, "Cooldown active, skipping");
            return ExecutionResult::CooldownActive { remaining };
        }

        let capital = match self.provider.total_capital().await {
            Ok(capital) => capital,
            Err(e) => {
                error!(error = %e, "Failed to read capital");
                self.failures += 1;
                return ExecutionResult::Failed { leg: 0, error: e };
            }
        };

        let start_amount = round_lot(self.trade_size.min(capital));
        if start_amount <= Decimal::ZERO {
            warn!(capital = %capital, "No capital available");
            return ExecutionResult::NoCapital;
        }

        self.last_execution = Some(Instant::now());

        let mut amount = start_amount;
        let legs = signal.cycle.edges().into_iter().zip(signal.rates);
        for (leg, ((from, to), rate)) in legs.enumerate() {
            let request = match self.leg_request(from, to, rate, amount) {
                Ok(request) => request,
                Err(e) => return self.fail(leg, e),
            };

            if let Err(e) = self.provider.execute(&request).await {
                return self.fail(leg, e);
            }

            amount = self.received(&request);
            info!(
                leg,
                pair = %request.pair(),
                side = %request.side,
                rate = %request.rate,
                quantity = %request.quantity,
                "Leg filled"
            );
        }

        self.cycles_executed += 1;
        info!(
            start = %start_amount,
            end = %amount,
            backend = self.provider.name(),
            "Cycle executed"
        );

        ExecutionResult::Completed {
            start_amount,
            end_amount: amount,
        }
    }

    /// Request converting `amount` of basket currency `from` into `to`,
    /// where `rate` is units of `to` per unit of `from`.
    fn leg_request(
        &self,
        from: usize,
        to: usize,
        rate: Decimal,
        amount: Decimal,
    ) -> Result<ExecutionRequest, ExecutionError> {
        let no_route = || ExecutionError::NoRoute {
            from: self.basket.symbol(from).unwrap_or_default().to_string(),
            to: self.basket.symbol(to).unwrap_or_default().to_string(),
        };

        let conversion = self.basket.conversion(from, to).ok_or_else(no_route)?;
        let pair = conversion.pair;

        match conversion.side {
            Side::Buy => {
                let price = Decimal::ONE.checked_div(rate).ok_or_else(no_route)?;
                let quantity = round_lot(amount.checked_mul(rate).ok_or_else(no_route)?);
                Ok(ExecutionRequest::buy(pair.instrument, pair.base, price, quantity))
            }
            Side::Sell => Ok(ExecutionRequest::sell(pair.instrument, pair.base, rate, amount)),
        }
    }

    /// Amount of the target currency a filled request leaves us with.
    fn received(&self, request: &ExecutionRequest) -> Decimal {
        let keep = Decimal::ONE - self.fee;
        match request.side {
            Side::Buy => round_lot(request.quantity * keep),
            Side::Sell => round_lot(request.notional() * keep),
        }
    }

    fn fail(&mut self, leg: usize, error: ExecutionError) -> ExecutionResult {
        error!(leg, error = %error, "Leg failed, abandoning cycle");
        self.failures += 1;
        ExecutionResult::Failed { leg, error }
    }
}
