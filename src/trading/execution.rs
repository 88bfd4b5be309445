//! Execution backends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, instrument, warn};

use super::order::{ExecutionRequest, Side};
use crate::error::ExecutionError;

/// Quantity precision accepted by the exchange.
pub const LOT_DECIMALS: u32 = 8;

/// Round an amount down to lot precision.
pub fn round_lot(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(LOT_DECIMALS, RoundingStrategy::ToZero)
}

/// Places conversions on behalf of the arbitrage executor.
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    /// Execute one conversion.
    async fn execute(&self, request: &ExecutionRequest) -> Result<(), ExecutionError>;

    /// Current balance of the settlement currency.
    async fn total_capital(&self) -> Result<Decimal, ExecutionError>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// In-memory portfolio that fills every valid request at its stated rate.
///
/// Balances are tracked per currency. Each fill is charged `fee` on the
/// proceeds and rounded down to [`LOT_DECIMALS`].
#[derive(Debug, Clone)]
pub struct PaperPortfolio {
    settlement: String,
    fee: Decimal,
    balances: Arc<Mutex<HashMap<String, Decimal>>>,
    fills: Arc<Mutex<Vec<ExecutionRequest>>>,
}

impl PaperPortfolio {
    /// Seed the portfolio with `capital` in the settlement currency.
    pub fn new(settlement: impl Into<String>, capital: Decimal, fee: Decimal) -> Self {
        let settlement = settlement.into();
        let mut balances = HashMap::new();
        balances.insert(settlement.clone(), capital);

        Self {
            settlement,
            fee,
            balances: Arc::new(Mutex::new(balances)),
            fills: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Balance held in `currency`.
    pub fn balance(&self, currency: &str) -> Decimal {
        self.balances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(currency)
            .copied()
            .unwrap_or_default()
    }

    /// Every filled request, oldest first.
    pub fn fills(&self) -> Vec<ExecutionRequest> {
        self.fills
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fill(&self, request: &ExecutionRequest) -> Result<(), ExecutionError> {
        let keep = Decimal::ONE - self.fee;
        let (spend_currency, spend, receive_currency, receive) = match request.side {
            Side::Buy => (
                &request.base,
                request.notional().round_dp(LOT_DECIMALS),
                &request.symbol,
                round_lot(request.quantity * keep),
            ),
            Side::Sell => (
                &request.symbol,
                request.quantity,
                &request.base,
                round_lot(request.notional() * keep),
            ),
        };

        let mut balances = self.balances.lock().unwrap_or_else(PoisonError::into_inner);
        let available = balances.get(spend_currency).copied().unwrap_or_default();
        if available < spend {
            return Err(ExecutionError::InsufficientFunds {
                currency: spend_currency.clone(),
                required: spend,
                available,
            });
        }

        balances.insert(spend_currency.clone(), available - spend);
        *balances.entry(receive_currency.clone()).or_default() += receive;

        debug!(
            spent = %spend,
            spend_currency = %spend_currency,
            received = %receive,
            receive_currency = %receive_currency,
            "Paper fill"
        );
        Ok(())
    }
}

#[async_trait]
impl ExecutionProvider for PaperPortfolio {
    #[instrument(skip(self), fields(pair = %request.pair(), side = %request.side))]
    async fn execute(&self, request: &ExecutionRequest) -> Result<(), ExecutionError> {
        if let Err(e) = request.validate() {
            warn!(error = %e, "Rejected invalid request");
            return Err(e);
        }

        self.fill(request)?;
        self.fills
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        info!(
            rate = %request.rate,
            quantity = %request.quantity,
            "Paper order filled"
        );
        Ok(())
    }

    async fn total_capital(&self) -> Result<Decimal, ExecutionError> {
        Ok(self.balance(&self.settlement))
    }

    fn name(&self) -> &'static str {
        "paper"
    }
}
