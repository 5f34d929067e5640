//! Quote service - minimums and estimated output for a currency pair

use crate::error::{SwapError, SwapResult};
use crate::provider::ExchangeProvider;
use crate::types::{CurrencyId, ExchangeRange, MinAmount, Quote};

use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Thin wrapper over the provider's pricing endpoints. Never retries.
#[derive(Clone)]
pub struct QuoteService {
    provider: Arc<dyn ExchangeProvider>,
}

impl QuoteService {
    pub fn new(provider: Arc<dyn ExchangeProvider>) -> Self {
        Self { provider }
    }

    pub async fn get_minimum(&self, from: &CurrencyId, to: &CurrencyId) -> SwapResult<MinAmount> {
        let value = self.provider.min_amount(&from.ticker, &to.ticker).await?;
        parse_amount(&value)?;
        debug!("Minimum {} -> {}: {}", from, to, value);
        Ok(MinAmount { value })
    }

    pub async fn get_range(&self, from: &CurrencyId, to: &CurrencyId) -> SwapResult<ExchangeRange> {
        let range = self.provider.exchange_range(&from.ticker, &to.ticker).await?;
        Ok(ExchangeRange {
            min_amount: range.min_amount,
            max_amount: range.max_amount,
        })
    }

    /// Estimated output for `amount`. The amount must be a positive decimal;
    /// checking it against the pair minimum is the caller's job.
    pub async fn get_estimate(
        &self,
        from: &CurrencyId,
        to: &CurrencyId,
        amount: &str,
    ) -> SwapResult<Quote> {
        let parsed = parse_amount(amount)?;
        if parsed <= Decimal::ZERO {
            return Err(SwapError::InvalidAmount(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        let estimate = self
            .provider
            .estimate(&from.ticker, &to.ticker, amount.trim())
            .await?;
        debug!(
            "Estimate {} {} -> {} {}",
            amount, from, estimate.estimated_amount, to
        );

        Ok(Quote {
            estimated_output: estimate.estimated_amount,
            warning: estimate.warning_message.filter(|w| !w.is_empty()),
        })
    }
}

/// Parse a decimal-string amount
pub fn parse_amount(amount: &str) -> SwapResult<Decimal> {
    let trimmed = amount.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| SwapError::InvalidAmount(format!("not a decimal amount: {:?}", amount)))
}
