//! Hop planner - quotes a chain of exchanges before anything is created
//!
//! Planning is the first of two passes. Minimums and quotes are gathered for
//! every hop up front because the amount feeding each hop must be known before
//! any transaction exists, while the addresses wiring hops together only come
//! into existence at execution time (see `executor`).

use crate::error::{SwapError, SwapResult};
use crate::quote::{parse_amount, QuoteService};
use crate::types::{CurrencyId, HopPlan, HopSpec, MinAmount, PayoutTarget};

use futures::future::try_join_all;
use tracing::{debug, info};

/// Longest path accepted: start, one intermediary, final
const MAX_PATH_LEN: usize = 3;

pub struct HopPlanner {
    quotes: QuoteService,
    /// Intermediary used by hidden-hop plans
    hidden_intermediary: CurrencyId,
    concurrent_lookups: bool,
}

impl HopPlanner {
    pub fn new(quotes: QuoteService, hidden_intermediary: CurrencyId, concurrent_lookups: bool) -> Self {
        Self {
            quotes,
            hidden_intermediary,
            concurrent_lookups,
        }
    }

    /// Plan a visible path: `[from, to]` or `[from, via, to]`
    pub async fn build_plan(
        &self,
        path: &[CurrencyId],
        input_amount: &str,
        destination_address: &str,
    ) -> SwapResult<HopPlan> {
        validate_path(path)?;
        self.plan(path.to_vec(), input_amount, destination_address, None)
            .await
    }

    /// Plan `from -> to` through the configured intermediary without it being
    /// part of the caller's path
    pub async fn build_hidden_plan(
        &self,
        from: &CurrencyId,
        to: &CurrencyId,
        input_amount: &str,
        destination_address: &str,
    ) -> SwapResult<HopPlan> {
        validate_path(&[from.clone(), to.clone()])?;

        let hidden = &self.hidden_intermediary;
        if hidden.ticker == from.ticker || hidden.ticker == to.ticker {
            return Err(SwapError::InvalidPlan(format!(
                "hidden intermediary {} cannot be an end of the swap",
                hidden
            )));
        }

        let path = vec![from.clone(), hidden.clone(), to.clone()];
        self.plan(path, input_amount, destination_address, Some(hidden.clone()))
            .await
    }

    async fn plan(
        &self,
        path: Vec<CurrencyId>,
        input_amount: &str,
        destination_address: &str,
        hidden_intermediary: Option<CurrencyId>,
    ) -> SwapResult<HopPlan> {
        let destination = destination_address.trim();
        if destination.is_empty() || destination.chars().any(char::is_whitespace) {
            return Err(SwapError::InvalidAddress {
                message: "destination address is missing or malformed".to_string(),
            });
        }

        let input = parse_amount(input_amount)?;
        if input <= rust_decimal::Decimal::ZERO {
            return Err(SwapError::InvalidAmount(format!(
                "amount must be positive, got {}",
                input_amount
            )));
        }

        let pairs: Vec<(&CurrencyId, &CurrencyId)> =
            path.windows(2).map(|w| (&w[0], &w[1])).collect();
        let minimums = self.fetch_minimums(&pairs).await?;

        let hop_count = pairs.len();
        let mut hops = Vec::with_capacity(hop_count);
        let mut warnings = Vec::new();
        let mut hop_input = input_amount.trim().to_string();

        for (index, ((from, to), minimum)) in pairs.iter().zip(minimums).enumerate() {
            let required = parse_amount(&minimum.value)?;
            let actual = parse_amount(&hop_input)?;
            if actual < required {
                crate::metrics::record_below_minimum();
                return Err(SwapError::BelowMinimum {
                    hop_index: index,
                    required: minimum.value,
                    actual: hop_input,
                });
            }

            let quote = self.quotes.get_estimate(from, to, &hop_input).await?;
            if let Some(warning) = quote.warning {
                warnings.push(warning);
            }

            let payout_address = if index + 1 == hop_count {
                PayoutTarget::Address(destination.to_string())
            } else {
                PayoutTarget::NextHopDeposit
            };

            debug!(
                "Hop {}: {} {} -> ~{} {}",
                index, hop_input, from, quote.estimated_output, to
            );

            hops.push(HopSpec {
                sequence_index: index,
                from_currency: (*from).clone(),
                to_currency: (*to).clone(),
                input_amount: hop_input,
                payout_address,
                estimated_output: quote.estimated_output.clone(),
                minimum: minimum.value,
            });

            hop_input = quote.estimated_output;
        }

        let plan = HopPlan {
            plan_id: uuid::Uuid::new_v4(),
            hops,
            destination_address: destination.to_string(),
            hidden_intermediary,
            warnings,
        };

        info!(
            "Planned {} hop(s) {} ({} -> ~{})",
            plan.len(),
            plan.plan_id,
            input_amount,
            plan.estimated_output().unwrap_or("?")
        );
        crate::metrics::record_plan_built(plan.len());

        Ok(plan)
    }

    /// Minimums only depend on the pair, so they can be fetched together
    async fn fetch_minimums(&self, pairs: &[(&CurrencyId, &CurrencyId)]) -> SwapResult<Vec<MinAmount>> {
        if self.concurrent_lookups {
            try_join_all(
                pairs
                    .iter()
                    .map(|(from, to)| self.quotes.get_minimum(from, to)),
            )
            .await
        } else {
            let mut minimums = Vec::with_capacity(pairs.len());
            for (from, to) in pairs {
                minimums.push(self.quotes.get_minimum(from, to).await?);
            }
            Ok(minimums)
        }
    }
}

fn validate_path(path: &[CurrencyId]) -> SwapResult<()> {
    if path.len() < 2 {
        return Err(SwapError::InvalidPlan(format!(
            "path needs at least 2 currencies, got {}",
            path.len()
        )));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(SwapError::InvalidPlan(format!(
            "path supports at most one intermediary, got {} currencies",
            path.len()
        )));
    }
    if let Some(w) = path.windows(2).find(|w| w[0].ticker == w[1].ticker) {
        return Err(SwapError::InvalidPlan(format!(
            "hop from {} to itself",
            w[0]
        )));
    }
    Ok(())
}
