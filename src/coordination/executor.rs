//! Transaction creator - executes a plan against the provider, last hop first
//!
//! Each hop's payout address is the deposit address of the hop after it, so
//! hops are created strictly in reverse order: hop `n-1` pays the user's
//! destination, hop `i` pays the deposit address returned for hop `i+1`.

use crate::error::{SwapError, SwapResult};
use crate::provider::ExchangeProvider;
use crate::state::Ledger;
use crate::types::{HopPlan, TransactionRecord};

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of a fully executed plan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedPlan {
    pub plan_id: uuid::Uuid,
    /// Created hops, first to last
    pub records: Vec<TransactionRecord>,
    /// Address the end user must fund (deposit address of hop 0)
    pub deposit_address: String,
    pub deposit_amount: String,
    pub estimated_output: String,
}

pub struct TransactionCreator {
    provider: Arc<dyn ExchangeProvider>,
    ledger: Arc<Ledger>,
}

impl TransactionCreator {
    pub fn new(provider: Arc<dyn ExchangeProvider>, ledger: Arc<Ledger>) -> Self {
        Self { provider, ledger }
    }

    /// Create every hop of `plan`.
    ///
    /// Each created hop is written to the ledger as soon as the provider
    /// confirms it. On failure the remaining hops are not attempted, and hops
    /// already created are returned as orphaned in `PlanExecution` (the provider
    /// has no cancel primitive).
    pub async fn execute(&self, plan: &HopPlan) -> SwapResult<ExecutedPlan> {
        if plan.is_empty() {
            return Err(SwapError::InvalidPlan("plan has no hops".to_string()));
        }

        let hop_count = plan.len();
        let mut created: Vec<TransactionRecord> = Vec::with_capacity(hop_count);
        let mut next_deposit: Option<String> = None;

        for hop in plan.hops.iter().rev() {
            let payout_address = match hop.payout_address.address() {
                Some(address) => address.to_string(),
                None => next_deposit.take().ok_or_else(|| {
                    SwapError::InvalidPlan(format!(
                        "hop {} has no downstream deposit address",
                        hop.sequence_index
                    ))
                })?,
            };

            let result = self
                .provider
                .create_transaction(
                    &hop.from_currency.ticker,
                    &hop.to_currency.ticker,
                    &hop.input_amount,
                    &payout_address,
                )
                .await;

            let tx = match result {
                Ok(tx) => tx,
                Err(cause) => {
                    crate::metrics::record_hop_failed();
                    error!(
                        "Plan {} failed creating hop {} ({} -> {}): {}",
                        plan.plan_id, hop.sequence_index, hop.from_currency, hop.to_currency, cause
                    );
                    if !created.is_empty() {
                        warn!(
                            "Plan {} leaves {} orphaned hop(s): {:?}",
                            plan.plan_id,
                            created.len(),
                            created.iter().map(|r| r.id.as_str()).collect::<Vec<_>>()
                        );
                    }
                    created.reverse();
                    return Err(SwapError::PlanExecution {
                        failed_hop_index: hop.sequence_index,
                        cause: Box::new(cause),
                        orphaned: created,
                    });
                }
            };

            info!(
                "Created hop {} of plan {}: {} ({} -> {}), deposit {}",
                hop.sequence_index, plan.plan_id, tx.id, hop.from_currency, hop.to_currency, tx.payin_address
            );
            crate::metrics::record_hop_created();

            let record = TransactionRecord::new(
                tx.id,
                hop.from_currency.ticker.clone(),
                hop.to_currency.ticker.clone(),
                hop.input_amount.clone(),
                hop.estimated_output.clone(),
                tx.payin_address.clone(),
                payout_address,
            );
            self.ledger.record(record.clone());

            next_deposit = Some(tx.payin_address);
            created.push(record);
        }

        created.reverse();
        let deposit_address = created[0].payin_address.clone();

        Ok(ExecutedPlan {
            plan_id: plan.plan_id,
            deposit_address,
            deposit_amount: plan.input_amount().unwrap_or_default().to_string(),
            estimated_output: plan.estimated_output().unwrap_or_default().to_string(),
            records: created,
        })
    }
}
