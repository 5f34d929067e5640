//! Scripted exchange provider for multi-call test scenarios

use crate::error::{SwapError, SwapResult};
use crate::provider::{
    CreatedTransaction, Estimate, ExchangeProvider, ExchangeRangeResponse, StatusResponse,
};
use crate::types::CurrencyId;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type Pair = (String, String);

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCall {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub payout_address: String,
}

#[derive(Debug, Clone)]
pub enum CreateFailure {
    InvalidAddress,
    Provider(u16, String),
}

#[derive(Default)]
pub struct ScriptedProvider {
    minimums: Mutex<HashMap<Pair, String>>,
    rates: Mutex<HashMap<Pair, Decimal>>,
    failures: Mutex<HashMap<Pair, CreateFailure>>,
    statuses: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    creates: Mutex<Vec<CreateCall>>,
    min_calls: Mutex<Vec<Pair>>,
    status_calls: Mutex<HashMap<String, usize>>,
    hold_status: Mutex<Option<Arc<Notify>>>,
}

fn pair(from: &str, to: &str) -> Pair {
    (from.to_string(), to.to_string())
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_minimum(self, from: &str, to: &str, min: &str) -> Self {
        self.minimums.lock().unwrap().insert(pair(from, to), min.to_string());
        self
    }

    pub fn with_rate(self, from: &str, to: &str, rate: &str) -> Self {
        self.rates
            .lock()
            .unwrap()
            .insert(pair(from, to), Decimal::from_str(rate).unwrap());
        self
    }

    pub fn failing_create(self, from: &str, to: &str, failure: CreateFailure) -> Self {
        self.failures.lock().unwrap().insert(pair(from, to), failure);
        self
    }

    /// Script status answers for an id; `Err` entries simulate fetch failures.
    /// The last entry keeps being returned once the script runs out.
    pub fn script_statuses(&self, id: &str, answers: &[Result<&str, &str>]) {
        let queue = answers
            .iter()
            .map(|a| (*a).map(str::to_string).map_err(str::to_string))
            .collect();
        self.statuses.lock().unwrap().insert(id.to_string(), queue);
    }

    /// Block status requests until the returned handle is notified
    pub fn hold_status_requests(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold_status.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn creates(&self) -> Vec<CreateCall> {
        self.creates.lock().unwrap().clone()
    }

    pub fn min_calls(&self) -> Vec<Pair> {
        self.min_calls.lock().unwrap().clone()
    }

    pub fn status_calls(&self, id: &str) -> usize {
        self.status_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ExchangeProvider for ScriptedProvider {
    async fn min_amount(&self, from: &str, to: &str) -> SwapResult<String> {
        self.min_calls.lock().unwrap().push(pair(from, to));
        Ok(self
            .minimums
            .lock()
            .unwrap()
            .get(&pair(from, to))
            .cloned()
            .unwrap_or_else(|| "0".to_string()))
    }

    async fn exchange_range(&self, from: &str, to: &str) -> SwapResult<ExchangeRangeResponse> {
        Ok(ExchangeRangeResponse {
            min_amount: self.min_amount(from, to).await?,
            max_amount: None,
        })
    }

    async fn estimate(&self, from: &str, to: &str, amount: &str) -> SwapResult<Estimate> {
        let rate = self
            .rates
            .lock()
            .unwrap()
            .get(&pair(from, to))
            .copied()
            .unwrap_or(Decimal::ONE);
        let amount = Decimal::from_str(amount)
            .map_err(|e| SwapError::provider(400, format!("bad amount: {}", e)))?;

        Ok(Estimate {
            estimated_amount: (amount * rate).normalize().to_string(),
            transaction_speed_forecast: None,
            warning_message: None,
        })
    }

    async fn create_transaction(
        &self,
        from: &str,
        to: &str,
        amount: &str,
        payout_address: &str,
    ) -> SwapResult<CreatedTransaction> {
        if let Some(failure) = self.failures.lock().unwrap().get(&pair(from, to)).cloned() {
            return Err(match failure {
                CreateFailure::InvalidAddress => SwapError::from_create_response(
                    400,
                    r#"{"error":"not_valid_address","message":"Invalid address"}"#,
                ),
                CreateFailure::Provider(code, body) => SwapError::provider(code, body),
            });
        }

        let mut creates = self.creates.lock().unwrap();
        creates.push(CreateCall {
            from: from.to_string(),
            to: to.to_string(),
            amount: amount.to_string(),
            payout_address: payout_address.to_string(),
        });

        Ok(CreatedTransaction {
            id: format!("tx-{}-{}", from, to),
            payin_address: format!("deposit-{}-{}", from, to),
            payout_address: Some(payout_address.to_string()),
            payin_extra_id: None,
        })
    }

    async fn transaction_status(&self, id: &str) -> SwapResult<StatusResponse> {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_insert(0) += 1;

        let hold = self.hold_status.lock().unwrap().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }

        let answer = {
            let mut statuses = self.statuses.lock().unwrap();
            let queue = statuses.get_mut(id);
            match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match answer {
            Some(Ok(status)) => Ok(StatusResponse { status }),
            Some(Err(message)) => Err(SwapError::transport(message)),
            None => Err(SwapError::provider(404, "transaction not found")),
        }
    }
}

pub fn catalog(tickers: &[&str]) -> Vec<CurrencyId> {
    tickers.iter().map(|t| CurrencyId::from_ticker(*t)).collect()
}
