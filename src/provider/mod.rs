//! Exchange provider boundary
//!
//! The engine talks to three collaborators:
//! - a currency catalog (`CurrencyCatalog`)
//! - the exchange itself: minimums, estimates, creation and status (`ExchangeProvider`)
//! - a connectivity probe used once at startup (`ConnectivityProbe`)
//!
//! `ChangeNowClient` implements all three against the ChangeNOW v1 HTTP API.

pub mod client;
pub mod types;

pub use client::ChangeNowClient;
pub use types::{CreatedTransaction, Estimate, ExchangeRangeResponse, StatusResponse};

use crate::error::SwapResult;
use crate::types::CurrencyId;

use async_trait::async_trait;

/// Source of the currency catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CurrencyCatalog: Send + Sync {
    /// Active currencies that support fixed-rate quoting
    async fn list_currencies(&self) -> SwapResult<Vec<CurrencyId>>;
}

/// Remote exchange provider. Currencies are addressed by ticker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeProvider: Send + Sync {
    async fn min_amount(&self, from: &str, to: &str) -> SwapResult<String>;

    async fn exchange_range(&self, from: &str, to: &str) -> SwapResult<ExchangeRangeResponse>;

    async fn estimate(&self, from: &str, to: &str, amount: &str) -> SwapResult<Estimate>;

    async fn create_transaction(
        &self,
        from: &str,
        to: &str,
        amount: &str,
        payout_address: &str,
    ) -> SwapResult<CreatedTransaction>;

    async fn transaction_status(&self, id: &str) -> SwapResult<StatusResponse>;
}

/// Startup reachability check
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}
