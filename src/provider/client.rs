//! ChangeNOW v1 HTTP client

use super::types::{
    CreateTransactionRequest, CreatedTransaction, CurrencyDto, Estimate, ExchangeRangeResponse,
    MinAmountResponse, StatusResponse,
};
use super::{ConnectivityProbe, CurrencyCatalog, ExchangeProvider};
use crate::config::ProviderConfig;
use crate::error::{SwapError, SwapResult};
use crate::types::CurrencyId;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "x-changenow-api-key";

/// HTTP client for the exchange provider
pub struct ChangeNowClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ChangeNowClient {
    /// Create a new provider client
    pub fn new(config: &ProviderConfig) -> SwapResult<Self> {
        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| SwapError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> SwapResult<T> {
        debug!("GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
            .query(query)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SwapError::transport(e.to_string()))?;

        let body = read_success_body(response).await?;
        decode(&body)
    }
}

/// Body of a 2xx response, or a `Provider` error carrying the raw body
async fn read_success_body(response: Response) -> SwapResult<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SwapError::transport(e.to_string()))?;

    if status.is_success() {
        Ok(body)
    } else {
        warn!("Provider returned {}: {}", status.as_u16(), body);
        Err(SwapError::provider(status.as_u16(), body))
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> SwapResult<T> {
    serde_json::from_str(body).map_err(|e| SwapError::Provider {
        status_code: None,
        raw_body: format!("unexpected response ({}): {}", e, body),
    })
}

#[async_trait]
impl CurrencyCatalog for ChangeNowClient {
    async fn list_currencies(&self) -> SwapResult<Vec<CurrencyId>> {
        let currencies: Vec<CurrencyDto> = self
            .get_json("currencies", &[("active", "true"), ("fixedRate", "true")])
            .await?;

        let listed = currencies.len();
        let swappable: Vec<CurrencyId> = currencies
            .into_iter()
            .filter(CurrencyDto::is_swappable)
            .map(CurrencyId::from)
            .collect();

        debug!("Catalog: {} listed, {} swappable", listed, swappable.len());
        Ok(swappable)
    }
}

#[async_trait]
impl ExchangeProvider for ChangeNowClient {
    async fn min_amount(&self, from: &str, to: &str) -> SwapResult<String> {
        let response: MinAmountResponse = self
            .get_json(&format!("min-amount/{}_{}", from, to), &[])
            .await?;
        Ok(response.min_amount)
    }

    async fn exchange_range(&self, from: &str, to: &str) -> SwapResult<ExchangeRangeResponse> {
        self.get_json(&format!("exchange-range/{}_{}", from, to), &[])
            .await
    }

    async fn estimate(&self, from: &str, to: &str, amount: &str) -> SwapResult<Estimate> {
        self.get_json(&format!("exchange-amount/{}/{}_{}", amount, from, to), &[])
            .await
    }

    async fn create_transaction(
        &self,
        from: &str,
        to: &str,
        amount: &str,
        payout_address: &str,
    ) -> SwapResult<CreatedTransaction> {
        let payload = CreateTransactionRequest {
            from,
            to,
            amount,
            address: payout_address,
            extra_id: None,
            refund_address: None,
        };

        debug!("POST transactions {} {} -> {}", amount, from, to);
        let response = self
            .client
            .post(self.url(&format!("transactions/{}", self.api_key)))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SwapError::transport(e.to_string()))?;

        let body = match read_success_body(response).await {
            Ok(body) => body,
            Err(SwapError::Provider {
                status_code: Some(code),
                raw_body,
            }) => return Err(SwapError::from_create_response(code, &raw_body)),
            Err(e) => return Err(e),
        };
        decode(&body)
    }

    async fn transaction_status(&self, id: &str) -> SwapResult<StatusResponse> {
        self.get_json(&format!("transactions/{}/{}", id, self.api_key), &[])
            .await
    }
}

#[async_trait]
impl ConnectivityProbe for ChangeNowClient {
    async fn is_reachable(&self) -> bool {
        let result = self
            .client
            .get(self.url("market-info/available-pairs"))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Connectivity probe got status {}", response.status());
                false
            }
            Err(e) => {
                warn!("Connectivity probe failed: {}", e);
                false
            }
        }
    }
}
