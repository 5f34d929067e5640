//! Wire types for the ChangeNOW v1 API

use crate::types::CurrencyId;

use serde::{Deserialize, Deserializer, Serialize};

/// Catalog entry as returned by `/currencies`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyDto {
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub is_fiat: bool,
    #[serde(default = "default_true")]
    pub supports_fixed_rate: bool,
}

fn default_true() -> bool {
    true
}

impl CurrencyDto {
    pub fn is_swappable(&self) -> bool {
        self.supports_fixed_rate && !self.is_fiat
    }
}

impl From<CurrencyDto> for CurrencyId {
    fn from(dto: CurrencyDto) -> Self {
        CurrencyId {
            ticker: dto.ticker.to_lowercase(),
            network: dto.network.filter(|n| !n.is_empty()),
            display_name: dto.name,
            icon_ref: dto.image,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinAmountResponse {
    #[serde(deserialize_with = "decimal_string")]
    pub min_amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRangeResponse {
    #[serde(deserialize_with = "decimal_string")]
    pub min_amount: String,
    #[serde(default, deserialize_with = "optional_decimal_string")]
    pub max_amount: Option<String>,
}

/// Estimate as returned by `/exchange-amount`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    #[serde(deserialize_with = "decimal_string")]
    pub estimated_amount: String,
    #[serde(default)]
    pub transaction_speed_forecast: Option<String>,
    #[serde(default)]
    pub warning_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub amount: &'a str,
    pub address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTransaction {
    pub id: String,
    pub payin_address: String,
    #[serde(default)]
    pub payout_address: Option<String>,
    #[serde(default)]
    pub payin_extra_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Accept amounts encoded either as JSON strings or numbers
fn decimal_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected decimal amount, got {}",
            other
        ))),
    }
}

fn optional_decimal_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected decimal amount, got {}",
            other
        ))),
    }
}
