//! Error types for the swap engine

use crate::types::TransactionRecord;
use thiserror::Error;

/// Provider error code for a rejected payout address
const INVALID_ADDRESS_CODE: &str = "not_valid_address";

/// Main error type for planning, execution and tracking
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Exchange provider is unreachable")]
    ProviderUnreachable,

    #[error("Provider error ({}): {raw_body}", status_label(*status_code))]
    Provider {
        status_code: Option<u16>,
        raw_body: String,
    },

    #[error("Invalid address: {message}")]
    InvalidAddress { message: String },

    #[error("Hop {hop_index} is below the minimum: need {required}, have {actual}")]
    BelowMinimum {
        hop_index: usize,
        required: String,
        actual: String,
    },

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Plan execution failed at hop {failed_hop_index}: {cause}")]
    PlanExecution {
        failed_hop_index: usize,
        cause: Box<SwapError>,
        /// Hops already created upstream of the failure; the provider cannot cancel them
        orphaned: Vec<TransactionRecord>,
    },

    #[error("Status poll failed for {tx_id}: {message}")]
    PollTransient { tx_id: String, message: String },

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn status_label(status_code: Option<u16>) -> String {
    match status_code {
        Some(code) => format!("status {}", code),
        None => "transport".to_string(),
    }
}

impl SwapError {
    /// Non-2xx response from the provider
    pub fn provider(status_code: u16, raw_body: impl Into<String>) -> Self {
        SwapError::Provider {
            status_code: Some(status_code),
            raw_body: raw_body.into(),
        }
    }

    /// Request never produced a response
    pub fn transport(message: impl Into<String>) -> Self {
        SwapError::Provider {
            status_code: None,
            raw_body: message.into(),
        }
    }

    /// Classify a failed transaction-create response.
    ///
    /// Address rejections are reported as `InvalidAddress` so callers can show a
    /// field-level error; everything else stays a generic `Provider` error.
    pub fn from_create_response(status_code: u16, raw_body: &str) -> Self {
        let lower = raw_body.to_lowercase();
        if lower.contains(INVALID_ADDRESS_CODE)
            || lower.contains("address")
            || lower.contains("invalid")
        {
            SwapError::InvalidAddress {
                message: provider_message(raw_body),
            }
        } else {
            SwapError::provider(status_code, raw_body)
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            SwapError::Provider { status_code, .. } => match status_code {
                None => true,
                Some(code) => *code == 429 || *code >= 500,
            },
            SwapError::PollTransient { .. } => true,
            _ => false,
        }
    }

    /// True for address rejections, including ones wrapped by a plan failure
    pub fn is_invalid_address(&self) -> bool {
        match self {
            SwapError::InvalidAddress { .. } => true,
            SwapError::PlanExecution { cause, .. } => cause.is_invalid_address(),
            _ => false,
        }
    }

    /// Message suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            SwapError::Provider { raw_body, .. } => provider_message(raw_body),
            SwapError::InvalidAddress { message } => message.clone(),
            SwapError::PlanExecution { cause, .. } => cause.user_message(),
            other => other.to_string(),
        }
    }
}

/// Extract a readable message from a provider error body
pub fn provider_message(raw_body: &str) -> String {
    if raw_body.contains(INVALID_ADDRESS_CODE) {
        return "Invalid recipient address for this cryptocurrency".to_string();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw_body) {
        for key in ["message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
    }

    raw_body.trim().to_string()
}

/// Result type for swap operations
pub type SwapResult<T> = Result<T, SwapError>;
