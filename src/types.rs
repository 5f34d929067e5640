//! Core data model shared by planning, execution, the ledger and tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete currency as listed by the provider catalog.
///
/// The ticker is the unique key; by provider convention it already encodes the
/// network (`usdtarb`, `usdtbsc`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyId {
    pub ticker: String,
    pub network: Option<String>,
    pub display_name: String,
    pub icon_ref: String,
}

impl CurrencyId {
    /// Currency known only by its ticker
    pub fn from_ticker(ticker: impl Into<String>) -> Self {
        let ticker = ticker.into();
        Self {
            display_name: ticker.to_uppercase(),
            ticker,
            network: None,
            icon_ref: String::new(),
        }
    }
}

impl fmt::Display for CurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ticker)
    }
}

/// Estimated output for a given input amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub estimated_output: String,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinAmount {
    pub value: String,
}

/// Allowed input range for a currency pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRange {
    pub min_amount: String,
    pub max_amount: Option<String>,
}

/// Where a hop sends its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "camelCase")]
pub enum PayoutTarget {
    /// Deposit address of the following hop, known only once that hop is created
    NextHopDeposit,
    /// Concrete address
    Address(String),
}

impl PayoutTarget {
    pub fn address(&self) -> Option<&str> {
        match self {
            PayoutTarget::NextHopDeposit => None,
            PayoutTarget::Address(address) => Some(address),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopSpec {
    pub sequence_index: usize,
    pub from_currency: CurrencyId,
    pub to_currency: CurrencyId,
    pub input_amount: String,
    pub payout_address: PayoutTarget,
    /// Quoted output at plan time; feeds the next hop's input
    pub estimated_output: String,
    pub minimum: String,
}

/// Ordered chain of hops, first to last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopPlan {
    pub plan_id: uuid::Uuid,
    pub hops: Vec<HopSpec>,
    pub destination_address: String,
    /// Intermediary inserted without being part of the caller's path
    pub hidden_intermediary: Option<CurrencyId>,
    pub warnings: Vec<String>,
}

impl HopPlan {
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Amount the end user has to send
    pub fn input_amount(&self) -> Option<&str> {
        self.hops.first().map(|h| h.input_amount.as_str())
    }

    /// Final quoted amount reaching the destination
    pub fn estimated_output(&self) -> Option<&str> {
        self.hops.last().map(|h| h.estimated_output.as_str())
    }
}

/// Internal transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Waiting,
    Confirming,
    Exchanging,
    Sending,
    Finished,
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Finished | Status::Failed)
    }

    /// Position on the happy path; `Failed` sits outside it
    fn rank(&self) -> Option<u8> {
        match self {
            Status::Waiting => Some(0),
            Status::Confirming => Some(1),
            Status::Exchanging => Some(2),
            Status::Sending => Some(3),
            Status::Finished => Some(4),
            Status::Failed => None,
        }
    }

    /// Whether the tracker may move a record from `self` to `next`.
    ///
    /// Forward moves along the happy path are allowed (the provider may skip
    /// intermediate states between two polls), `Failed` is reachable from any
    /// non-terminal state, and nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: Status) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(target)) => target > current,
            (None, _) => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Waiting => "waiting",
            Status::Confirming => "confirming",
            Status::Exchanging => "exchanging",
            Status::Sending => "sending",
            Status::Finished => "finished",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed hop as stored in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub amount: String,
    pub estimated_amount: String,
    pub payin_address: String,
    pub payout_address: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Fresh record; always starts in `Waiting`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        from_currency: impl Into<String>,
        to_currency: impl Into<String>,
        amount: impl Into<String>,
        estimated_amount: impl Into<String>,
        payin_address: impl Into<String>,
        payout_address: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            from_currency: from_currency.into(),
            to_currency: to_currency.into(),
            amount: amount.into(),
            estimated_amount: estimated_amount.into(),
            payin_address: payin_address.into(),
            payout_address: payout_address.into(),
            status: Status::Waiting,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(Status::Waiting.can_transition_to(Status::Confirming));
        assert!(Status::Confirming.can_transition_to(Status::Exchanging));
        assert!(Status::Sending.can_transition_to(Status::Finished));
        assert!(Status::Waiting.can_transition_to(Status::Exchanging));
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        for status in [
            Status::Waiting,
            Status::Confirming,
            Status::Exchanging,
            Status::Sending,
        ] {
            assert!(status.can_transition_to(Status::Failed));
        }
        assert!(!Status::Finished.can_transition_to(Status::Failed));
        assert!(!Status::Failed.can_transition_to(Status::Waiting));
    }

    #[test]
    fn test_no_backward_moves() {
        assert!(!Status::Exchanging.can_transition_to(Status::Waiting));
        assert!(!Status::Waiting.can_transition_to(Status::Waiting));
    }
}
