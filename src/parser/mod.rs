//! Free-text swap instructions
//!
//! Parsing is a pluggable capability: anything that turns text into the
//! structured fields below can sit behind `InstructionParser`. Its output only
//! pre-fills a swap request; a `None` or partial result never blocks manual
//! entry.

mod pattern;

pub use pattern::PatternParser;

use crate::types::CurrencyId;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Structured fields extracted from an instruction. Tokens are raw mentions,
/// not yet resolved against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    pub from_token: Option<String>,
    pub to_token: Option<String>,
    pub via_token: Option<String>,
    pub amount: Option<String>,
    pub destination_address: Option<String>,
    /// Network hint for the destination token
    pub network: Option<String>,
    /// Network hint stated explicitly for the source token
    pub source_network: Option<String>,
}

impl ParsedInstruction {
    pub fn is_empty(&self) -> bool {
        self == &ParsedInstruction::default()
    }
}

#[async_trait]
pub trait InstructionParser: Send + Sync {
    async fn parse(&self, text: &str, catalog: &[CurrencyId]) -> Option<ParsedInstruction>;
}
