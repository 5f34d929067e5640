//! Regex-based instruction parser

use super::{InstructionParser, ParsedInstruction};
use crate::types::CurrencyId;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SWAP: Regex = Regex::new(
        r"(?i)\b(?:swap|convert|exchange|send)\s+(\d+(?:\.\d+)?)\s+(?:of\s+)?(?:from\s+)?([a-z0-9]+)(?:\s+on\s+(?:the\s+)?([a-z0-9][a-z0-9 \-]*?))?\s+(?:to|into|for)\s+([a-z0-9]+)"
    )
    .expect("static pattern");
    static ref VIA: Regex = Regex::new(r"(?i)\b(?:via|through)\s+([a-z0-9]+)").expect("static pattern");
    static ref NETWORK: Regex =
        Regex::new(r"(?i)\bon\s+(?:the\s+)?([a-z0-9][a-z0-9 \-]*?)(?:\s+(?:to|at|via)\b|[,.]|$)")
            .expect("static pattern");
    static ref EVM_ADDRESS: Regex = Regex::new(r"\b0x[a-fA-F0-9]{40}\b").expect("static pattern");
    static ref BECH32_ADDRESS: Regex = Regex::new(r"\bbc1[a-z0-9]{25,62}\b").expect("static pattern");
}

/// Recognises `swap <amount> [from] <a> [on <network>] to <b> [via <c>] [on <network>] [<address>]`.
///
/// A network named right after the source token applies to the source; one
/// named after the destination token applies to the destination.
#[derive(Debug, Default, Clone)]
pub struct PatternParser;

impl PatternParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_text(&self, text: &str) -> Option<ParsedInstruction> {
        let mut parsed = ParsedInstruction::default();

        // Destination network phrases follow the swap clause
        let mut tail = text;
        if let Some(caps) = SWAP.captures(text) {
            parsed.amount = Some(caps[1].to_string());
            parsed.from_token = Some(caps[2].to_lowercase());
            parsed.source_network = caps
                .get(3)
                .map(|m| m.as_str().trim().to_lowercase())
                .filter(|n| !n.is_empty());
            parsed.to_token = Some(caps[4].to_lowercase());
            if let Some(whole) = caps.get(0) {
                tail = &text[whole.end()..];
            }
        }

        parsed.via_token = VIA.captures(text).map(|c| c[1].to_lowercase());

        parsed.network = NETWORK
            .captures(tail)
            .map(|c| c[1].trim().to_lowercase())
            .filter(|n| !n.is_empty());

        parsed.destination_address = EVM_ADDRESS
            .find(text)
            .or_else(|| BECH32_ADDRESS.find(text))
            .map(|m| m.as_str().to_string());

        if parsed.is_empty() {
            None
        } else {
            Some(parsed)
        }
    }
}

#[async_trait]
impl InstructionParser for PatternParser {
    async fn parse(&self, text: &str, _catalog: &[CurrencyId]) -> Option<ParsedInstruction> {
        self.parse_text(text)
    }
}
