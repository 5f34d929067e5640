//! Network hint normalization
//!
//! Provider tickers encode the network as a short suffix (`usdtbsc`, `usdtarb`).
//! Free-text hints use many spellings for the same network; this table folds
//! them onto the suffix the provider uses.

use std::collections::HashMap;

lazy_static::lazy_static! {
    static ref NETWORK_SYNONYMS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        for alias in ["ethereum", "ether", "erc20", "erc-20"] {
            m.insert(alias, "eth");
        }
        for alias in ["binance", "binance smart chain", "bnb chain", "bep20", "bep-20"] {
            m.insert(alias, "bsc");
        }
        for alias in ["polygon", "pos"] {
            m.insert(alias, "matic");
        }
        m.insert("arbitrum", "arb");
        m.insert("optimism", "op");
        m.insert("avalanche", "avax");
        m.insert("solana", "sol");
        m.insert("fantom", "ftm");
        for alias in ["tron", "trc20", "trc-20"] {
            m.insert(alias, "trx");
        }
        m
    };
}

/// Normalize a network hint to the token found in provider tickers.
///
/// Unknown hints are returned lowercased and trimmed, so an already-short hint
/// such as `"arb"` passes through unchanged.
pub fn normalize_network(hint: &str) -> String {
    let lower = hint.trim().to_lowercase();
    if let Some(token) = NETWORK_SYNONYMS.get(lower.as_str()) {
        return token.to_string();
    }

    let stripped = [" network", " chain", " mainnet"]
        .iter()
        .find_map(|suffix| lower.strip_suffix(suffix))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&lower);

    NETWORK_SYNONYMS
        .get(stripped)
        .map(|s| s.to_string())
        .unwrap_or_else(|| stripped.to_string())
}
