//! Token resolver - maps a free-text asset mention onto a catalog currency
//!
//! Resolution order, first hit wins:
//! 1. Exact case-insensitive match on ticker or display name
//! 2. Substring match: ticker or display name contains the mention
//!
//! No match yields `None`; callers fall back to manual selection instead of
//! picking an arbitrary asset.

mod network;

pub use network::normalize_network;

use crate::types::CurrencyId;

/// Resolve a bare mention (`"eth"`, `"Tether"`) against a catalog snapshot
pub fn resolve<'a>(mention: &str, catalog: &'a [CurrencyId]) -> Option<&'a CurrencyId> {
    let needle = mention.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    exact_match(&needle, catalog).or_else(|| best_substring_match(&needle, catalog))
}

/// Resolve a mention narrowed to a network (`"usdt"` on `"binance"` -> `usdtbsc`).
///
/// Candidates must contain both the base mention and the normalized network
/// token. When none do, the best base-only match is returned, never an
/// unrelated asset.
pub fn resolve_with_network<'a>(
    mention: &str,
    network_hint: &str,
    catalog: &'a [CurrencyId],
) -> Option<&'a CurrencyId> {
    let needle = mention.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let network = normalize_network(network_hint);
    if network.is_empty() {
        return resolve(&needle, catalog);
    }

    catalog
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            let ticker = c.ticker.to_lowercase();
            let on_network = ticker.contains(&network)
                || c
                    .network
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(&network));
            ticker.contains(&needle) && on_network
        })
        .min_by_key(|(idx, c)| (!c.ticker.to_lowercase().starts_with(&needle), c.ticker.len(), *idx))
        .map(|(_, c)| c)
        .or_else(|| resolve(&needle, catalog))
}

fn exact_match<'a>(needle: &str, catalog: &'a [CurrencyId]) -> Option<&'a CurrencyId> {
    catalog
        .iter()
        .find(|c| c.ticker.eq_ignore_ascii_case(needle))
        .or_else(|| {
            catalog
                .iter()
                .find(|c| c.display_name.to_lowercase() == needle)
        })
}

/// Ticker hits rank above display-name hits; among those, prefix matches and
/// then the shortest (most specific) ticker win. Ties keep catalog order.
fn best_substring_match<'a>(needle: &str, catalog: &'a [CurrencyId]) -> Option<&'a CurrencyId> {
    catalog
        .iter()
        .enumerate()
        .filter_map(|(idx, c)| {
            let ticker = c.ticker.to_lowercase();
            let in_ticker = ticker.contains(needle);
            let in_name = c.display_name.to_lowercase().contains(needle);
            if !in_ticker && !in_name {
                return None;
            }
            let rank = (!in_ticker, !ticker.starts_with(needle), c.ticker.len(), idx);
            Some((rank, c))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, c)| c)
}
