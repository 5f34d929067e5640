//! Swap engine - orchestration entry points
//!
//! Resolves currencies, plans, executes and hands created hops to the status
//! tracker. Planning and creation errors are returned to the caller; tracking
//! outcomes go out through the tracker's event channel.

use super::executor::{ExecutedPlan, TransactionCreator};
use super::planner::HopPlanner;
use crate::config::{PlannerConfig, TrackerConfig};
use crate::error::{SwapError, SwapResult};
use crate::parser::InstructionParser;
use crate::provider::{ConnectivityProbe, CurrencyCatalog, ExchangeProvider};
use crate::quote::{parse_amount, QuoteService};
use crate::resolver;
use crate::state::Ledger;
use crate::tracker::StatusTracker;
use crate::types::{CurrencyId, HopPlan, Quote};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A swap as requested by a caller; currencies are free-text mentions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub from: String,
    pub to: String,
    /// Visible intermediary
    #[serde(default)]
    pub via: Option<String>,
    /// Route through the configured hidden intermediary
    #[serde(default)]
    pub hidden: bool,
    pub amount: String,
    pub destination_address: String,
    #[serde(default)]
    pub from_network: Option<String>,
    #[serde(default)]
    pub to_network: Option<String>,
}

/// Minimum and, when an amount was given, the estimate for one pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairQuote {
    pub from: String,
    pub to: String,
    pub min_amount: String,
    pub max_amount: Option<String>,
    pub quote: Option<Quote>,
}

/// Form pre-fill derived from a free-text instruction
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapDraft {
    pub from: Option<CurrencyId>,
    pub to: Option<CurrencyId>,
    pub via: Option<CurrencyId>,
    pub amount: Option<String>,
    pub destination_address: Option<String>,
    pub network: Option<String>,
    pub source_network: Option<String>,
    /// Mentions that did not resolve; the user picks these manually
    pub unresolved: Vec<String>,
}

pub struct SwapEngine {
    catalog_source: Arc<dyn CurrencyCatalog>,
    probe: Arc<dyn ConnectivityProbe>,
    parser: Arc<dyn InstructionParser>,
    quotes: QuoteService,
    planner: HopPlanner,
    creator: TransactionCreator,
    ledger: Arc<Ledger>,
    tracker: Arc<StatusTracker>,
    /// Catalog snapshot for the session
    catalog: RwLock<Vec<CurrencyId>>,
    reachable: AtomicBool,
}

impl SwapEngine {
    pub fn new(
        catalog_source: Arc<dyn CurrencyCatalog>,
        provider: Arc<dyn ExchangeProvider>,
        probe: Arc<dyn ConnectivityProbe>,
        parser: Arc<dyn InstructionParser>,
        planner_config: &PlannerConfig,
        tracker_config: &TrackerConfig,
    ) -> Self {
        let ledger = Arc::new(Ledger::new());
        let quotes = QuoteService::new(provider.clone());
        let planner = HopPlanner::new(
            quotes.clone(),
            CurrencyId::from_ticker(planner_config.hidden_intermediary.trim().to_lowercase()),
            planner_config.concurrent_lookups,
        );
        let creator = TransactionCreator::new(provider.clone(), ledger.clone());
        let tracker = Arc::new(StatusTracker::new(
            provider,
            ledger.clone(),
            Duration::from_millis(tracker_config.poll_interval_ms),
        ));

        Self {
            catalog_source,
            probe,
            parser,
            quotes,
            planner,
            creator,
            ledger,
            tracker,
            catalog: RwLock::new(Vec::new()),
            reachable: AtomicBool::new(false),
        }
    }

    /// Probe the provider and load the catalog. An unreachable provider leaves
    /// the engine refusing work until `connect` succeeds.
    pub async fn connect(&self) -> SwapResult<usize> {
        if !self.probe.is_reachable().await {
            self.reachable.store(false, Ordering::Release);
            warn!("Exchange provider unreachable");
            return Err(SwapError::ProviderUnreachable);
        }

        let currencies = self.catalog_source.list_currencies().await?;
        let count = currencies.len();
        *self.catalog.write().await = currencies;
        self.reachable.store(true, Ordering::Release);

        info!("Connected to exchange provider, {} currencies available", count);
        Ok(count)
    }

    pub fn is_connected(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    fn ensure_connected(&self) -> SwapResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SwapError::ProviderUnreachable)
        }
    }

    pub async fn catalog(&self) -> Vec<CurrencyId> {
        self.catalog.read().await.clone()
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    /// Resolve a mention, optionally narrowed to a network
    pub async fn resolve_currency(&self, mention: &str, network: Option<&str>) -> SwapResult<CurrencyId> {
        let catalog = self.catalog.read().await;
        let found = match network.filter(|n| !n.trim().is_empty()) {
            Some(network) => resolver::resolve_with_network(mention, network, &catalog),
            None => resolver::resolve(mention, &catalog),
        };
        found
            .cloned()
            .ok_or_else(|| SwapError::UnknownCurrency(mention.to_string()))
    }

    /// Minimum (and range) for a pair, plus an estimate when `amount` is given
    pub async fn quote_pair(&self, from: &str, to: &str, amount: Option<&str>) -> SwapResult<PairQuote> {
        self.ensure_connected()?;
        let from = self.resolve_currency(from, None).await?;
        let to = self.resolve_currency(to, None).await?;

        let range = self.quotes.get_range(&from, &to).await?;

        let quote = match amount.map(str::trim).filter(|a| !a.is_empty()) {
            Some(amount) => {
                if parse_amount(amount)? < parse_amount(&range.min_amount)? {
                    return Err(SwapError::BelowMinimum {
                        hop_index: 0,
                        required: range.min_amount,
                        actual: amount.to_string(),
                    });
                }
                Some(self.quotes.get_estimate(&from, &to, amount).await?)
            }
            None => None,
        };

        Ok(PairQuote {
            from: from.ticker,
            to: to.ticker,
            min_amount: range.min_amount,
            max_amount: range.max_amount,
            quote,
        })
    }

    /// Build a plan for a request without creating anything
    pub async fn plan(&self, request: &SwapRequest) -> SwapResult<HopPlan> {
        self.ensure_connected()?;

        let from = self
            .resolve_currency(&request.from, request.from_network.as_deref())
            .await?;
        let to = self
            .resolve_currency(&request.to, request.to_network.as_deref())
            .await?;
        let via = match request.via.as_deref().filter(|v| !v.trim().is_empty()) {
            Some(via) => Some(self.resolve_currency(via, None).await?),
            None => None,
        };

        match (request.hidden, via) {
            (true, Some(_)) => Err(SwapError::InvalidPlan(
                "a hidden-hop swap cannot also name an intermediary".to_string(),
            )),
            (true, None) => {
                self.planner
                    .build_hidden_plan(&from, &to, &request.amount, &request.destination_address)
                    .await
            }
            (false, via) => {
                let path: Vec<CurrencyId> = std::iter::once(from)
                    .chain(via)
                    .chain(std::iter::once(to))
                    .collect();
                self.planner
                    .build_plan(&path, &request.amount, &request.destination_address)
                    .await
            }
        }
    }

    /// Execute a plan and start tracking every hop it created. Orphaned hops
    /// from a partial failure are tracked too so they stay visible.
    pub async fn execute(&self, plan: &HopPlan) -> SwapResult<ExecutedPlan> {
        self.ensure_connected()?;

        match self.creator.execute(plan).await {
            Ok(executed) => {
                for record in &executed.records {
                    self.tracker.track(&record.id);
                }
                info!(
                    "Plan {} executed: send {} to {}",
                    executed.plan_id, executed.deposit_amount, executed.deposit_address
                );
                Ok(executed)
            }
            Err(SwapError::PlanExecution {
                failed_hop_index,
                cause,
                orphaned,
            }) => {
                for record in &orphaned {
                    self.tracker.track(&record.id);
                }
                Err(SwapError::PlanExecution {
                    failed_hop_index,
                    cause,
                    orphaned,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Plan and execute in one step
    pub async fn swap(&self, request: &SwapRequest) -> SwapResult<ExecutedPlan> {
        let plan = self.plan(request).await?;
        self.execute(&plan).await
    }

    /// Turn free text into a form pre-fill. Never fails: anything the parser
    /// or resolver cannot settle is left for manual entry.
    pub async fn interpret(&self, text: &str) -> SwapDraft {
        let catalog = self.catalog().await;
        let Some(parsed) = self.parser.parse(text, &catalog).await else {
            return SwapDraft::default();
        };

        let mut draft = SwapDraft {
            amount: parsed.amount.clone(),
            destination_address: parsed.destination_address.clone(),
            network: parsed.network.clone(),
            source_network: parsed.source_network.clone(),
            ..SwapDraft::default()
        };

        let mut settle = |mention: &Option<String>, found: Option<&CurrencyId>| {
            if let Some(mention) = mention {
                if found.is_none() {
                    draft.unresolved.push(mention.clone());
                }
            }
            found.cloned()
        };

        let resolve_on = |mention: &str, network: &Option<String>| match network {
            Some(network) => resolver::resolve_with_network(mention, network, &catalog),
            None => resolver::resolve(mention, &catalog),
        };

        // The general network hint belongs to the destination; the source only
        // takes one the instruction attached to it explicitly
        let from = parsed
            .from_token
            .as_deref()
            .and_then(|m| resolve_on(m, &parsed.source_network));
        let from = settle(&parsed.from_token, from);

        let to = parsed
            .to_token
            .as_deref()
            .and_then(|m| resolve_on(m, &parsed.network));
        let to = settle(&parsed.to_token, to);

        let via = parsed
            .via_token
            .as_deref()
            .and_then(|m| resolver::resolve(m, &catalog));
        let via = settle(&parsed.via_token, via);

        draft.from = from;
        draft.to = to;
        draft.via = via;
        draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PatternParser;
    use crate::provider::{MockConnectivityProbe, MockCurrencyCatalog};
    use crate::testing::{catalog, CreateFailure, ScriptedProvider};
    use crate::types::Status;

    fn engine_with(provider: Arc<ScriptedProvider>, reachable: bool, tickers: &[&str]) -> SwapEngine {
        let currencies = catalog(tickers);
        let mut catalog_source = MockCurrencyCatalog::new();
        catalog_source
            .expect_list_currencies()
            .returning(move || Ok(currencies.clone()));
        let mut probe = MockConnectivityProbe::new();
        probe.expect_is_reachable().return_const(reachable);

        SwapEngine::new(
            Arc::new(catalog_source),
            provider,
            Arc::new(probe),
            Arc::new(PatternParser::new()),
            &PlannerConfig::default(),
            &TrackerConfig::default(),
        )
    }

    fn request(from: &str, via: Option<&str>, to: &str) -> SwapRequest {
        SwapRequest {
            from: from.to_string(),
            to: to.to_string(),
            via: via.map(str::to_string),
            amount: "1".to_string(),
            destination_address: "0xABC".to_string(),
            ..SwapRequest::default()
        }
    }

    const TICKERS: &[&str] = &["btc", "eth", "usdt", "xmr", "usdtbsc"];

    #[tokio::test]
    async fn test_unreachable_provider_blocks_work() {
        let engine = engine_with(Arc::new(ScriptedProvider::new()), false, TICKERS);
        assert!(matches!(engine.connect().await, Err(SwapError::ProviderUnreachable)));
        assert!(!engine.is_connected());

        let err = engine.plan(&request("btc", None, "eth")).await.unwrap_err();
        assert!(matches!(err, SwapError::ProviderUnreachable));
    }

    #[tokio::test]
    async fn test_multi_hop_swap_end_to_end() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_rate("btc", "eth", "16")
                .with_rate("eth", "usdt", "2500"),
        );
        let engine = engine_with(provider.clone(), true, TICKERS);
        assert_eq!(engine.connect().await.unwrap(), TICKERS.len());

        let executed = engine
            .swap(&request("btc", Some("eth"), "usdt"))
            .await
            .unwrap();

        let creates = provider.creates();
        assert_eq!(creates[0].from, "eth");
        assert_eq!(creates[1].from, "btc");
        assert_eq!(creates[1].payout_address, "deposit-eth-usdt");
        assert_eq!(executed.deposit_address, "deposit-btc-eth");
        assert_eq!(executed.estimated_output, "40000");

        assert!(engine.tracker().is_tracked("tx-btc-eth"));
        assert!(engine.tracker().is_tracked("tx-eth-usdt"));
        assert_eq!(engine.ledger().list_by_status(Status::Waiting).len(), 2);
    }

    #[tokio::test]
    async fn test_hidden_swap_goes_through_intermediary() {
        let provider = Arc::new(ScriptedProvider::new());
        let engine = engine_with(provider.clone(), true, TICKERS);
        engine.connect().await.unwrap();

        let mut req = request("btc", None, "eth");
        req.hidden = true;
        let executed = engine.swap(&req).await.unwrap();

        assert_eq!(executed.records.len(), 2);
        assert_eq!(executed.records[0].to_currency, "xmr");
        assert_eq!(executed.records[1].from_currency, "xmr");

        req.via = Some("usdt".to_string());
        assert!(matches!(
            engine.plan(&req).await.unwrap_err(),
            SwapError::InvalidPlan(_)
        ));
    }

    #[tokio::test]
    async fn test_partial_failure_tracks_orphans() {
        let provider = Arc::new(ScriptedProvider::new().failing_create(
            "btc",
            "eth",
            CreateFailure::Provider(502, "bad gateway".to_string()),
        ));
        let engine = engine_with(provider, true, TICKERS);
        engine.connect().await.unwrap();

        let err = engine
            .swap(&request("btc", Some("eth"), "usdt"))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::PlanExecution { failed_hop_index: 0, .. }));
        assert!(engine.ledger().get("tx-eth-usdt").is_some());
        assert!(engine.tracker().is_tracked("tx-eth-usdt"));
    }

    #[tokio::test]
    async fn test_unknown_currency() {
        let engine = engine_with(Arc::new(ScriptedProvider::new()), true, TICKERS);
        engine.connect().await.unwrap();
        let err = engine.plan(&request("doge", None, "eth")).await.unwrap_err();
        assert!(matches!(err, SwapError::UnknownCurrency(ref m) if m == "doge"));
    }

    #[tokio::test]
    async fn test_quote_pair() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_minimum("btc", "eth", "0.01")
                .with_rate("btc", "eth", "16"),
        );
        let engine = engine_with(provider, true, TICKERS);
        engine.connect().await.unwrap();

        let quote = engine.quote_pair("btc", "eth", Some("2")).await.unwrap();
        assert_eq!(quote.min_amount, "0.01");
        assert_eq!(quote.quote.unwrap().estimated_output, "32");

        let no_amount = engine.quote_pair("btc", "eth", None).await.unwrap();
        assert!(no_amount.quote.is_none());

        let err = engine.quote_pair("btc", "eth", Some("0.001")).await.unwrap_err();
        assert!(matches!(err, SwapError::BelowMinimum { .. }));
    }

    #[tokio::test]
    async fn test_interpret_applies_network_to_destination_only() {
        let engine = engine_with(Arc::new(ScriptedProvider::new()), true, TICKERS);
        engine.connect().await.unwrap();

        let draft = engine
            .interpret("swap 50 usdt to usdt on binance to 0x742d35Cc6634C0532925a3b844Bc454e4438f44e")
            .await;
        assert_eq!(draft.from.unwrap().ticker, "usdt");
        assert_eq!(draft.to.unwrap().ticker, "usdtbsc");
        assert_eq!(draft.amount.as_deref(), Some("50"));
        assert!(draft.destination_address.is_some());
        assert!(draft.unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_interpret_applies_explicit_source_network() {
        let engine = engine_with(
            Arc::new(ScriptedProvider::new()),
            true,
            &["btc", "eth", "usdt", "usdtarb", "usdtbsc"],
        );
        engine.connect().await.unwrap();

        let draft = engine.interpret("swap 50 usdt on arbitrum to usdt on bsc").await;
        assert_eq!(draft.from.unwrap().ticker, "usdtarb");
        assert_eq!(draft.to.unwrap().ticker, "usdtbsc");
        assert_eq!(draft.source_network.as_deref(), Some("arbitrum"));

        let draft = engine.interpret("swap 50 usdt to usdt on bsc").await;
        assert_eq!(draft.from.unwrap().ticker, "usdt");
        assert_eq!(draft.to.unwrap().ticker, "usdtbsc");
    }

    #[tokio::test]
    async fn test_interpret_leaves_unknowns_for_manual_entry() {
        let engine = engine_with(Arc::new(ScriptedProvider::new()), true, TICKERS);
        engine.connect().await.unwrap();

        let draft = engine.interpret("swap 3 doge to eth").await;
        assert!(draft.from.is_none());
        assert_eq!(draft.to.unwrap().ticker, "eth");
        assert_eq!(draft.unresolved, vec!["doge".to_string()]);

        let empty = engine.interpret("what is the weather").await;
        assert!(empty.from.is_none() && empty.to.is_none() && empty.amount.is_none());
    }
}
