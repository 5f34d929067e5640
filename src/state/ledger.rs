//! Transaction ledger keyed by provider transaction id

use crate::types::{Status, TransactionRecord};

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

/// Single owner of mutable transaction state.
///
/// Constructed per session (or per test); all operations are synchronous.
#[derive(Default)]
pub struct Ledger {
    records: DashMap<String, TransactionRecord>,
}

/// Record counts per status
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerStats {
    pub waiting: u64,
    pub confirming: u64,
    pub exchanging: u64,
    pub sending: u64,
    pub finished: u64,
    pub failed: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, replacing any previous record with the same id
    pub fn record(&self, tx: TransactionRecord) {
        debug!("Recording transaction {} ({} -> {})", tx.id, tx.from_currency, tx.to_currency);
        self.records.insert(tx.id.clone(), tx);
    }

    pub fn get(&self, id: &str) -> Option<TransactionRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    /// Update status and `updated_at`. Unknown ids are a no-op returning `None`.
    pub fn set_status(&self, id: &str, status: Status) -> Option<TransactionRecord> {
        let mut entry = self.records.get_mut(id)?;
        entry.status = status;
        entry.updated_at = Utc::now();
        Some(entry.value().clone())
    }

    /// All records, oldest first
    pub fn list_all(&self) -> Vec<TransactionRecord> {
        self.collect(|_| true)
    }

    pub fn list_by_status(&self, status: Status) -> Vec<TransactionRecord> {
        self.collect(|r| r.status == status)
    }

    /// Records where the ticker is either the source or the target
    pub fn list_by_currency(&self, ticker: &str) -> Vec<TransactionRecord> {
        self.collect(|r| {
            r.from_currency.eq_ignore_ascii_case(ticker) || r.to_currency.eq_ignore_ascii_case(ticker)
        })
    }

    /// Administrative removal; not part of the tracked lifecycle
    pub fn delete_record(&self, id: &str) -> bool {
        self.records.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats::default();
        for entry in self.records.iter() {
            let counter = match entry.status {
                Status::Waiting => &mut stats.waiting,
                Status::Confirming => &mut stats.confirming,
                Status::Exchanging => &mut stats.exchanging,
                Status::Sending => &mut stats.sending,
                Status::Finished => &mut stats.finished,
                Status::Failed => &mut stats.failed,
            };
            *counter += 1;
        }
        stats
    }

    fn collect(&self, keep: impl Fn(&TransactionRecord) -> bool) -> Vec<TransactionRecord> {
        let mut out: Vec<TransactionRecord> = self
            .records
            .iter()
            .filter(|r| keep(r.value()))
            .map(|r| r.value().clone())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }
}
