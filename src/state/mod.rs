//! In-memory state for executed hops
//!
//! Handles:
//! - Transaction records, one per executed hop
//! - Status updates driven by the tracker
//! - Administrative deletion
//!
//! Process-lifetime only; nothing survives a restart.

mod ledger;

pub use ledger::{Ledger, LedgerStats};
