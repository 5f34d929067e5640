//! hopswap - multi-hop crypto exchange orchestration
//!
//! Plans chains of exchanges through a brokered provider, creates them last
//! hop first so every hop pays into the next one's deposit address, and tracks
//! each created hop until it finishes or fails.

pub mod api;
pub mod config;
pub mod coordination;
pub mod error;
pub mod events;
pub mod metrics;
pub mod parser;
pub mod provider;
pub mod quote;
pub mod resolver;
pub mod state;
pub mod tracker;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use coordination::{SwapEngine, SwapRequest};
pub use error::{SwapError, SwapResult};
