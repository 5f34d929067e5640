//! Swap coordination
//!
//! The coordination layer:
//! 1. Plans hop chains with minimums and quotes (`HopPlanner`)
//! 2. Creates hops last-to-first against the provider (`TransactionCreator`)
//! 3. Hands created hops to the status tracker (`SwapEngine`)

pub mod engine;
pub mod executor;
pub mod planner;

pub use engine::{PairQuote, SwapDraft, SwapEngine, SwapRequest};
pub use executor::{ExecutedPlan, TransactionCreator};
pub use planner::HopPlanner;
