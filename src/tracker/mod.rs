//! Status tracking for created hops
//!
//! Each tracked id is polled against the provider until it reaches a terminal
//! state or tracking is stopped. Results update the ledger and are published
//! to observers as `TrackerEvent`s.

mod poller;
mod status;

pub use poller::{PollOutcome, StatusTracker};
pub use status::map_provider_status;
