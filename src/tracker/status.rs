//! Provider status mapping

use crate::types::Status;

/// Map a provider status string onto the internal state.
///
/// Unrecognized values map to `Waiting` so an unexpected string never ends
/// tracking.
pub fn map_provider_status(raw: &str) -> Status {
    match raw.trim().to_ascii_lowercase().as_str() {
        "new" | "waiting" => Status::Waiting,
        "confirming" => Status::Confirming,
        "exchanging" => Status::Exchanging,
        "sending" => Status::Sending,
        "finished" => Status::Finished,
        "failed" | "refunded" => Status::Failed,
        _ => Status::Waiting,
    }
}
