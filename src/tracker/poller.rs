//! Poll loop driving ledger records through the status state machine

use super::status::map_provider_status;
use crate::error::{SwapError, SwapResult};
use crate::events::TrackerEvent;
use crate::provider::ExchangeProvider;
use crate::state::Ledger;
use crate::types::Status;

use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Result of a single poll for one id
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Id is not in the poll set
    NotTracked,
    /// Previous request for this id still running
    Skipped,
    /// Provider answered, state unchanged
    Unchanged(Status),
    Changed { from: Status, to: Status },
    /// Terminal state reached; id removed from the poll set
    Finished(Status),
    /// Fetch failed; state unchanged, retried next cycle
    Transient(String),
    /// Tracking stopped while the request was in flight; result dropped
    Discarded,
    /// Ledger record disappeared; tracking stopped
    Stopped,
}

/// Resets the per-id in-flight flag when a poll completes
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Status tracker for created hops
pub struct StatusTracker {
    provider: Arc<dyn ExchangeProvider>,
    ledger: Arc<Ledger>,
    /// Tracked ids and their in-flight flag
    tracked: DashMap<String, Arc<AtomicBool>>,
    /// Observer channel
    event_tx: broadcast::Sender<TrackerEvent>,
    poll_interval: Duration,
    /// Shutdown flag
    shutdown: Arc<RwLock<bool>>,
}

impl StatusTracker {
    pub fn new(provider: Arc<dyn ExchangeProvider>, ledger: Arc<Ledger>, poll_interval: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            provider,
            ledger,
            tracked: DashMap::new(),
            event_tx,
            poll_interval,
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Subscribe to tracker events
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.event_tx.subscribe()
    }

    /// Start polling a ledger record. Returns `false` if the id is unknown to
    /// the ledger, already terminal or already tracked. Re-tracking keeps the
    /// existing entry so an in-flight request still blocks the next poll.
    pub fn track(&self, tx_id: &str) -> bool {
        let Some(record) = self.ledger.get(tx_id) else {
            warn!("Cannot track {}: not in ledger", tx_id);
            return false;
        };
        if record.status.is_terminal() {
            debug!("Not tracking {}: already {}", tx_id, record.status);
            return false;
        }

        let inserted = match self.tracked.entry(tx_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(AtomicBool::new(false)));
                true
            }
        };
        if !inserted {
            debug!("Already tracking {}", tx_id);
            return false;
        }

        crate::metrics::record_tracked(self.tracked.len());
        self.emit(TrackerEvent::TrackingStarted {
            tx_id: tx_id.to_string(),
        });
        true
    }

    /// Stop polling an id. A request already in flight completes but its
    /// result is discarded.
    pub fn untrack(&self, tx_id: &str) -> bool {
        self.stop_tracking(tx_id, "stopped by caller")
    }

    pub fn is_tracked(&self, tx_id: &str) -> bool {
        self.tracked.contains_key(tx_id)
    }

    pub fn tracked_ids(&self) -> Vec<String> {
        self.tracked.iter().map(|e| e.key().clone()).collect()
    }

    /// Poll the provider once for `tx_id` and apply the result
    pub async fn poll_once(&self, tx_id: &str) -> PollOutcome {
        let flag = match self.tracked.get(tx_id) {
            Some(entry) => entry.value().clone(),
            None => return PollOutcome::NotTracked,
        };

        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Skipping poll for {}: previous request in flight", tx_id);
            return PollOutcome::Skipped;
        }
        let _in_flight = InFlight(flag.clone());

        match self.ledger.get(tx_id).map(|r| r.status) {
            None => {
                self.stop_tracking(tx_id, "record removed from ledger");
                return PollOutcome::Stopped;
            }
            Some(status) if status.is_terminal() => {
                self.finish(tx_id, &flag, status);
                return PollOutcome::Finished(status);
            }
            Some(_) => {}
        }

        let result = self.provider.transaction_status(tx_id).await;

        let still_tracked = self
            .tracked
            .get(tx_id)
            .map(|entry| Arc::ptr_eq(entry.value(), &flag))
            .unwrap_or(false);
        if !still_tracked {
            debug!("Discarding status for {}: no longer tracked", tx_id);
            return PollOutcome::Discarded;
        }

        let response = match result {
            Ok(response) => {
                crate::metrics::record_status_poll();
                response
            }
            Err(e) => {
                crate::metrics::record_poll_failure();
                let message = SwapError::PollTransient {
                    tx_id: tx_id.to_string(),
                    message: e.user_message(),
                }
                .to_string();
                self.emit(TrackerEvent::PollFailed {
                    tx_id: tx_id.to_string(),
                    message: message.clone(),
                    retryable: e.is_retryable(),
                });
                return PollOutcome::Transient(message);
            }
        };

        let Some(current) = self.ledger.get(tx_id).map(|r| r.status) else {
            self.stop_tracking(tx_id, "record removed from ledger");
            return PollOutcome::Stopped;
        };

        let next = map_provider_status(&response.status);
        if !current.can_transition_to(next) {
            if next != current {
                debug!(
                    "Ignoring {} -> {} for {} (provider said {:?})",
                    current, next, tx_id, response.status
                );
            }
            return PollOutcome::Unchanged(current);
        }

        if self.ledger.set_status(tx_id, next).is_none() {
            self.stop_tracking(tx_id, "record removed from ledger");
            return PollOutcome::Stopped;
        }

        info!("Transaction {}: {} -> {}", tx_id, current, next);
        crate::metrics::record_status_transition(next);
        self.emit(TrackerEvent::StatusChanged {
            tx_id: tx_id.to_string(),
            from: current,
            to: next,
            provider_status: response.status,
        });

        if next.is_terminal() {
            self.finish(tx_id, &flag, next);
            return PollOutcome::Finished(next);
        }

        PollOutcome::Changed {
            from: current,
            to: next,
        }
    }

    /// Poll every tracked id once, concurrently
    pub async fn poll_cycle(&self) -> Vec<(String, PollOutcome)> {
        let ids = self.tracked_ids();
        let outcomes = futures::future::join_all(ids.iter().map(|id| self.poll_once(id))).await;
        ids.into_iter().zip(outcomes).collect()
    }

    /// Main poll loop
    pub async fn run(self: Arc<Self>) -> SwapResult<()> {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Status tracker started (interval {:?})", self.poll_interval);

        loop {
            ticker.tick().await;

            if *self.shutdown.read().await {
                break;
            }

            // Each id polls on its own task; a slow id never holds up the others
            for tx_id in self.tracked_ids() {
                let tracker = self.clone();
                tokio::spawn(async move {
                    tracker.poll_once(&tx_id).await;
                });
            }
        }

        info!("Status tracker stopped");
        Ok(())
    }

    /// Stop the poll loop
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        info!("Status tracker shutdown initiated");
    }

    fn finish(&self, tx_id: &str, flag: &Arc<AtomicBool>, status: Status) {
        if self
            .tracked
            .remove_if(tx_id, |_, entry| Arc::ptr_eq(entry, flag))
            .is_some()
        {
            crate::metrics::record_tracked(self.tracked.len());
            self.emit(TrackerEvent::TrackingFinished {
                tx_id: tx_id.to_string(),
                status,
            });
        }
    }

    fn stop_tracking(&self, tx_id: &str, reason: &str) -> bool {
        if self.tracked.remove(tx_id).is_none() {
            return false;
        }
        crate::metrics::record_tracked(self.tracked.len());
        self.emit(TrackerEvent::TrackingStopped {
            tx_id: tx_id.to_string(),
            reason: reason.to_string(),
        });
        true
    }

    fn emit(&self, event: TrackerEvent) {
        if event.is_failure() {
            warn!("Tracker event {} for {}: {:?}", event.name(), event.tx_id(), event);
        } else {
            debug!("Tracker event {} for {}", event.name(), event.tx_id());
        }
        // No subscribers is fine; the ledger already holds the state
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use crate::types::TransactionRecord;

    fn setup(id: &str) -> (Arc<StatusTracker>, Arc<ScriptedProvider>, Arc<Ledger>) {
        let provider = Arc::new(ScriptedProvider::new());
        let ledger = Arc::new(Ledger::new());
        ledger.record(TransactionRecord::new(
            id, "btc", "eth", "1", "16", "deposit", "0xABC",
        ));
        let tracker = Arc::new(StatusTracker::new(
            provider.clone(),
            ledger.clone(),
            Duration::from_millis(10),
        ));
        assert!(tracker.track(id));
        (tracker, provider, ledger)
    }

    fn drain(rx: &mut broadcast::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_happy_path_sequence() {
        let (tracker, provider, ledger) = setup("tx1");
        let mut rx = tracker.subscribe();
        provider.script_statuses(
            "tx1",
            &[Ok("new"), Ok("confirming"), Ok("exchanging"), Ok("sending"), Ok("finished")],
        );

        assert_eq!(tracker.poll_once("tx1").await, PollOutcome::Unchanged(Status::Waiting));
        let mut seen = vec![ledger.get("tx1").unwrap().status];
        for _ in 0..4 {
            tracker.poll_once("tx1").await;
            seen.push(ledger.get("tx1").unwrap().status);
        }
        assert_eq!(
            seen,
            vec![
                Status::Waiting,
                Status::Confirming,
                Status::Exchanging,
                Status::Sending,
                Status::Finished
            ]
        );

        // Terminal: no further polling
        assert!(!tracker.is_tracked("tx1"));
        assert_eq!(tracker.poll_once("tx1").await, PollOutcome::NotTracked);
        assert_eq!(provider.status_calls("tx1"), 5);

        let events = drain(&mut rx);
        let finished = events
            .iter()
            .filter(|e| matches!(e, TrackerEvent::TrackingFinished { .. }))
            .count();
        assert_eq!(finished, 1);
        let changes = events
            .iter()
            .filter(|e| matches!(e, TrackerEvent::StatusChanged { .. }))
            .count();
        assert_eq!(changes, 4);
    }

    #[tokio::test]
    async fn test_unknown_status_stays_waiting() {
        let (tracker, provider, ledger) = setup("tx1");
        provider.script_statuses("tx1", &[Ok("verifying")]);

        assert_eq!(tracker.poll_once("tx1").await, PollOutcome::Unchanged(Status::Waiting));
        assert_eq!(ledger.get("tx1").unwrap().status, Status::Waiting);
        assert!(tracker.is_tracked("tx1"));
    }

    #[tokio::test]
    async fn test_refunded_is_failed_and_terminal() {
        let (tracker, provider, ledger) = setup("tx1");
        provider.script_statuses("tx1", &[Ok("confirming"), Ok("refunded")]);

        tracker.poll_once("tx1").await;
        assert_eq!(tracker.poll_once("tx1").await, PollOutcome::Finished(Status::Failed));
        assert_eq!(ledger.get("tx1").unwrap().status, Status::Failed);
        assert!(!tracker.is_tracked("tx1"));
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_state() {
        let (tracker, provider, ledger) = setup("tx1");
        let mut rx = tracker.subscribe();
        provider.script_statuses("tx1", &[Ok("confirming"), Err("connection reset"), Ok("exchanging")]);

        tracker.poll_once("tx1").await;
        let outcome = tracker.poll_once("tx1").await;
        assert!(matches!(outcome, PollOutcome::Transient(_)));
        assert_eq!(ledger.get("tx1").unwrap().status, Status::Confirming);
        assert!(tracker.is_tracked("tx1"));

        assert_eq!(
            tracker.poll_once("tx1").await,
            PollOutcome::Changed {
                from: Status::Confirming,
                to: Status::Exchanging
            }
        );
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            TrackerEvent::PollFailed { retryable: true, message, .. } if message.contains("connection reset")
        )));
    }

    #[tokio::test]
    async fn test_backward_status_ignored() {
        let (tracker, provider, ledger) = setup("tx1");
        provider.script_statuses("tx1", &[Ok("exchanging"), Ok("waiting")]);

        tracker.poll_once("tx1").await;
        assert_eq!(tracker.poll_once("tx1").await, PollOutcome::Unchanged(Status::Exchanging));
        assert_eq!(ledger.get("tx1").unwrap().status, Status::Exchanging);
    }

    #[tokio::test]
    async fn test_overlapping_poll_skipped() {
        let (tracker, provider, _) = setup("tx1");
        provider.script_statuses("tx1", &[Ok("confirming")]);
        let release = provider.hold_status_requests();

        let first = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.poll_once("tx1").await }
        });
        while provider.status_calls("tx1") == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(tracker.poll_once("tx1").await, PollOutcome::Skipped);
        assert_eq!(provider.status_calls("tx1"), 1);

        release.notify_one();
        assert_eq!(
            first.await.unwrap(),
            PollOutcome::Changed {
                from: Status::Waiting,
                to: Status::Confirming
            }
        );
    }

    #[tokio::test]
    async fn test_retrack_keeps_in_flight_guard() {
        let (tracker, provider, _) = setup("tx1");
        let mut rx = tracker.subscribe();
        provider.script_statuses("tx1", &[Ok("confirming")]);
        let release = provider.hold_status_requests();

        let first = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.poll_once("tx1").await }
        });
        while provider.status_calls("tx1") == 0 {
            tokio::task::yield_now().await;
        }

        assert!(!tracker.track("tx1"));
        assert_eq!(tracker.poll_once("tx1").await, PollOutcome::Skipped);
        assert_eq!(provider.status_calls("tx1"), 1);
        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, TrackerEvent::TrackingStarted { .. })));

        release.notify_one();
        assert_eq!(
            first.await.unwrap(),
            PollOutcome::Changed {
                from: Status::Waiting,
                to: Status::Confirming
            }
        );
    }

    #[tokio::test]
    async fn test_untrack_discards_in_flight_result() {
        let (tracker, provider, ledger) = setup("tx1");
        provider.script_statuses("tx1", &[Ok("finished")]);
        let release = provider.hold_status_requests();

        let first = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.poll_once("tx1").await }
        });
        while provider.status_calls("tx1") == 0 {
            tokio::task::yield_now().await;
        }

        assert!(tracker.untrack("tx1"));
        release.notify_one();

        assert_eq!(first.await.unwrap(), PollOutcome::Discarded);
        assert_eq!(ledger.get("tx1").unwrap().status, Status::Waiting);
    }

    #[tokio::test]
    async fn test_deleted_record_stops_tracking() {
        let (tracker, _, ledger) = setup("tx1");
        ledger.delete_record("tx1");
        assert_eq!(tracker.poll_once("tx1").await, PollOutcome::Stopped);
        assert!(!tracker.is_tracked("tx1"));
    }

    #[tokio::test]
    async fn test_track_rejects_unknown_and_terminal() {
        let (tracker, _, ledger) = setup("tx1");
        assert!(!tracker.track("missing"));

        ledger.record(TransactionRecord::new("tx2", "eth", "usdt", "1", "1", "d", "p"));
        ledger.set_status("tx2", Status::Finished);
        assert!(!tracker.track("tx2"));
    }

    #[tokio::test]
    async fn test_cycle_polls_all_ids() {
        let (tracker, provider, ledger) = setup("tx1");
        ledger.record(TransactionRecord::new("tx2", "eth", "usdt", "16", "40000", "d", "p"));
        assert!(tracker.track("tx2"));
        provider.script_statuses("tx1", &[Ok("confirming")]);
        provider.script_statuses("tx2", &[Ok("failed")]);

        let outcomes = tracker.poll_cycle().await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(ledger.get("tx1").unwrap().status, Status::Confirming);
        assert_eq!(ledger.get("tx2").unwrap().status, Status::Failed);
        assert_eq!(tracker.tracked_ids(), vec!["tx1".to_string()]);
    }

    #[tokio::test]
    async fn test_run_loop_reaches_terminal_and_stops() {
        let (tracker, provider, ledger) = setup("tx1");
        provider.script_statuses("tx1", &[Ok("sending"), Ok("finished")]);

        let handle = tokio::spawn(tracker.clone().run());
        for _ in 0..200 {
            if ledger.get("tx1").unwrap().status == Status::Finished {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tracker.stop().await;
        handle.await.unwrap().unwrap();

        assert_eq!(ledger.get("tx1").unwrap().status, Status::Finished);
        assert!(!tracker.is_tracked("tx1"));
    }
}
