use ori_api::prelude::*;
use tokio::time::Instant;
use tracing::debug;

/// Merges the contract, the backend and the push stream into one round id
/// and start timestamp.
///
/// Inputs only ever add information: nothing here clears a known value.
#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    contract_round_id: Option<u64>,
    latest: Option<LatestEvents>,
    latest_issued_at: Option<Instant>,
    start_timestamp: Option<u64>,
    pushed_at: Option<Instant>,
    displayed: Option<u64>,
}

impl Reconciler {
    pub fn on_contract_round(&mut self, round_id: u64) {
        self.contract_round_id = Some(round_id);
    }

    /// Apply a latest-events poll that was issued at `issued_at`.
    ///
    /// Returns the round the backend has newly recorded as reset, when this
    /// poll moved `reset_event_round_id` past an earlier observation.
    pub fn on_latest_events(&mut self, events: LatestEvents, issued_at: Instant) -> Option<u64> {
        if matches!(self.latest_issued_at, Some(last) if issued_at < last) {
            debug!(?events, "dropping out-of-order latest events");
            return None;
        }
        let previous = self.latest.replace(events);
        self.latest_issued_at = Some(issued_at);

        if let Some(timestamp) = events.timestamp {
            match self.pushed_at {
                Some(pushed) if issued_at < pushed => {
                    debug!(timestamp, "poll predates pushed start, keeping pushed timestamp")
                }
                _ => self.start_timestamp = Some(timestamp),
            }
        }

        previous
            .filter(|previous| events.reset_event_round_id > previous.reset_event_round_id)
            .map(|_| events.reset_event_round_id)
    }

    /// A round-started push carrying the new round's opening time.
    pub fn on_pushed_start(&mut self, timestamp: u64, at: Instant) {
        self.start_timestamp = Some(timestamp);
        self.pushed_at = Some(at);
    }

    /// Backend-derived round id once the backend has answered, the contract's
    /// counter before that.
    pub fn effective_round_id(&self) -> Option<u64> {
        self.latest
            .as_ref()
            .map(LatestEvents::effective_round_id)
            .or(self.contract_round_id)
    }

    pub fn start_timestamp(&self) -> Option<u64> {
        self.start_timestamp
    }

    pub fn displayed(&self) -> Option<u64> {
        self.displayed
    }

    /// Show `round_id` again until the next commit moves past it.
    pub fn hold(&mut self, round_id: u64) {
        self.displayed = Some(round_id);
    }

    /// Publish the effective id. Returns the new id when it changed.
    pub fn commit(&mut self) -> Option<u64> {
        let effective = self.effective_round_id()?;
        if self.displayed == Some(effective) {
            return None;
        }
        self.displayed = Some(effective);
        Some(effective)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn events(round_id: u64, reset: u64, timestamp: Option<u64>) -> LatestEvents {
        LatestEvents {
            round_id,
            reset_event_round_id: reset,
            timestamp,
        }
    }

    #[test]
    fn contract_bootstraps_until_backend_answers() {
        let now = Instant::now();
        let mut reconciler = Reconciler::default();
        assert_eq!(reconciler.commit(), None);

        reconciler.on_contract_round(39);
        assert_eq!(reconciler.commit(), Some(39));
        assert_eq!(reconciler.commit(), None);

        reconciler.on_latest_events(events(40, 40, None), now);
        assert_eq!(reconciler.effective_round_id(), Some(41));
        reconciler.on_contract_round(40);
        assert_eq!(reconciler.effective_round_id(), Some(41));
        assert_eq!(reconciler.commit(), Some(41));
        assert_eq!(reconciler.displayed(), Some(41));
    }

    #[test]
    fn stale_poll_cannot_overwrite_pushed_start() {
        let issued = Instant::now();
        let pushed = issued + Duration::from_millis(10);
        let mut reconciler = Reconciler::default();

        reconciler.on_pushed_start(1_000, pushed);
        reconciler.on_latest_events(events(41, 40, Some(940)), issued);
        assert_eq!(reconciler.start_timestamp(), Some(1_000));
        assert_eq!(reconciler.effective_round_id(), Some(41));

        reconciler.on_latest_events(events(42, 41, Some(1_060)), pushed + Duration::from_secs(1));
        assert_eq!(reconciler.start_timestamp(), Some(1_060));
    }

    #[test]
    fn missing_timestamp_keeps_known_one() {
        let now = Instant::now();
        let mut reconciler = Reconciler::default();
        reconciler.on_latest_events(events(41, 40, Some(500)), now);
        reconciler.on_latest_events(events(41, 40, None), now + Duration::from_secs(3));
        assert_eq!(reconciler.start_timestamp(), Some(500));
    }

    #[test]
    fn out_of_order_poll_is_dropped() {
        let first = Instant::now();
        let second = first + Duration::from_secs(3);
        let mut reconciler = Reconciler::default();
        reconciler.on_latest_events(events(41, 41, None), second);
        reconciler.on_latest_events(events(41, 40, None), first);
        assert_eq!(reconciler.effective_round_id(), Some(42));
    }

    #[test]
    fn reports_reset_transitions_only() {
        let now = Instant::now();
        let mut reconciler = Reconciler::default();
        // the first answer describes resets from before we were watching
        assert_eq!(reconciler.on_latest_events(events(41, 40, None), now), None);
        assert_eq!(
            reconciler.on_latest_events(events(41, 40, None), now + Duration::from_secs(3)),
            None
        );
        assert_eq!(
            reconciler.on_latest_events(events(41, 41, None), now + Duration::from_secs(6)),
            Some(41)
        );
        assert_eq!(reconciler.on_latest_events(events(41, 40, None), now), None);
    }

    #[test]
    fn hold_rewinds_until_next_commit() {
        let now = Instant::now();
        let mut reconciler = Reconciler::default();
        reconciler.on_latest_events(events(41, 41, None), now);
        assert_eq!(reconciler.commit(), Some(42));

        reconciler.hold(41);
        assert_eq!(reconciler.displayed(), Some(41));
        assert_eq!(reconciler.commit(), Some(42));
    }
}
