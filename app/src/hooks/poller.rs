use std::{future::Future, ops::ControlFlow, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, watch, Notify},
    time::Instant,
};
use tracing::{debug, warn};

use crate::Input;

use super::backend::Backend;
use super::contract::ContractReader;

/// A remotely fetched resource that can be refetched on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Query {
    LatestEvents,
    BetStats,
    Outcome,
    RoundWinners,
    Contract,
}

impl Query {
    fn index(self) -> usize {
        self as usize
    }
}

/// Asks pollers to refetch ahead of their interval.
///
/// Each query holds at most one pending permit, so invalidating a query twice
/// before its poller wakes costs a single fetch.
#[derive(Clone, Default)]
pub struct Invalidator(Arc<[Notify; 5]>);

impl Invalidator {
    pub fn invalidate(&self, query: Query) {
        debug!(?query, "invalidated");
        self.0[query.index()].notify_one();
    }

    pub async fn invalidated(&self, query: Query) {
        self.0[query.index()].notified().await
    }
}

/// What every poller shares with the driver.
#[derive(Clone)]
pub struct PollContext {
    pub invalidator: Invalidator,
    pub inputs: mpsc::UnboundedSender<Input>,
    pub shutdown: watch::Receiver<bool>,
}

impl PollContext {
    /// Forward a result to the driver. Breaks once the driver is gone.
    pub fn send(&self, input: Input) -> ControlFlow<()> {
        match self.inputs.send(input) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        }
    }

    pub fn schedule(&self, query: Query, interval: Duration) -> Schedule {
        Schedule {
            query,
            interval,
            invalidator: self.invalidator.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Pull schedule for one query: fetch, then wait for the interval, an
/// invalidation or shutdown, whichever comes first.
pub struct Schedule {
    query: Query,
    interval: Duration,
    invalidator: Invalidator,
    shutdown: watch::Receiver<bool>,
}

impl Schedule {
    /// Returns false when the poller should stop.
    pub async fn wait(&mut self) -> bool {
        if *self.shutdown.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.interval) => true,
            _ = self.invalidator.invalidated(self.query) => true,
            _ = self.shutdown.changed() => false,
        }
    }

    /// Run a fetch unless shutdown wins the race.
    pub async fn guard<F: Future>(&mut self, fetch: F) -> Option<F::Output> {
        if *self.shutdown.borrow() {
            return None;
        }
        tokio::select! {
            out = fetch => Some(out),
            _ = self.shutdown.changed() => None,
        }
    }
}

pub async fn poll_latest_events<B: Backend>(backend: Arc<B>, ctx: PollContext, interval: Duration) {
    let mut schedule = ctx.schedule(Query::LatestEvents, interval);
    loop {
        let issued_at = Instant::now();
        match schedule.guard(backend.latest_events()).await {
            None => break,
            Some(Ok(events)) => {
                if ctx.send(Input::LatestEvents { events, issued_at }).is_break() {
                    break;
                }
            }
            Some(Err(err)) => warn!(%err, "latest events fetch failed"),
        }
        if !schedule.wait().await {
            break;
        }
    }
    debug!("latest events poller stopped");
}

/// Bet statistics for the displayed round, scoped to `miner` when set.
pub async fn poll_bet_stats<B: Backend>(
    backend: Arc<B>,
    ctx: PollContext,
    interval: Duration,
    round: watch::Receiver<Option<u64>>,
    miner: Option<String>,
) {
    let mut schedule = ctx.schedule(Query::BetStats, interval);
    loop {
        let round_id = *round.borrow();
        if let Some(round_id) = round_id {
            match schedule.guard(backend.round_stats(round_id, miner.as_deref())).await {
                None => break,
                Some(Ok(stats)) => {
                    if ctx.send(Input::BetStats(stats)).is_break() {
                        break;
                    }
                }
                Some(Err(err)) => warn!(round_id, %err, "bet statistics fetch failed"),
            }
        }
        if !schedule.wait().await {
            break;
        }
    }
    debug!("bet statistics poller stopped");
}

/// Fallback for a missed reset push: read the outcome of the round the
/// driver is waiting on, if any.
pub async fn poll_outcome<C: ContractReader>(
    contract: Arc<C>,
    ctx: PollContext,
    interval: Duration,
    target: watch::Receiver<Option<u64>>,
) {
    let mut schedule = ctx.schedule(Query::Outcome, interval);
    loop {
        let round_id = *target.borrow();
        if let Some(round_id) = round_id {
            match schedule.guard(contract.round_outcome(round_id)).await {
                None => break,
                Some(Ok(outcome)) => {
                    if ctx.send(Input::Outcome { round_id, outcome }).is_break() {
                        break;
                    }
                }
                Some(Err(err)) => warn!(round_id, %err, "round outcome read failed"),
            }
        }
        if !schedule.wait().await {
            break;
        }
    }
    debug!("outcome poller stopped");
}

/// Winners of the most recently finalized round.
pub async fn poll_round_winners<B: Backend>(
    backend: Arc<B>,
    ctx: PollContext,
    interval: Duration,
    target: watch::Receiver<Option<u64>>,
) {
    let mut schedule = ctx.schedule(Query::RoundWinners, interval);
    loop {
        let round_id = *target.borrow();
        if let Some(round_id) = round_id {
            match schedule.guard(backend.round_winners(round_id)).await {
                None => break,
                Some(Ok(winners)) => {
                    if ctx.send(Input::Winners(winners)).is_break() {
                        break;
                    }
                }
                Some(Err(err)) => warn!(round_id, %err, "round winners fetch failed"),
            }
        }
        if !schedule.wait().await {
            break;
        }
    }
    debug!("round winners poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn duplicate_invalidations_coalesce() {
        let invalidator = Invalidator::default();
        invalidator.invalidate(Query::Outcome);
        invalidator.invalidate(Query::Outcome);

        invalidator.invalidated(Query::Outcome).await;
        let second = tokio::time::timeout(
            Duration::from_millis(10),
            invalidator.invalidated(Query::Outcome),
        )
        .await;
        assert!(second.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_wakes_on_invalidation_before_interval() {
        let (inputs, _rx) = mpsc::unbounded_channel();
        let (stop, shutdown) = watch::channel(false);
        let ctx = PollContext {
            invalidator: Invalidator::default(),
            inputs,
            shutdown,
        };
        let mut schedule = ctx.schedule(Query::LatestEvents, Duration::from_secs(3));

        let start = Instant::now();
        ctx.invalidator.invalidate(Query::LatestEvents);
        assert!(schedule.wait().await);
        assert!(start.elapsed() < Duration::from_secs(1));

        assert!(schedule.wait().await);
        assert!(start.elapsed() >= Duration::from_secs(3));

        stop.send(true).unwrap();
        assert!(!schedule.wait().await);
        assert_eq!(schedule.guard(async { 1 }).await, None);
    }
}
