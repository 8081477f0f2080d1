use std::sync::Arc;

use ori_api::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Duration, Instant, MissedTickBehavior},
};
use tracing::{debug, error};

use crate::hooks::{
    listen, poll_bet_stats, poll_contract, poll_latest_events, poll_outcome, poll_round_winners,
    Backend, ContractReader, Invalidator, PollContext, PushSource, Query,
};
use crate::pages::PlayState;
use crate::{AppConfig, CellSet, Clock, RoundView};

/// Everything the driver reacts to, in arrival order.
#[derive(Clone, Debug)]
pub enum Input {
    LatestEvents {
        events: LatestEvents,
        /// When the request was sent, not when it answered.
        issued_at: Instant,
    },
    BetStats(BetStatistics),
    Outcome {
        round_id: u64,
        outcome: RoundOutcome,
    },
    Winners(RoundWinners),
    Contract(ContractSnapshot),
    Push(PushEvent),
    User(UserAction),
    Write(WriteKind),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserAction {
    Toggle(u8),
    /// Select every square, or clear the selection if all are selected.
    ToggleAll,
    /// Echo a submitted deploy until the backend reports it.
    Deploy { cells: CellSet, amount: Amount },
}

/// A confirmed transaction that changes remote state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteKind {
    Deploy,
    Claim,
    Stake,
    Automation,
}

impl WriteKind {
    pub fn invalidates(self) -> &'static [Query] {
        match self {
            WriteKind::Deploy => &[Query::BetStats, Query::LatestEvents, Query::Contract],
            WriteKind::Claim | WriteKind::Stake | WriteKind::Automation => &[Query::Contract],
        }
    }
}

pub struct SyncDeps<B, C, P, K> {
    pub backend: B,
    pub contract: C,
    pub push: P,
    pub clock: K,
}

pub struct RoundSync;

impl RoundSync {
    pub fn spawn<B, C, P, K>(deps: SyncDeps<B, C, P, K>, config: &AppConfig) -> SyncHandle
    where
        B: Backend,
        C: ContractReader,
        P: PushSource,
        K: Clock,
    {
        Self::spawn_with_rng(deps, config, StdRng::from_entropy())
    }

    /// Like [`RoundSync::spawn`] with a fixed source for draw orders.
    pub fn spawn_with_rng<B, C, P, K>(
        deps: SyncDeps<B, C, P, K>,
        config: &AppConfig,
        rng: StdRng,
    ) -> SyncHandle
    where
        B: Backend,
        C: ContractReader,
        P: PushSource,
        K: Clock,
    {
        let timing = config.timing;
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (view_tx, view_rx) = watch::channel(RoundView::default());
        let (round_tx, round_rx) = watch::channel(None);
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let (winners_tx, winners_rx) = watch::channel(None);

        let invalidator = Invalidator::default();
        let ctx = PollContext {
            invalidator: invalidator.clone(),
            inputs: inputs_tx.clone(),
            shutdown: shutdown_rx.clone(),
        };
        let backend = Arc::new(deps.backend);
        let contract = Arc::new(deps.contract);

        let tasks = vec![
            tokio::spawn(poll_latest_events(
                backend.clone(),
                ctx.clone(),
                timing.latest_events(),
            )),
            tokio::spawn(poll_bet_stats(
                backend.clone(),
                ctx.clone(),
                timing.bet_stats(),
                round_rx,
                config.miner_address.clone(),
            )),
            tokio::spawn(poll_round_winners(
                backend,
                ctx.clone(),
                timing.winners(),
                winners_rx,
            )),
            tokio::spawn(poll_outcome(
                contract.clone(),
                ctx.clone(),
                timing.outcome(),
                outcome_rx,
            )),
            tokio::spawn(poll_contract(contract, ctx, timing.contract())),
            tokio::spawn(listen(
                deps.push,
                inputs_tx.clone(),
                shutdown_rx.clone(),
                timing.push_reconnect(),
            )),
            tokio::spawn(
                Driver {
                    state: PlayState::new(&timing),
                    inputs: inputs_rx,
                    invalidator: invalidator.clone(),
                    clock: deps.clock,
                    rng,
                    tick: timing.tick(),
                    shutdown: shutdown_rx,
                    view: view_tx,
                    round: round_tx,
                    outcome_target: outcome_tx,
                    winners_target: winners_tx,
                }
                .run(),
            ),
        ];

        SyncHandle {
            inputs: inputs_tx,
            invalidator,
            view: view_rx,
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

/// The single writer: owns [`PlayState`] and publishes it.
struct Driver<K> {
    state: PlayState,
    inputs: mpsc::UnboundedReceiver<Input>,
    invalidator: Invalidator,
    clock: K,
    rng: StdRng,
    tick: Duration,
    shutdown: watch::Receiver<bool>,
    view: watch::Sender<RoundView>,
    round: watch::Sender<Option<u64>>,
    outcome_target: watch::Sender<Option<u64>>,
    winners_target: watch::Sender<Option<u64>>,
}

impl<K: Clock> Driver<K> {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.state.next_deadline();
            let queries = tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(input) => {
                        let unix_now = self.clock.unix_now();
                        self.state.handle(input, Instant::now(), unix_now, &mut self.rng)
                    }
                    None => break,
                },
                _ = ticker.tick() => self.state.tick(self.clock.unix_now()),
                _ = sleep_until(deadline) => self.state.on_timer(Instant::now()),
                _ = self.shutdown.changed() => break,
            };

            // Targets go out before the wakeups so pollers read fresh ones.
            self.publish();
            for query in queries {
                self.invalidator.invalidate(query);
            }
        }
        debug!("driver stopped");
    }

    fn publish(&self) {
        publish(&self.view, self.state.view());
        publish(&self.round, self.state.round_id());
        publish(&self.outcome_target, self.state.outcome_target());
        publish(&self.winners_target, self.state.winners_target());
    }
}

fn publish<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Control surface of a running synchronizer. Dropping it aborts every task.
pub struct SyncHandle {
    inputs: mpsc::UnboundedSender<Input>,
    invalidator: Invalidator,
    view: watch::Receiver<RoundView>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn view(&self) -> watch::Receiver<RoundView> {
        self.view.clone()
    }

    pub fn current(&self) -> RoundView {
        self.view.borrow().clone()
    }

    pub fn toggle_cell(&self, cell: u8) {
        self.send(Input::User(UserAction::Toggle(cell)));
    }

    pub fn toggle_select_all(&self) {
        self.send(Input::User(UserAction::ToggleAll));
    }

    /// Show `amount` on each of `cells` until statistics catch up.
    pub fn record_deploy(&self, cells: CellSet, amount: Amount) {
        self.send(Input::User(UserAction::Deploy { cells, amount }));
    }

    pub fn notify_write(&self, kind: WriteKind) {
        self.send(Input::Write(kind));
    }

    pub fn invalidate(&self, query: Query) {
        self.invalidator.invalidate(query);
    }

    fn send(&self, input: Input) {
        if self.inputs.send(input).is_err() {
            debug!("synchronizer stopped, input dropped");
        }
    }

    /// Stop every task and wait for them to wind down.
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                if err.is_panic() {
                    error!(%err, "synchronizer task panicked");
                }
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
