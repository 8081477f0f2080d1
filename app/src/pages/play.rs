use std::collections::BTreeMap;

use ori_api::prelude::*;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::hooks::Query;
use crate::round::{Countdown, DrawSequencer, DrawStep, ExpiryLatch, Reconciler};
use crate::{CellSet, Input, RoundView, TimingConfig, UserAction};

/// Everything the play page shows, owned by a single writer.
///
/// Each handler applies one input and returns the queries to refetch.
#[derive(Clone, Debug)]
pub struct PlayState {
    reconciler: Reconciler,
    latch: ExpiryLatch,
    sequencer: DrawSequencer,
    round_duration: u64,
    countdown: Countdown,

    selected: CellSet,
    cell_amounts: BTreeMap<u8, Amount>,

    stats: Option<BetStatistics>,
    // Statistics that arrived mid-draw, shown once the board settles.
    pending_stats: Option<BetStatistics>,
    contract: Option<ContractSnapshot>,
    winners: Option<RoundWinners>,
    winners_round: Option<u64>,
    last_drawn_round: Option<u64>,
    // Reset by the backend while we watched, but not drawn yet.
    closing_round: Option<u64>,
    last_reset_round: Option<u64>,
}

impl Default for PlayState {
    fn default() -> Self {
        Self::new(&TimingConfig::default())
    }
}

impl PlayState {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            reconciler: Reconciler::default(),
            latch: ExpiryLatch::default(),
            sequencer: DrawSequencer::new(timing.reveal_cadence(), timing.winner_hold()),
            round_duration: timing.round_duration_secs,
            countdown: Countdown::Waiting,
            selected: CellSet::EMPTY,
            cell_amounts: BTreeMap::new(),
            stats: None,
            pending_stats: None,
            contract: None,
            winners: None,
            winners_round: None,
            last_drawn_round: None,
            closing_round: None,
            last_reset_round: None,
        }
    }

    pub fn handle<R: Rng + ?Sized>(
        &mut self,
        input: Input,
        now: Instant,
        unix_now: u64,
        rng: &mut R,
    ) -> Vec<Query> {
        let mut queries = Vec::new();
        match input {
            Input::LatestEvents { events, issued_at } => {
                if let Some(reset) = self.reconciler.on_latest_events(events, issued_at) {
                    if self.last_drawn_round != Some(reset) {
                        debug!(round_id = reset, "round closed before its draw");
                        self.closing_round = Some(reset);
                    }
                }
            }
            Input::Contract(snapshot) => {
                self.reconciler.on_contract_round(snapshot.current_round_id);
                self.contract = Some(snapshot);
            }
            Input::BetStats(stats) => {
                if Some(stats.round_id) != self.round_id() {
                    debug!(round_id = stats.round_id, "dropping statistics for another round");
                } else if self.sequencer.is_idle() {
                    self.stats = Some(stats);
                } else {
                    self.pending_stats = Some(stats);
                }
            }
            Input::Outcome { round_id, outcome } => {
                if let Some(winner) = outcome.winner() {
                    if self.draw(round_id, winner, now, rng) {
                        self.winners_round = Some(round_id);
                        queries.push(Query::RoundWinners);
                    }
                }
            }
            Input::Winners(winners) => {
                if Some(winners.round_id) == self.winners_round {
                    self.winners = Some(winners);
                }
            }
            Input::Push(PushEvent::Started(started)) => {
                queries.push(Query::LatestEvents);
                if let Some(timestamp) = started.timestamp {
                    info!(timestamp, "round started");
                    self.reconciler.on_pushed_start(timestamp, now);
                }
            }
            Input::Push(PushEvent::Reset(reset)) => {
                let round_id = reset.round_id.or_else(|| self.reset_round());
                self.last_reset_round = round_id.or(self.last_reset_round);
                self.winners_round = round_id.or(self.winners_round);
                queries.extend([Query::RoundWinners, Query::LatestEvents]);
                if let (Some(round_id), Some(winner)) = (round_id, reset.winner()) {
                    self.draw(round_id, winner, now, rng);
                }
            }
            Input::User(action) => self.apply_user(action),
            Input::Write(kind) => queries.extend_from_slice(kind.invalidates()),
        }
        queries.extend(self.settle());
        queries.extend(self.tick(unix_now));
        queries
    }

    fn apply_user(&mut self, action: UserAction) {
        match action {
            UserAction::Toggle(cell) => {
                if self.sequencer.is_idle() {
                    self.selected.toggle(cell);
                }
            }
            UserAction::ToggleAll => {
                if !self.sequencer.is_idle() {
                    return;
                }
                if self.selected.is_full() {
                    self.selected.clear();
                } else {
                    self.selected = CellSet::full();
                }
            }
            UserAction::Deploy { cells, amount } => {
                for cell in cells.iter() {
                    let echoed = self.cell_amounts.entry(cell).or_default();
                    *echoed = echoed.saturating_add(amount);
                }
            }
        }
    }

    /// Recompute the countdown. Refetches the round once it reaches zero.
    pub fn tick(&mut self, unix_now: u64) -> Vec<Query> {
        let start = self.reconciler.start_timestamp();
        self.countdown = Countdown::compute(start, unix_now, self.round_duration);
        if self.latch.observe(start, self.countdown) {
            info!(round_id = ?self.round_id(), "round countdown expired");
            vec![Query::LatestEvents, Query::Outcome]
        } else {
            Vec::new()
        }
    }

    /// Advance the draw animation to `now`.
    pub fn on_timer(&mut self, now: Instant) -> Vec<Query> {
        for step in self.sequencer.advance(now) {
            match step {
                DrawStep::Faded(cell) => debug!(cell, "faded"),
                DrawStep::Revealed(cell) => info!(cell, "winner revealed"),
                DrawStep::Finished => {
                    debug!("draw finished");
                    self.selected.clear();
                    self.cell_amounts.clear();
                    if let Some(stats) = self.pending_stats.take() {
                        self.stats = Some(stats);
                    }
                }
            }
        }
        self.settle()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.sequencer.next_deadline()
    }

    /// Move to the reconciled round, unless a draw is still on screen.
    fn settle(&mut self) -> Vec<Query> {
        if !self.sequencer.is_idle() {
            return Vec::new();
        }
        let Some(round_id) = self.reconciler.commit() else {
            return Vec::new();
        };
        info!(round_id, "round changed");
        self.selected.clear();
        self.cell_amounts.clear();
        self.stats = None;
        self.pending_stats = None;
        vec![Query::BetStats, Query::Outcome]
    }

    /// Round a reset push without an id belongs to: the round the backend
    /// closed before its push arrived, else the displayed one.
    fn reset_round(&self) -> Option<u64> {
        self.closing_round
            .filter(|id| self.last_reset_round != Some(*id))
            .or(self.round_id())
    }

    /// Draw the displayed or the just-closed round. A closed round is shown
    /// again until its draw finishes.
    fn draw<R: Rng + ?Sized>(&mut self, round_id: u64, winner: u8, now: Instant, rng: &mut R) -> bool {
        let closing = self.closing_round == Some(round_id);
        if !closing && self.round_id() != Some(round_id) {
            debug!(round_id, "not drawing a round that is neither shown nor closing");
            return false;
        }
        if !self.start_draw(round_id, winner, now, rng) {
            return false;
        }
        if closing {
            self.closing_round = None;
        }
        if self.round_id() != Some(round_id) {
            info!(round_id, "holding round change until its draw finishes");
            self.reconciler.hold(round_id);
            self.stats = None;
            self.pending_stats = None;
        }
        true
    }

    fn start_draw<R: Rng + ?Sized>(
        &mut self,
        round_id: u64,
        winner: u8,
        now: Instant,
        rng: &mut R,
    ) -> bool {
        if self.last_drawn_round == Some(round_id) {
            debug!(round_id, "round already drawn");
            return false;
        }
        if !self.sequencer.start(winner, now, rng) {
            return false;
        }
        info!(round_id, winner, "drawing round");
        self.last_drawn_round = Some(round_id);
        true
    }

    /// The displayed round.
    pub fn round_id(&self) -> Option<u64> {
        self.reconciler.displayed()
    }

    /// Round whose outcome still needs reading, if any.
    pub fn outcome_target(&self) -> Option<u64> {
        if !self.sequencer.is_idle() {
            return None;
        }
        self.closing_round
            .or(self.round_id())
            .filter(|id| self.last_drawn_round != Some(*id))
    }

    pub fn winners_target(&self) -> Option<u64> {
        self.winners_round
    }

    pub fn view(&self) -> RoundView {
        RoundView {
            round_id: self.round_id(),
            start_timestamp: self.reconciler.start_timestamp(),
            countdown: self.countdown,
            winning_cell: self.sequencer.winning_cell(),
            is_drawing: self.sequencer.is_drawing(),
            show_winner: self.sequencer.show_winner(),
            faded_cells: self.sequencer.faded(),
            selected_cells: self.selected,
            cell_amounts: self.cell_amounts.clone(),
            stats: self.stats.clone(),
            contract: self.contract,
            winners: self.winners.clone(),
        }
    }
}
