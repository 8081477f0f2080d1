mod clock;
pub mod components;
mod config;
mod error;
pub mod hooks;
pub mod pages;
pub mod round;
mod sync;

use std::collections::BTreeMap;

use ori_api::prelude::*;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, PushConfig, TimingConfig};
pub use error::{Error, Result};
pub use round::Countdown;
pub use sync::{Input, RoundSync, SyncDeps, SyncHandle, UserAction, WriteKind};

/// A set of board squares, one bit per square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CellSet(u32);

impl CellSet {
    pub const EMPTY: CellSet = CellSet(0);

    const MASK: u32 = (1 << GRID_SIZE) - 1;

    pub fn full() -> Self {
        CellSet(Self::MASK)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, cell: u8) -> bool {
        (cell as usize) < GRID_SIZE && self.0 & (1 << cell) != 0
    }

    /// Returns false when the cell is off the board.
    pub fn insert(&mut self, cell: u8) -> bool {
        if (cell as usize) >= GRID_SIZE {
            return false;
        }
        self.0 |= 1 << cell;
        true
    }

    pub fn remove(&mut self, cell: u8) {
        if (cell as usize) < GRID_SIZE {
            self.0 &= !(1 << cell);
        }
    }

    pub fn toggle(&mut self, cell: u8) {
        if self.contains(cell) {
            self.remove(cell);
        } else {
            self.insert(cell);
        }
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_full(self) -> bool {
        self.0 == Self::MASK
    }

    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..GRID_SIZE as u8).filter(move |cell| self.contains(*cell))
    }
}

impl FromIterator<u8> for CellSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = CellSet::EMPTY;
        for cell in iter {
            set.insert(cell);
        }
        set
    }
}

/// The reconciled round state published to views.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundView {
    pub round_id: Option<u64>,
    pub start_timestamp: Option<u64>,
    pub countdown: Countdown,
    pub winning_cell: Option<u8>,
    pub is_drawing: bool,
    pub show_winner: bool,
    pub faded_cells: CellSet,
    pub selected_cells: CellSet,
    /// Optimistic echo of the user's deploys, per square.
    pub cell_amounts: BTreeMap<u8, Amount>,
    pub stats: Option<BetStatistics>,
    pub contract: Option<ContractSnapshot>,
    pub winners: Option<RoundWinners>,
}

impl Default for RoundView {
    fn default() -> Self {
        Self {
            round_id: None,
            start_timestamp: None,
            countdown: Countdown::Waiting,
            winning_cell: None,
            is_drawing: false,
            show_winner: false,
            faded_cells: CellSet::EMPTY,
            selected_cells: CellSet::EMPTY,
            cell_amounts: BTreeMap::new(),
            stats: None,
            contract: None,
            winners: None,
        }
    }
}

impl RoundView {
    /// No draw animation is running.
    pub fn is_idle(&self) -> bool {
        !self.is_drawing && !self.show_winner
    }

    /// Total the user has deployed this round, local echo included.
    pub fn user_deployed(&self) -> Amount {
        let echoed: Amount = self.cell_amounts.values().copied().sum();
        let confirmed = self
            .stats
            .as_ref()
            .map(BetStatistics::user_deployed)
            .unwrap_or_default();
        confirmed.max(echoed)
    }
}
