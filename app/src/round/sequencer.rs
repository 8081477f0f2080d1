use std::time::Duration;

use ori_api::prelude::*;
use rand::{seq::SliceRandom, Rng};
use tokio::time::Instant;

use crate::CellSet;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DrawPhase {
    #[default]
    Idle,
    /// Losing cells fade out one at a time in `order`.
    Drawing {
        winner: u8,
        order: Vec<u8>,
        faded: usize,
        next_at: Instant,
    },
    /// Every losing cell has faded and the winner is highlighted.
    Revealed { winner: u8, until: Instant },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawStep {
    Faded(u8),
    Revealed(u8),
    Finished,
}

/// The draw animation: fade the 24 losing cells in random order, reveal the
/// winner, hold it, then go idle again.
#[derive(Clone, Debug)]
pub struct DrawSequencer {
    phase: DrawPhase,
    cadence: Duration,
    hold: Duration,
}

impl Default for DrawSequencer {
    fn default() -> Self {
        Self::new(REVEAL_CADENCE, WINNER_HOLD)
    }
}

impl DrawSequencer {
    pub fn new(cadence: Duration, hold: Duration) -> Self {
        Self {
            phase: DrawPhase::Idle,
            cadence,
            hold,
        }
    }

    pub fn phase(&self) -> &DrawPhase {
        &self.phase
    }

    /// Begin a draw. Ignored while another draw runs or for an off-board
    /// winner; returns whether a draw started.
    pub fn start<R: Rng + ?Sized>(&mut self, winner: u8, now: Instant, rng: &mut R) -> bool {
        if !self.is_idle() || winner as usize >= GRID_SIZE {
            return false;
        }
        let mut order: Vec<u8> = (0..GRID_SIZE as u8).filter(|cell| *cell != winner).collect();
        order.shuffle(rng);
        self.phase = DrawPhase::Drawing {
            winner,
            order,
            faded: 0,
            next_at: now + self.cadence,
        };
        true
    }

    /// Run every step whose deadline is at or before `now`.
    pub fn advance(&mut self, now: Instant) -> Vec<DrawStep> {
        let mut steps = Vec::new();
        loop {
            match &mut self.phase {
                DrawPhase::Idle => break,
                DrawPhase::Drawing {
                    winner,
                    order,
                    faded,
                    next_at,
                } => {
                    if now < *next_at {
                        break;
                    }
                    steps.push(DrawStep::Faded(order[*faded]));
                    *faded += 1;
                    if *faded < order.len() {
                        *next_at += self.cadence;
                    } else {
                        let winner = *winner;
                        let until = *next_at + self.hold;
                        steps.push(DrawStep::Revealed(winner));
                        self.phase = DrawPhase::Revealed { winner, until };
                    }
                }
                DrawPhase::Revealed { until, .. } => {
                    if now < *until {
                        break;
                    }
                    self.phase = DrawPhase::Idle;
                    steps.push(DrawStep::Finished);
                }
            }
        }
        steps
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.phase {
            DrawPhase::Idle => None,
            DrawPhase::Drawing { next_at, .. } => Some(*next_at),
            DrawPhase::Revealed { until, .. } => Some(*until),
        }
    }

    pub fn faded(&self) -> CellSet {
        match &self.phase {
            DrawPhase::Idle => CellSet::EMPTY,
            DrawPhase::Drawing { order, faded, .. } => order[..*faded].iter().copied().collect(),
            DrawPhase::Revealed { winner, .. } => {
                let mut all = CellSet::full();
                all.remove(*winner);
                all
            }
        }
    }

    pub fn winning_cell(&self) -> Option<u8> {
        match &self.phase {
            DrawPhase::Idle => None,
            DrawPhase::Drawing { winner, .. } | DrawPhase::Revealed { winner, .. } => Some(*winner),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == DrawPhase::Idle
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.phase, DrawPhase::Drawing { .. })
    }

    pub fn show_winner(&self) -> bool {
        matches!(self.phase, DrawPhase::Revealed { .. })
    }
}
