use std::fmt;

use ori_api::prelude::*;

use crate::RoundView;

/// Headline numbers above the board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overview {
    pub round: String,
    pub countdown: String,
    pub phase: &'static str,
    pub total_deployed: String,
    pub user_deployed: String,
    pub motherlode: String,
    pub miners: u64,
}

impl Overview {
    pub fn from_view(view: &RoundView, decimals: u32) -> Self {
        let opts = FormatOptions::default();
        let phase = if view.show_winner {
            "winner"
        } else if view.is_drawing {
            "drawing"
        } else if view.countdown.is_expired() {
            "closing"
        } else if view.round_id.is_some() {
            "open"
        } else {
            "waiting"
        };
        let stats = view.stats.as_ref();

        Self {
            round: view
                .round_id
                .map(|id| format!("Round #{id}"))
                .unwrap_or_else(|| "Round --".to_string()),
            countdown: view.countdown.label(),
            phase,
            total_deployed: stats
                .map(BetStatistics::total_deployed)
                .unwrap_or_default()
                .format(decimals, opts),
            user_deployed: view.user_deployed().format(decimals, opts),
            motherlode: view
                .contract
                .map(|c| c.treasury.motherlode.format(decimals, opts))
                .unwrap_or_else(|| "--".to_string()),
            miners: stats.map(BetStatistics::total_miners).unwrap_or_default(),
        }
    }
}

impl fmt::Display for Overview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} | deployed {} | mine {} | motherlode {} | miners {}",
            self.round,
            self.phase,
            self.countdown,
            self.total_deployed,
            self.user_deployed,
            self.motherlode,
            self.miners
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::Countdown;

    use super::*;

    #[test]
    fn summarizes_round() {
        let mut stats = BetStatistics::empty(41);
        stats.global[0] = CellStat {
            count: 3,
            amount: Amount(2_000_000_000_000_000_000),
        };
        let view = RoundView {
            round_id: Some(41),
            countdown: Countdown::Remaining(75),
            stats: Some(stats),
            contract: Some(ContractSnapshot {
                treasury: TreasuryState {
                    motherlode: Amount(1_250_000_000_000_000_000_000),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        let overview = Overview::from_view(&view, 18);
        assert_eq!(overview.round, "Round #41");
        assert_eq!(overview.countdown, "01:15");
        assert_eq!(overview.phase, "open");
        assert_eq!(overview.total_deployed, "2");
        assert_eq!(overview.user_deployed, "0");
        assert_eq!(overview.motherlode, "1.25K");
        assert_eq!(overview.miners, 3);
    }

    #[test]
    fn empty_view() {
        let overview = Overview::from_view(&RoundView::default(), 18);
        assert_eq!(overview.round, "Round --");
        assert_eq!(overview.countdown, "--:--");
        assert_eq!(overview.phase, "waiting");
        assert_eq!(overview.motherlode, "--");
    }
}
