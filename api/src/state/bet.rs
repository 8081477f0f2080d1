use serde::{Deserialize, Serialize};

use crate::{amount::Amount, consts::GRID_SIZE, error::OriError};

use super::de;

/// Aggregate of the bets placed on one square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellStat {
    /// Number of miners on the square.
    pub count: u64,

    /// Amount deployed on the square, in wei.
    pub amount: Amount,
}

/// One row of the backend's per-square statistics.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SquareStat {
    #[serde(deserialize_with = "de::u64_flexible")]
    pub square: u64,

    #[serde(default, deserialize_with = "de::u64_optional")]
    pub count: Option<u64>,

    #[serde(default)]
    pub amount: Amount,
}

/// Payload of `POST /ori/round`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RoundStats {
    #[serde(deserialize_with = "de::u64_flexible")]
    pub round_id: u64,

    #[serde(default)]
    pub squares: Vec<SquareStat>,

    /// The same rows scoped to the requesting miner; empty when anonymous.
    #[serde(default)]
    pub miner_squares: Vec<SquareStat>,
}

/// Per-round, per-square bet statistics, globally and for the current user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetStatistics {
    pub round_id: u64,
    pub global: [CellStat; GRID_SIZE],
    pub user: [CellStat; GRID_SIZE],
}

impl BetStatistics {
    pub fn empty(round_id: u64) -> Self {
        Self {
            round_id,
            global: [CellStat::default(); GRID_SIZE],
            user: [CellStat::default(); GRID_SIZE],
        }
    }

    /// Total deployed across the board.
    pub fn total_deployed(&self) -> Amount {
        self.global.iter().map(|cell| cell.amount).sum()
    }

    /// Total the current user deployed this round.
    pub fn user_deployed(&self) -> Amount {
        self.user.iter().map(|cell| cell.amount).sum()
    }

    pub fn total_miners(&self) -> u64 {
        self.global.iter().map(|cell| cell.count).sum()
    }
}

impl TryFrom<RoundStats> for BetStatistics {
    type Error = OriError;

    fn try_from(stats: RoundStats) -> Result<Self, Self::Error> {
        let mut out = BetStatistics::empty(stats.round_id);
        fill(&mut out.global, &stats.squares)?;
        fill(&mut out.user, &stats.miner_squares)?;
        Ok(out)
    }
}

fn fill(cells: &mut [CellStat; GRID_SIZE], rows: &[SquareStat]) -> Result<(), OriError> {
    for row in rows {
        let cell = usize::try_from(row.square)
            .ok()
            .and_then(|square| cells.get_mut(square))
            .ok_or(OriError::InvalidSquare(row.square))?;
        cell.count = row.count.unwrap_or_default();
        cell.amount = row.amount;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_statistics_from_rows() {
        let stats: RoundStats = serde_json::from_str(
            r#"{
                "round_id": "41",
                "squares": [
                    {"square": 0, "count": 2, "amount": "1500000000000000000"},
                    {"square": "24", "count": "1", "amount": 10}
                ],
                "miner_squares": [{"square": 24, "count": 1, "amount": "10"}]
            }"#,
        )
        .unwrap();
        let stats = BetStatistics::try_from(stats).unwrap();

        assert_eq!(stats.round_id, 41);
        assert_eq!(stats.global[0].count, 2);
        assert_eq!(stats.global[24].amount, Amount(10));
        assert_eq!(stats.global[12], CellStat::default());
        assert_eq!(stats.total_deployed(), Amount(1_500_000_000_000_000_010));
        assert_eq!(stats.user_deployed(), Amount(10));
        assert_eq!(stats.total_miners(), 3);
    }

    #[test]
    fn rejects_squares_off_the_board() {
        let stats = RoundStats {
            round_id: 1,
            squares: vec![SquareStat {
                square: 25,
                count: Some(1),
                amount: Amount(1),
            }],
            miner_squares: vec![],
        };
        assert!(matches!(
            BetStatistics::try_from(stats),
            Err(OriError::InvalidSquare(25))
        ));

        let wide = (1u64 << 32) + 3;
        let stats = RoundStats {
            round_id: 1,
            squares: vec![SquareStat {
                square: wide,
                count: Some(1),
                amount: Amount(1),
            }],
            miner_squares: vec![],
        };
        assert!(matches!(
            BetStatistics::try_from(stats),
            Err(OriError::InvalidSquare(square)) if square == wide
        ));
    }
}
