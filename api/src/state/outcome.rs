use serde::{Deserialize, Serialize};

use crate::{amount::Amount, consts::GRID_SIZE};

use super::de;

/// On-chain result of a round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Whether the randomness request for the round has been fulfilled.
    pub randomness_fulfilled: bool,

    /// The winning square index (0-24). Meaningless until fulfilled.
    pub winning_square: u8,
}

impl RoundOutcome {
    /// The winning square, once the round is resolved.
    pub fn winner(&self) -> Option<u8> {
        (self.randomness_fulfilled && (self.winning_square as usize) < GRID_SIZE)
            .then_some(self.winning_square)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryState {
    /// Native balance held by the protocol.
    pub balance: Amount,

    /// The amount of ORI in the motherlode.
    pub motherlode: Amount,

    /// Total ORI staked.
    pub total_staked: Amount,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub paused: bool,

    /// Round length configured on-chain, in seconds.
    pub round_duration: u64,

    /// Smallest deploy accepted per square.
    pub min_deploy: Amount,
}

/// One batched read of the protocol contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub treasury: TreasuryState,
    pub game: GameState,
    pub current_round_id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundWinner {
    pub address: String,

    #[serde(default, deserialize_with = "de::u64_optional")]
    pub square: Option<u64>,

    #[serde(default)]
    pub amount: Amount,
}

/// Payload of `POST /ori/round_winners/round`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundWinners {
    #[serde(default, deserialize_with = "de::u64_flexible")]
    pub round_id: u64,

    #[serde(default, alias = "winners")]
    pub list: Vec<RoundWinner>,
}

impl RoundWinners {
    pub fn total_paid(&self) -> Amount {
        self.list.iter().map(|w| w.amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winner_requires_fulfilled_randomness() {
        let pending = RoundOutcome {
            randomness_fulfilled: false,
            winning_square: 7,
        };
        assert_eq!(pending.winner(), None);

        let done = RoundOutcome {
            randomness_fulfilled: true,
            winning_square: 7,
        };
        assert_eq!(done.winner(), Some(7));

        let bogus = RoundOutcome {
            randomness_fulfilled: true,
            winning_square: 25,
        };
        assert_eq!(bogus.winner(), None);
    }

    #[test]
    fn parses_winner_list() {
        let winners: RoundWinners = serde_json::from_str(
            r#"{"round_id":"41","list":[
                {"address":"0xab","square":"7","amount":"300"},
                {"address":"0xcd","amount":200}
            ]}"#,
        )
        .unwrap();
        assert_eq!(winners.round_id, 41);
        assert_eq!(winners.list[0].square, Some(7));
        assert_eq!(winners.list[1].square, None);
        assert_eq!(winners.total_paid(), Amount(500));
    }
}
